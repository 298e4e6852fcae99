use alloy_primitives::Address;

use crate::ids::BucketId;
use crate::BucketName;

const BUCKET_ID_CONTEXT: &str = "haven 2024-06-01 bucket id";

/// Bucket name scoped to the identity owning it.
///
/// The same name under two different owners denotes two different buckets, so the id is derived
/// from both parts. Deriving it again for the same pair always yields the same id, which is what
/// makes bucket creation idempotent.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScopedBucket(Address, BucketName);

impl ScopedBucket {
    pub fn new(owner: Address, bucket_name: &str) -> Self {
        Self(owner, bucket_name.to_string())
    }

    pub fn id(&self) -> BucketId {
        let mut hasher = blake3::Hasher::new_derive_key(BUCKET_ID_CONTEXT);
        hasher.update(self.0.as_slice());
        hasher.update(&(self.1.len() as u64).to_le_bytes());
        hasher.update(self.1.as_bytes());
        BucketId::new(*hasher.finalize().as_bytes())
    }
}
