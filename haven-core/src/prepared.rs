use std::io;

use alloy_primitives::Address;
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

use crate::fingerprint::{derive_file_key, fingerprint_reader};
use crate::ids::{BucketId, FileKey, Fingerprint};
use crate::source::FileSource;
use crate::FileSize;

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("no owner identity available to prepare the upload")]
    Unauthenticated,

    #[error("failed reading file: {0}")]
    Io(#[from] io::Error),
}

/// Everything needed to issue a storage request and transfer a file, computed before any network
/// call.
///
/// A prepared upload is only valid for the bucket, owner and file name it was computed for. Use
/// [`PreparedUpload::matches`] before reusing one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedUpload {
    pub bucket_id: BucketId,
    pub owner: Address,
    pub file_name: String,
    pub fingerprint: Fingerprint,
    pub file_size: FileSize,
    pub file_key: FileKey,
    pub blob: Bytes,
}

impl PreparedUpload {
    pub fn matches(&self, bucket_id: &BucketId, owner: &Address, file_name: &str) -> bool {
        self.bucket_id == *bucket_id && self.owner == *owner && self.file_name == file_name
    }
}

/// Fingerprints `source` and derives its file key for `owner` in `bucket_id`.
pub async fn prepare(
    bucket_id: BucketId,
    source: &FileSource,
    owner: Option<Address>,
) -> Result<PreparedUpload, PrepareError> {
    let owner = owner.ok_or(PrepareError::Unauthenticated)?;
    let reader = source.open().await?;
    let (fingerprint, blob) = fingerprint_reader(reader).await?;
    let file_size = blob.len() as FileSize;
    let file_key = derive_file_key(&owner, &bucket_id, source.name(), file_size, &fingerprint);
    debug!(%file_key, %fingerprint, file_size, name = source.name(), "prepared upload");

    Ok(PreparedUpload {
        bucket_id,
        owner,
        file_name: source.name().to_string(),
        fingerprint,
        file_size,
        file_key,
        blob,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use alloy_primitives::Address;

    use super::{PrepareError, prepare};
    use crate::ids::BucketId;
    use crate::source::FileSource;

    #[tokio::test]
    async fn requires_owner() {
        let source = FileSource::from_bytes("a.json", &b"{}"[..]);
        let result = prepare(BucketId::new([1; 32]), &source, None).await;
        assert!(matches!(result, Err(PrepareError::Unauthenticated)));
    }

    #[tokio::test]
    async fn deterministic_across_sources() {
        let content = br#"{"name":"sword","damage":12}"#;
        let owner = Address::repeat_byte(0xaa);
        let bucket = BucketId::new([7; 32]);

        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(content).unwrap();
        let from_disk = FileSource::from_path(file.path()).unwrap();
        let in_memory = FileSource::from_bytes(from_disk.name().to_string(), &content[..]);

        let first = prepare(bucket, &from_disk, Some(owner)).await.unwrap();
        let second = prepare(bucket, &in_memory, Some(owner)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.file_size, content.len() as u64);
        assert_eq!(&first.blob[..], &content[..]);
    }

    #[tokio::test]
    async fn matches_checks_bucket_owner_and_name() {
        let owner = Address::repeat_byte(0xaa);
        let bucket = BucketId::new([7; 32]);
        let source = FileSource::from_bytes("a.json", &b"{}"[..]);
        let prepared = prepare(bucket, &source, Some(owner)).await.unwrap();

        assert!(prepared.matches(&bucket, &owner, "a.json"));
        assert!(!prepared.matches(&BucketId::new([8; 32]), &owner, "a.json"));
        assert!(!prepared.matches(&bucket, &Address::repeat_byte(0xbb), "a.json"));
        assert!(!prepared.matches(&bucket, &owner, "b.json"));
    }
}
