use std::fmt;
use std::str::FromStr;

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// Declares a 32-byte identifier which renders as `0x`-prefixed hex.
macro_rules! hash_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(B256);

        impl $name {
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(B256::new(bytes))
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0 .0
            }

            pub fn as_b256(&self) -> B256 {
                self.0
            }
        }

        impl From<B256> for $name {
            fn from(value: B256) -> Self {
                Self(value)
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(value: [u8; 32]) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for B256 {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = alloy_primitives::hex::FromHexError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Ok(Self(B256::from_str(value.trim())?))
            }
        }
    };
}

hash_id!(
    /// Identifier of a bucket, derived from its owner and name.
    BucketId
);

hash_id!(
    /// Network-wide identifier of a stored file. It is the value recorded on the asset registry
    /// as the file's content id.
    FileKey
);

hash_id!(
    /// Content hash over the raw bytes of a file.
    Fingerprint
);

hash_id!(
    /// On-chain identifier of a main storage provider.
    ProviderId
);

hash_id!(
    /// Storage tier offered by a provider.
    ValuePropId
);

hash_id!(TxHash);
