pub mod bucket;
pub mod fingerprint;
pub mod ids;
pub mod prepared;
pub mod source;

pub use alloy_primitives::{Address, B256};
pub use bucket::ScopedBucket;
pub use fingerprint::{derive_file_key, fingerprint_reader};
pub use ids::{BucketId, FileKey, Fingerprint, ProviderId, TxHash, ValuePropId};
pub use prepared::{PrepareError, PreparedUpload, prepare};
pub use source::FileSource;

pub type FileSize = u64;

pub type BucketName = String;
