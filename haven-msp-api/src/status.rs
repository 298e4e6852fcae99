use std::fmt;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use haven_core::{Address, BucketId, FileKey, ProviderId, ValuePropId};
use serde::{Deserialize, Serialize};

use crate::error::MspApiError;

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq)]
pub struct HealthStatus {
    pub status: ServiceStatus,
    pub msg: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    #[default]
    Unknown,
    Unhealthy,
}

/// Provider metadata. Slow-changing, so callers memoize it.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MspInfo {
    pub msp_id: ProviderId,
    #[serde(default)]
    pub multiaddresses: Vec<String>,
}

impl MspInfo {
    /// Peer ids taken from the `/p2p/<peer id>` segment of each multiaddress.
    pub fn peer_ids(&self) -> Vec<String> {
        self.multiaddresses
            .iter()
            .filter_map(|addr| addr.rsplit_once("/p2p/").map(|(_, id)| id))
            .map(|id| id.trim_end_matches('/'))
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValueProp {
    pub id: ValuePropId,
    #[serde(default)]
    pub price_per_giga_unit_of_data_per_block: Option<String>,
    #[serde(default = "available")]
    pub is_available: bool,
}

fn available() -> bool {
    true
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub bucket_id: BucketId,
    pub name: String,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub file_count: u64,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Ready,
    Rejected,
    Revoked,
    Expired,
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub file_key: FileKey,
    pub bucket_id: BucketId,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub size: u64,
    pub status: FileStatus,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    UploadSuccessful,
    #[serde(other)]
    Failed,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub status: UploadStatus,
    pub file_key: FileKey,
    pub bucket_id: BucketId,
}

/// File bytes to hand to the backend under `(bucket_id, file_key)`.
#[derive(Clone, Debug)]
pub struct FileUpload {
    pub bucket_id: BucketId,
    pub file_key: FileKey,
    pub owner: Address,
    pub location: String,
    pub data: Bytes,
}

/// Outcome of a download request. The body is only meaningful for success statuses.
pub struct Download {
    pub status: u16,
    pub stream: BoxStream<'static, Result<Bytes, MspApiError>>,
}

impl Download {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NonceRequest {
    pub address: Address,
    pub chain_id: u64,
    pub domain: String,
    pub uri: String,
}

/// Sign-in message the owner has to sign.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NonceResponse {
    pub message: String,
    #[serde(default)]
    pub nonce: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub message: String,
    pub signature: String,
}

#[derive(Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct SessionUser {
    pub address: Address,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Session {
    pub token: SessionToken,
    pub user: SessionUser,
}

#[cfg(test)]
mod tests {
    use haven_core::ProviderId;

    use super::{FileInfo, FileStatus, MspInfo, UploadReceipt, UploadStatus};

    #[test]
    fn peer_ids_from_multiaddresses() {
        let info = MspInfo {
            msp_id: ProviderId::new([1; 32]),
            multiaddresses: vec![
                "/ip4/10.0.0.1/tcp/30333/p2p/12D3KooWAbc".to_string(),
                "/dns/msp.example/tcp/30333".to_string(),
                "/ip4/10.0.0.2/tcp/30333/p2p/".to_string(),
                "/ip6/::1/tcp/30333/p2p/12D3KooWDef".to_string(),
            ],
        };
        assert_eq!(info.peer_ids(), vec!["12D3KooWAbc", "12D3KooWDef"]);
    }

    #[test]
    fn unknown_statuses_do_not_fail_decoding() {
        let json = format!(
            r#"{{"fileKey":"0x{k}","bucketId":"0x{k}","status":"inProgress"}}"#,
            k = "11".repeat(32)
        );
        let info: FileInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info.status, FileStatus::Unknown);

        let json = format!(
            r#"{{"status":"upload_successful","fileKey":"0x{k}","bucketId":"0x{k}"}}"#,
            k = "22".repeat(32)
        );
        let receipt: UploadReceipt = serde_json::from_str(&json).unwrap();
        assert_eq!(receipt.status, UploadStatus::UploadSuccessful);
    }
}
