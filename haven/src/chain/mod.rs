pub mod calls;
pub mod rpc;

use std::time::Duration;

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use haven_core::{FileKey, TxHash};
use serde::Deserialize;
use tracing::trace;

use crate::error::HavenError;

pub use rpc::{RpcChain, RpcStorageRequestIndex};

/// Finalized outcome of a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: TxHash,
    pub block_number: Option<u64>,
    pub succeeded: bool,
}

/// Read side of an EVM chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64, HavenError>;

    /// `None` while the transaction is not mined yet.
    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<TxReceipt>, HavenError>;

    /// Executes a read-only contract call.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, HavenError>;
}

/// Polls `chain` until the receipt for `hash` shows up.
///
/// Never gives up by itself, callers bound it with [`with_timeout`](crate::utils::with_timeout).
pub async fn wait_for_receipt(
    chain: &dyn ChainClient,
    hash: &TxHash,
    interval: Duration,
) -> Result<TxReceipt, HavenError> {
    loop {
        if let Some(receipt) = chain.transaction_receipt(hash).await? {
            return Ok(receipt);
        }
        trace!(%hash, "transaction not mined yet");
        tokio::time::sleep(interval).await;
    }
}

/// Storage provider response recorded on a storage request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MspStatus {
    Pending,
    AcceptedNewFile,
    AcceptedExistingFile,
    #[serde(other)]
    Other,
}

impl MspStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            MspStatus::AcceptedNewFile | MspStatus::AcceptedExistingFile
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageRequest {
    pub msp_status: MspStatus,
}

/// Lookup of on-chain storage requests by file key.
///
/// A storage request disappears once it is fulfilled or its period ends, so `None` is a normal
/// answer and not an error.
#[async_trait]
pub trait StorageRequestIndex: Send + Sync {
    async fn storage_request(&self, file_key: &FileKey)
    -> Result<Option<StorageRequest>, HavenError>;
}

#[cfg(test)]
mod tests {
    use super::{MspStatus, StorageRequest};

    #[test]
    fn acceptance_statuses() {
        let request: StorageRequest =
            serde_json::from_str(r#"{"mspStatus":"acceptedExistingFile"}"#).unwrap();
        assert!(request.msp_status.is_accepted());
        let request: StorageRequest = serde_json::from_str(r#"{"mspStatus":"pending"}"#).unwrap();
        assert!(!request.msp_status.is_accepted());
        let request: StorageRequest =
            serde_json::from_str(r#"{"mspStatus":"somethingNew"}"#).unwrap();
        assert_eq!(request.msp_status, MspStatus::Other);
    }
}
