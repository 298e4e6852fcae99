use std::time::Duration;

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use haven_core::{FileKey, TxHash};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::{ChainClient, StorageRequest, StorageRequestIndex, TxReceipt};
use crate::error::HavenError;
use crate::rpc::{JsonRpcClient, RpcError, parse_quantity};

fn chain_error(error: RpcError) -> HavenError {
    HavenError::Chain(error.to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: TxHash,
    block_number: Option<String>,
    status: Option<String>,
}

impl From<RawReceipt> for TxReceipt {
    fn from(raw: RawReceipt) -> Self {
        TxReceipt {
            transaction_hash: raw.transaction_hash,
            block_number: raw.block_number.as_deref().and_then(parse_quantity),
            succeeded: raw.status.as_deref().and_then(parse_quantity) == Some(1),
        }
    }
}

/// [`ChainClient`] talking Ethereum JSON-RPC to a node.
#[derive(Debug)]
pub struct RpcChain {
    rpc: JsonRpcClient,
}

impl RpcChain {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, HavenError> {
        Ok(Self {
            rpc: JsonRpcClient::new(url, timeout).map_err(chain_error)?,
        })
    }
}

#[async_trait]
impl ChainClient for RpcChain {
    async fn chain_id(&self) -> Result<u64, HavenError> {
        let chain_id: String = self
            .rpc
            .request("eth_chainId", json!([]))
            .await
            .map_err(chain_error)?;
        parse_quantity(&chain_id)
            .ok_or_else(|| HavenError::Chain(format!("invalid chain id {chain_id}")))
    }

    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<TxReceipt>, HavenError> {
        let receipt: Option<RawReceipt> = self
            .rpc
            .request("eth_getTransactionReceipt", json!([hash.to_string()]))
            .await
            .map_err(chain_error)?;
        Ok(receipt.map(TxReceipt::from))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, HavenError> {
        self.rpc
            .request(
                "eth_call",
                json!([{ "to": to.to_string(), "data": data.to_string() }, "latest"]),
            )
            .await
            .map_err(chain_error)
    }
}

/// [`StorageRequestIndex`] answered by a node RPC method taking the file key and returning the
/// storage request, or `null` once it is gone.
#[derive(Debug)]
pub struct RpcStorageRequestIndex {
    rpc: JsonRpcClient,
    method: String,
}

impl RpcStorageRequestIndex {
    pub fn new(url: Url, method: impl Into<String>, timeout: Duration) -> Result<Self, HavenError> {
        Ok(Self {
            rpc: JsonRpcClient::new(url, timeout).map_err(chain_error)?,
            method: method.into(),
        })
    }
}

#[async_trait]
impl StorageRequestIndex for RpcStorageRequestIndex {
    async fn storage_request(
        &self,
        file_key: &FileKey,
    ) -> Result<Option<StorageRequest>, HavenError> {
        self.rpc
            .request(&self.method, json!([file_key.to_string()]))
            .await
            .map_err(chain_error)
    }
}
