use std::time::Duration;

use alloy_primitives::Address;
use async_trait::async_trait;
use haven_config::WalletConfig;
use haven_core::TxHash;
use serde_json::json;
use tracing::debug;
use url::Url;

use super::{ChainParams, TransactionRequest, Wallet, resolve_provider};
use crate::error::HavenError;
use crate::rpc::{JsonRpcClient, RpcError, parse_quantity, to_quantity};

/// Wallet requests that never reached the wallet carry this code.
pub const NO_RESPONSE_CODE: i64 = 0;

fn wallet_error(error: RpcError) -> HavenError {
    match error {
        RpcError::Rpc { code, message, .. } => HavenError::from_wallet(code, message),
        other => HavenError::Wallet {
            code: NO_RESPONSE_CODE,
            message: other.to_string(),
        },
    }
}

/// [`Wallet`] reached through an EIP-1193 JSON-RPC endpoint, such as a browser wallet bridge or a
/// local signer.
#[derive(Debug)]
pub struct RpcWallet {
    rpc: JsonRpcClient,
}

impl RpcWallet {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, HavenError> {
        Ok(Self {
            rpc: JsonRpcClient::new(url, timeout).map_err(wallet_error)?,
        })
    }

    /// Connects to the preferred configured provider, see [`resolve_provider`].
    pub fn from_config(config: &WalletConfig, timeout: Duration) -> Result<Self, HavenError> {
        let provider = resolve_provider(&config.providers).ok_or(HavenError::Unauthenticated)?;
        debug!(url = %provider.url, kind = ?provider.kind, "using wallet provider");
        Self::new(provider.url.clone(), timeout)
    }
}

#[async_trait]
impl Wallet for RpcWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, HavenError> {
        self.rpc
            .request("eth_requestAccounts", json!([]))
            .await
            .map_err(wallet_error)
    }

    async fn chain_id(&self) -> Result<u64, HavenError> {
        let chain_id: String = self
            .rpc
            .request("eth_chainId", json!([]))
            .await
            .map_err(wallet_error)?;
        parse_quantity(&chain_id).ok_or_else(|| HavenError::Wallet {
            code: NO_RESPONSE_CODE,
            message: format!("invalid chain id {chain_id}"),
        })
    }

    async fn sign_message(&self, address: Address, message: &str) -> Result<String, HavenError> {
        let payload = format!("0x{}", hex::encode(message.as_bytes()));
        self.rpc
            .request("personal_sign", json!([payload, address.to_string()]))
            .await
            .map_err(wallet_error)
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, HavenError> {
        self.rpc
            .request("eth_sendTransaction", json!([request]))
            .await
            .map_err(wallet_error)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), HavenError> {
        let _: Option<serde_json::Value> = self
            .rpc
            .request(
                "wallet_switchEthereumChain",
                json!([{ "chainId": to_quantity(chain_id) }]),
            )
            .await
            .map_err(wallet_error)?;
        Ok(())
    }

    async fn add_chain(&self, params: &ChainParams) -> Result<(), HavenError> {
        let _: Option<serde_json::Value> = self
            .rpc
            .request("wallet_addEthereumChain", json!([params]))
            .await
            .map_err(wallet_error)?;
        Ok(())
    }
}
