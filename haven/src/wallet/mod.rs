//! Wallet collaborator: accounts, signatures and transaction submission, all of which may prompt
//! the owner.
pub mod network;
pub mod provider;
pub mod rpc;

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use haven_config::{ChainConfig, RegistryConfig};
use haven_core::TxHash;
use serde::{Serialize, Serializer};

use crate::error::HavenError;
use crate::rpc::to_quantity;

pub use network::{ensure_chain, switch_chain};
pub use provider::resolve_provider;
pub use rpc::RpcWallet;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Parameters of `wallet_addEthereumChain`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainParams {
    #[serde(serialize_with = "quantity")]
    pub chain_id: u64,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub block_explorer_urls: Vec<String>,
}

fn quantity<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_quantity(*value))
}

impl ChainParams {
    pub fn storage_chain(config: &ChainConfig) -> Result<Self, HavenError> {
        let rpc_url = config.require_rpc_url()?;
        Ok(Self {
            chain_id: config.chain_id,
            chain_name: config.chain_name.clone(),
            native_currency: NativeCurrency {
                name: "MOCK".to_string(),
                symbol: "MOCK".to_string(),
                decimals: 18,
            },
            rpc_urls: vec![rpc_url.to_string()],
            block_explorer_urls: config.explorer_url.iter().map(|url| url.to_string()).collect(),
        })
    }

    pub fn registry_chain(config: &RegistryConfig) -> Result<Self, HavenError> {
        let rpc_url = config.require_rpc_url()?;
        Ok(Self {
            chain_id: config.chain_id,
            chain_name: config.chain_name().to_string(),
            native_currency: NativeCurrency {
                name: "ETH".to_string(),
                symbol: "ETH".to_string(),
                decimals: 18,
            },
            rpc_urls: vec![rpc_url.to_string()],
            block_explorer_urls: Vec::new(),
        })
    }
}

/// An EIP-1193 style wallet.
///
/// Errors the user caused by refusing a prompt come back as [`HavenError::UserRejected`]; other
/// wallet failures keep their code in [`HavenError::Wallet`].
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn request_accounts(&self) -> Result<Vec<Address>, HavenError>;

    async fn chain_id(&self) -> Result<u64, HavenError>;

    /// Signs `message` with the personal-message prefix, returning the hex encoded signature.
    async fn sign_message(&self, address: Address, message: &str) -> Result<String, HavenError>;

    /// Submits a transaction and returns its hash as soon as the wallet accepted it.
    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, HavenError>;

    async fn switch_chain(&self, chain_id: u64) -> Result<(), HavenError>;

    async fn add_chain(&self, params: &ChainParams) -> Result<(), HavenError>;
}

/// Asks the wallet for its accounts and returns the first one.
pub async fn connect(wallet: &dyn Wallet) -> Result<Address, HavenError> {
    wallet
        .request_accounts()
        .await?
        .first()
        .copied()
        .ok_or(HavenError::Unauthenticated)
}
