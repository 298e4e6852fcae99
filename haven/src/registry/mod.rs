//! Bookkeeping contracts downstream of uploads: the asset registry which lists an owner's file
//! keys, and the tracker which emits an event per upload.
pub mod tracker;

use std::sync::Arc;

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{SolCall, SolType, sol, sol_data};
use haven_config::RegistryConfig;
use haven_core::TxHash;
use tracing::{debug, info};

use crate::chain::ChainClient;
use crate::error::HavenError;
use crate::wallet::{ChainParams, TransactionRequest, Wallet, switch_chain};

pub use tracker::Tracker;

sol! {
    interface IAssetRegistry {
        function saveAsset(string cid) external;
        function deleteAsset(string cid) external;
        function getAssets(address owner) external view returns (string[] memory);
    }
}

/// Client of the asset registry contract.
///
/// Writes are signed by the wallet, reads go to the registry chain directly.
pub struct AssetRegistry {
    wallet: Arc<dyn Wallet>,
    chain: Arc<dyn ChainClient>,
    config: RegistryConfig,
}

impl AssetRegistry {
    pub fn new(wallet: Arc<dyn Wallet>, chain: Arc<dyn ChainClient>, config: RegistryConfig) -> Self {
        Self {
            wallet,
            chain,
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.contract_address.is_some()
    }

    /// Moves the wallet to the registry chain, adding it to the wallet when needed.
    pub async fn ensure_contract_chain(&self) -> Result<(), HavenError> {
        if self.wallet.chain_id().await? == self.config.chain_id {
            return Ok(());
        }
        let params = ChainParams::registry_chain(&self.config)?;
        switch_chain(self.wallet.as_ref(), &params).await
    }

    /// Records `cid` for `owner`. Returns as soon as the wallet accepted the transaction.
    pub async fn save_asset(&self, owner: Address, cid: &str) -> Result<TxHash, HavenError> {
        let data = IAssetRegistry::saveAssetCall {
            cid: cid.to_string(),
        }
        .abi_encode();
        let tx_hash = self.send(owner, data.into()).await?;
        info!(%owner, cid, %tx_hash, "asset saved");
        Ok(tx_hash)
    }

    pub async fn delete_asset(&self, owner: Address, cid: &str) -> Result<TxHash, HavenError> {
        let data = IAssetRegistry::deleteAssetCall {
            cid: cid.to_string(),
        }
        .abi_encode();
        let tx_hash = self.send(owner, data.into()).await?;
        info!(%owner, cid, %tx_hash, "asset deleted");
        Ok(tx_hash)
    }

    pub async fn get_assets(&self, owner: Address) -> Result<Vec<String>, HavenError> {
        let contract = self.config.require_contract_address()?;
        let data = IAssetRegistry::getAssetsCall { owner }.abi_encode();
        let output = self.chain.call(contract, data.into()).await?;
        let assets = <sol_data::Array<sol_data::String> as SolType>::abi_decode(&output)
            .map_err(|err| HavenError::Chain(format!("invalid getAssets result: {err}")))?;
        debug!(%owner, count = assets.len(), "assets listed");
        Ok(assets)
    }

    async fn send(&self, owner: Address, data: Bytes) -> Result<TxHash, HavenError> {
        let contract = self.config.require_contract_address()?;
        self.wallet
            .send_transaction(TransactionRequest {
                from: owner,
                to: contract,
                data,
            })
            .await
    }
}
