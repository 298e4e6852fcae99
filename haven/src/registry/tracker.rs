use std::sync::Arc;

use alloy_primitives::Address;
use alloy_sol_types::{SolCall, sol};
use haven_config::{RegistryConfig, Timings};
use haven_core::TxHash;
use tracing::info;

use crate::chain::{ChainClient, wait_for_receipt};
use crate::error::{HavenError, WaitStage};
use crate::utils::with_timeout;
use crate::wallet::{TransactionRequest, Wallet, ensure_chain};

sol! {
    interface IUploadTracker {
        event Uploaded(address indexed user, string cid, uint256 timestamp);

        function track(string cid) external;
    }
}

/// Client of the upload tracker contract.
pub struct Tracker {
    wallet: Arc<dyn Wallet>,
    chain: Arc<dyn ChainClient>,
    config: RegistryConfig,
    timings: Timings,
}

impl Tracker {
    pub fn new(
        wallet: Arc<dyn Wallet>,
        chain: Arc<dyn ChainClient>,
        config: RegistryConfig,
        timings: Timings,
    ) -> Self {
        Self {
            wallet,
            chain,
            config,
            timings,
        }
    }

    /// Emits an upload event for `cid` and waits until it is mined.
    ///
    /// Unlike the registry this never switches networks; a wallet on another chain fails with
    /// [`HavenError::NetworkMismatch`].
    pub async fn track(&self, owner: Address, cid: &str) -> Result<TxHash, HavenError> {
        let tracker = self
            .config
            .tracker_address
            .ok_or(HavenError::ConfigurationMissing("registry.tracker_address"))?;
        if cid.trim().is_empty() {
            return Err(HavenError::InvalidCid);
        }
        ensure_chain(self.wallet.as_ref(), self.config.tracker_chain_id()).await?;

        let data = IUploadTracker::trackCall {
            cid: cid.to_string(),
        }
        .abi_encode();
        let tx_hash = self
            .wallet
            .send_transaction(TransactionRequest {
                from: owner,
                to: tracker,
                data: data.into(),
            })
            .await?;

        let receipt = with_timeout(
            wait_for_receipt(self.chain.as_ref(), &tx_hash, self.timings.receipt_poll()),
            self.timings.transaction_finality(),
            WaitStage::TransactionFinality,
            "Timed out waiting for the tracking transaction to be mined",
        )
        .await?;
        if !receipt.succeeded {
            return Err(HavenError::TransactionFailed(tx_hash));
        }
        info!(%owner, cid, %tx_hash, "upload tracked");
        Ok(tx_hash)
    }
}
