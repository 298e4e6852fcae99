use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use async_trait::async_trait;
use haven_config::Config;
use haven_msp_api::{MspApi, MspApiClient, MspApiError};
use tracing::{debug, info};

use super::SessionHandle;
use crate::chain::{ChainClient, RpcChain, RpcStorageRequestIndex, StorageRequestIndex};
use crate::error::{HavenError, WaitStage};
use crate::utils::with_timeout;
use crate::wallet::{RpcWallet, Wallet};

pub(crate) const RPC_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the clients a [`SessionHandle`] bundles.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, owner: Address) -> Result<SessionHandle, HavenError>;
}

/// Connects to the endpoints named in [`Config`].
#[derive(Clone)]
pub struct RpcConnector {
    config: Config,
    wallet: Option<Arc<dyn Wallet>>,
}

impl RpcConnector {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            wallet: None,
        }
    }

    /// Uses `wallet` for every session instead of connecting to the configured provider.
    pub fn with_wallet(mut self, wallet: Arc<dyn Wallet>) -> Self {
        self.wallet = Some(wallet);
        self
    }
}

#[async_trait]
impl Connector for RpcConnector {
    async fn connect(&self, owner: Address) -> Result<SessionHandle, HavenError> {
        let chain_config = &self.config.chain;
        let msp_config = &self.config.msp;

        // Every required setting is checked before anything goes over the network.
        let rpc_url = chain_config.require_rpc_url()?.clone();
        let ws_url = chain_config.require_ws_url()?;
        let filesystem = chain_config.require_filesystem_address()?;
        let base_url = msp_config.require_base_url()?.clone();

        let chain: Arc<dyn ChainClient> =
            Arc::new(RpcChain::new(rpc_url.clone(), RPC_REQUEST_TIMEOUT)?);
        let wallet: Arc<dyn Wallet> = match &self.wallet {
            Some(wallet) => wallet.clone(),
            None => Arc::new(RpcWallet::from_config(
                &self.config.wallet,
                self.config.timings.wallet_confirmation(),
            )?),
        };
        let requests = match &chain_config.storage_request_method {
            Some(method) => Some(Arc::new(RpcStorageRequestIndex::new(
                rpc_url,
                method.clone(),
                RPC_REQUEST_TIMEOUT,
            )?) as Arc<dyn StorageRequestIndex>),
            None => {
                debug!("no storage request index configured");
                None
            }
        };

        let msp = with_timeout(
            async {
                MspApiClient::connect(base_url.clone(), msp_config.timeout())
                    .await
                    .map_err(|err| match err {
                        MspApiError::Transport { message, .. } => {
                            HavenError::BackendUnavailable(message)
                        }
                        other => HavenError::Backend(other),
                    })
            },
            msp_config.connect_timeout(),
            WaitStage::BackendConnect,
            "Timed out connecting to the storage provider backend",
        )
        .await?;
        info!(%owner, backend = %base_url, %ws_url, "session established");

        Ok(SessionHandle {
            owner,
            chain_id: chain_config.chain_id,
            filesystem,
            chain,
            wallet,
            msp: Arc::new(msp) as Arc<dyn MspApi>,
            requests,
        })
    }
}
