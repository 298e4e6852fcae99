use std::future::Future;
use std::sync::Arc;

use alloy_primitives::Address;
use haven_config::Config;
use haven_core::{BucketId, FileKey, FileSource, PreparedUpload};
use tracing::debug;

use crate::bucket::BucketProvisioner;
use crate::chain::ChainClient;
use crate::error::HavenError;
use crate::progress::Progress;
use crate::registry::{AssetRegistry, Tracker};
use crate::retrieval::{self, ByteStream};
use crate::session::{Connector, SessionManager};
use crate::upload::{Preparer, UploadError, UploadOrchestrator, UploadOutcome, UploadRequest};
use crate::wallet::{self, ChainParams, Wallet};

/// Everything a client of the storage network needs, wired from one [`Config`].
pub struct Context {
    config: Config,
    wallet: Arc<dyn Wallet>,
    sessions: Arc<SessionManager>,
    buckets: BucketProvisioner,
    uploads: UploadOrchestrator,
    preparer: Preparer,
    registry_chain: Option<Arc<dyn ChainClient>>,
}

impl Context {
    pub fn new(config: Config, wallet: Arc<dyn Wallet>, connector: Arc<dyn Connector>) -> Self {
        let sessions = Arc::new(SessionManager::new(connector));
        Context {
            buckets: BucketProvisioner::new(sessions.clone(), config.timings.clone()),
            uploads: UploadOrchestrator::new(sessions.clone(), config.timings.clone()),
            preparer: Preparer::new(),
            registry_chain: None,
            config,
            wallet,
            sessions,
        }
    }

    /// Chain the registry and tracker contracts are read from.
    pub fn with_registry_chain(mut self, chain: Arc<dyn ChainClient>) -> Self {
        self.registry_chain = Some(chain);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Asks the wallet for its account and warms the session caches in the background.
    pub async fn connect(&self) -> Result<Address, HavenError> {
        let owner = wallet::connect(self.wallet.as_ref()).await?;
        let sessions = self.sessions.clone();
        tokio::spawn(async move {
            if let Err(err) = sessions.prefetch(owner).await {
                debug!(%owner, "prefetch failed: {err}");
            }
        });
        Ok(owner)
    }

    /// Moves the wallet to the storage network.
    pub async fn switch_network(&self) -> Result<(), HavenError> {
        let params = ChainParams::storage_chain(&self.config.chain)?;
        wallet::switch_chain(self.wallet.as_ref(), &params).await
    }

    pub async fn ensure_bucket(
        &self,
        owner: Address,
        name: &str,
        progress: &Progress,
    ) -> Result<BucketId, HavenError> {
        self.buckets.ensure_bucket(owner, name, progress).await
    }

    /// Starts fingerprinting ahead of [`Context::upload`]. A run superseded by a later call
    /// yields `None`, even if the later call was made before this future was first polled.
    pub fn prepare<'a>(
        &'a self,
        bucket_id: BucketId,
        file: &'a FileSource,
        owner: Option<Address>,
    ) -> impl Future<Output = Result<Option<PreparedUpload>, HavenError>> + 'a {
        self.preparer.prepare(bucket_id, file, owner)
    }

    /// Uploads `file`, reusing a matching result of [`Context::prepare`] if there is one.
    pub async fn upload(
        &self,
        bucket_id: BucketId,
        file: &FileSource,
        owner: Option<Address>,
        progress: &Progress,
    ) -> Result<UploadOutcome, UploadError> {
        let prepared = owner.and_then(|owner| self.preparer.matching(&bucket_id, &owner, file.name()));
        let outcome = self
            .uploads
            .upload(
                UploadRequest {
                    bucket_id,
                    file,
                    owner,
                    prepared,
                },
                progress,
            )
            .await;
        if outcome.is_ok() {
            self.preparer.invalidate();
        }
        outcome
    }

    pub async fn fetch(&self, file_key: &FileKey) -> Result<ByteStream, HavenError> {
        retrieval::fetch(&self.sessions, file_key).await
    }

    pub fn registry(&self) -> Result<AssetRegistry, HavenError> {
        Ok(AssetRegistry::new(
            self.wallet.clone(),
            self.require_registry_chain()?,
            self.config.registry.clone(),
        ))
    }

    pub fn tracker(&self) -> Result<Tracker, HavenError> {
        Ok(Tracker::new(
            self.wallet.clone(),
            self.require_registry_chain()?,
            self.config.registry.clone(),
            self.config.timings.clone(),
        ))
    }

    fn require_registry_chain(&self) -> Result<Arc<dyn ChainClient>, HavenError> {
        self.registry_chain
            .clone()
            .ok_or(HavenError::ConfigurationMissing("registry.rpc_url"))
    }
}
