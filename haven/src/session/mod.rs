//! Per-identity connection state.
//!
//! Everything cached here (the session handle, provider metadata and the backend token) belongs
//! to exactly one owner address. Asking for a different address swaps in a fresh
//! [`IdentityScope`], which drops all of it at once.
pub mod auth;
pub mod connector;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy_primitives::Address;
use haven_core::ValuePropId;
use haven_msp_api::{MspApi, MspInfo, SessionToken};
use tokio::sync::{Mutex as AsyncMutex, OnceCell};
use tracing::{debug, info};

use crate::chain::{ChainClient, StorageRequestIndex};
use crate::error::HavenError;
use crate::wallet::Wallet;

pub use auth::{SignInParams, sign_in};
pub use connector::{Connector, RpcConnector};

/// Clients bound to one owner.
pub struct SessionHandle {
    pub owner: Address,
    /// Chain the storage network runs on.
    pub chain_id: u64,
    /// Address of the file system precompile storage transactions are sent to.
    pub filesystem: Address,
    pub chain: Arc<dyn ChainClient>,
    pub wallet: Arc<dyn Wallet>,
    pub msp: Arc<dyn MspApi>,
    /// Source of on-chain storage request state, if one is configured.
    pub requests: Option<Arc<dyn StorageRequestIndex>>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("owner", &self.owner)
            .field("chain_id", &self.chain_id)
            .field("filesystem", &self.filesystem)
            .field("requests", &self.requests.is_some())
            .finish_non_exhaustive()
    }
}

/// State cached for one owner address.
struct IdentityScope {
    owner: Address,
    handle: OnceCell<Arc<SessionHandle>>,
    msp_info: OnceCell<MspInfo>,
    value_prop: OnceCell<ValuePropId>,
    token: AsyncMutex<Option<SessionToken>>,
}

impl IdentityScope {
    fn new(owner: Address) -> Self {
        Self {
            owner,
            handle: OnceCell::new(),
            msp_info: OnceCell::new(),
            value_prop: OnceCell::new(),
            token: AsyncMutex::new(None),
        }
    }
}

/// A connected session for one owner, together with the caches that belong to it.
///
/// Cloning is cheap. A clone keeps using the scope it was created in even after the manager
/// switched to another identity, so an operation in flight never picks up another owner's state.
#[derive(Clone)]
pub struct ActiveSession {
    scope: Arc<IdentityScope>,
    handle: Arc<SessionHandle>,
    sign_in: Arc<SignInParams>,
}

impl fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActiveSession").field(&self.handle).finish()
    }
}

impl ActiveSession {
    pub fn owner(&self) -> Address {
        self.scope.owner
    }

    pub fn handle(&self) -> &Arc<SessionHandle> {
        &self.handle
    }

    /// Provider metadata, fetched once per identity.
    pub async fn msp_info(&self) -> Result<MspInfo, HavenError> {
        self.scope
            .msp_info
            .get_or_try_init(|| async {
                debug!("fetching storage provider info");
                Ok::<_, HavenError>(self.handle.msp.info().await?)
            })
            .await
            .cloned()
    }

    /// Storage tier new buckets are created with: the first available value proposition the
    /// provider offers. Fetched once per identity.
    pub async fn value_prop(&self) -> Result<ValuePropId, HavenError> {
        self.scope
            .value_prop
            .get_or_try_init(|| async {
                debug!("fetching value propositions");
                let value_props = self.handle.msp.value_props().await?;
                value_props
                    .iter()
                    .find(|value_prop| value_prop.is_available)
                    .map(|value_prop| value_prop.id)
                    .ok_or_else(|| {
                        HavenError::BackendUnavailable(
                            "storage provider offers no value proposition".to_string(),
                        )
                    })
            })
            .await
            .copied()
    }

    /// Signs in with the backend unless a token for this owner is cached already.
    ///
    /// Concurrent callers wait for the first sign-in instead of prompting the wallet again.
    pub async fn authenticate(&self) -> Result<SessionToken, HavenError> {
        let mut token = self.scope.token.lock().await;
        if let Some(token) = token.as_ref() {
            return Ok(token.clone());
        }

        let session = sign_in(
            self.handle.msp.as_ref(),
            self.handle.wallet.as_ref(),
            self.scope.owner,
            self.handle.chain_id,
            &self.sign_in,
        )
        .await?;
        info!(owner = %self.scope.owner, "authenticated with storage provider backend");
        *token = Some(session.token.clone());
        Ok(session.token)
    }

    /// Cached backend token, if [`ActiveSession::authenticate`] succeeded before.
    pub async fn token(&self) -> Option<SessionToken> {
        self.scope.token.lock().await.clone()
    }
}

/// Hands out [`ActiveSession`]s, building at most one [`SessionHandle`] per owner at a time.
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    sign_in: Arc<SignInParams>,
    scope: Mutex<Option<Arc<IdentityScope>>>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            sign_in: Arc::new(SignInParams::default()),
            scope: Mutex::new(None),
        }
    }

    pub fn with_sign_in(mut self, params: SignInParams) -> Self {
        self.sign_in = Arc::new(params);
        self
    }

    fn lock_scope(&self) -> MutexGuard<'_, Option<Arc<IdentityScope>>> {
        self.scope.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Scope of `owner`, replacing the current one when it belongs to someone else.
    fn scope_for(&self, owner: Address) -> Arc<IdentityScope> {
        let mut current = self.lock_scope();
        if let Some(scope) = current.as_ref().filter(|scope| scope.owner == owner) {
            return scope.clone();
        }
        if let Some(previous) = current.as_ref() {
            info!(from = %previous.owner, to = %owner, "identity changed, dropping cached session");
        }
        let scope = Arc::new(IdentityScope::new(owner));
        *current = Some(scope.clone());
        scope
    }

    /// Owner of the current scope.
    pub fn active_owner(&self) -> Option<Address> {
        self.lock_scope().as_ref().map(|scope| scope.owner)
    }

    /// Session for `owner`, connecting on first use.
    ///
    /// Concurrent callers for the same owner share one connection attempt. A failed attempt is
    /// not cached, the next call tries again.
    pub async fn session(&self, owner: Address) -> Result<ActiveSession, HavenError> {
        let scope = self.scope_for(owner);
        let handle = scope
            .handle
            .get_or_try_init(|| async {
                debug!(%owner, "connecting session");
                self.connector.connect(owner).await.map(Arc::new)
            })
            .await?
            .clone();

        if handle.owner != owner {
            return Err(HavenError::Unknown(format!(
                "connector returned a session for {} instead of {owner}",
                handle.owner
            )));
        }

        Ok(ActiveSession {
            scope,
            handle,
            sign_in: self.sign_in.clone(),
        })
    }

    /// Session of the owner that was used last, or [`HavenError::Unauthenticated`] if there is
    /// none.
    pub async fn active_session(&self) -> Result<ActiveSession, HavenError> {
        let owner = self.active_owner().ok_or(HavenError::Unauthenticated)?;
        self.session(owner).await
    }

    /// Explicit sign-in for `owner`, skipped when a token is cached.
    pub async fn authenticate(&self, owner: Address) -> Result<SessionToken, HavenError> {
        self.session(owner).await?.authenticate().await
    }

    /// Connects and warms the provider metadata caches so the first bucket or upload does not
    /// wait for them.
    pub async fn prefetch(&self, owner: Address) -> Result<(), HavenError> {
        let session = self.session(owner).await?;
        tokio::try_join!(session.msp_info(), session.value_prop())?;
        Ok(())
    }
}
