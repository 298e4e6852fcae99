use std::sync::Arc;

use anyhow::{Context as AnyhowContext, Result};
use haven_config::{Config, ConfigArgs, load_config};

use crate::chain::{ChainClient, RpcChain};
use crate::context::Context;
use crate::session::RpcConnector;
use crate::session::connector::RPC_REQUEST_TIMEOUT;
use crate::tracing::setup_tracing;
use crate::wallet::{RpcWallet, Wallet};

#[derive(Debug)]
pub struct ContextBuilder {
    config: Config,
}

impl ContextBuilder {
    pub fn new(config: Config) -> Self {
        setup_tracing(config.log_level.clone());
        ContextBuilder { config }
    }

    /// Loads the configuration from file, environment and command line flags.
    pub fn from_cli(args: &ConfigArgs) -> Result<Self> {
        let config = load_config(args).context("could not load configuration")?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Builds the [`Context`]. Nothing is contacted yet: sessions connect lazily on first use.
    pub fn build(&self) -> Result<Context> {
        let config = self.config.clone();
        let wallet: Arc<dyn Wallet> = Arc::new(
            RpcWallet::from_config(&config.wallet, config.timings.wallet_confirmation())
                .context("no usable wallet provider configured")?,
        );
        let connector = Arc::new(RpcConnector::new(config.clone()).with_wallet(wallet.clone()));

        let registry_chain = match &config.registry.rpc_url {
            Some(url) => Some(Arc::new(
                RpcChain::new(url.clone(), RPC_REQUEST_TIMEOUT)
                    .context("failed to create registry chain client")?,
            ) as Arc<dyn ChainClient>),
            None => None,
        };

        let context = Context::new(config, wallet, connector);
        Ok(match registry_chain {
            Some(chain) => context.with_registry_chain(chain),
            None => context,
        })
    }
}
