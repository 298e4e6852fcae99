use tracing::{debug, warn};

use super::{ChainParams, Wallet};
use crate::error::{HavenError, UNRECOGNIZED_CHAIN_CODE};

/// Fails with [`HavenError::NetworkMismatch`] unless the wallet is on `expected`.
pub async fn ensure_chain(wallet: &dyn Wallet, expected: u64) -> Result<(), HavenError> {
    let actual = wallet.chain_id().await?;
    if actual != expected {
        return Err(HavenError::NetworkMismatch { expected, actual });
    }
    Ok(())
}

/// Moves the wallet to the chain described by `params`, adding the chain first when the wallet
/// does not know it yet.
pub async fn switch_chain(wallet: &dyn Wallet, params: &ChainParams) -> Result<(), HavenError> {
    let chain_id = params.chain_id;
    if wallet.chain_id().await? == chain_id {
        return Ok(());
    }

    match wallet.switch_chain(chain_id).await {
        Ok(()) => Ok(()),
        Err(HavenError::Wallet {
            code: UNRECOGNIZED_CHAIN_CODE,
            ..
        }) => {
            debug!(chain_id, "wallet does not know the chain, adding it");
            wallet.add_chain(params).await.map_err(|err| match err {
                HavenError::UserRejected => err,
                other => {
                    warn!(chain_id, "adding chain failed: {other}");
                    HavenError::ChainNotAdded(chain_id)
                }
            })?;
            // Some wallets switch on add, others need to be asked again.
            wallet.switch_chain(chain_id).await
        }
        Err(err) => Err(err),
    }
}
