use std::sync::atomic::Ordering;

use anyhow::Result;

use super::fake_network::{REGISTRY_CHAIN_ID, STORAGE_CHAIN_ID};
use super::utils::create_setup;
use crate::error::HavenError;
use crate::wallet::{ensure_chain, switch_chain, ChainParams};

#[tokio::test]
async fn test_switch_to_known_network() -> Result<()> {
    let setup = create_setup();
    setup.network.set_wallet_chain(REGISTRY_CHAIN_ID);

    setup.context.switch_network().await?;
    assert_eq!(setup.network.wallet_chain(), STORAGE_CHAIN_ID);
    assert_eq!(setup.network.switches.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_switch_is_skipped_on_the_right_network() -> Result<()> {
    let setup = create_setup();

    setup.context.switch_network().await?;
    assert_eq!(setup.network.switches.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_unknown_network_is_added_then_switched_to() -> Result<()> {
    let setup = create_setup();
    assert!(!setup.network.knows_chain(REGISTRY_CHAIN_ID));

    let params = ChainParams::registry_chain(&setup.context.config().registry)?;
    switch_chain(setup.network.as_ref(), &params).await?;
    assert!(setup.network.knows_chain(REGISTRY_CHAIN_ID));
    assert_eq!(setup.network.wallet_chain(), REGISTRY_CHAIN_ID);
    // The first switch is refused with 4902, the second one succeeds.
    assert_eq!(setup.network.switches.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_refusing_to_add_the_network_is_user_rejection() -> Result<()> {
    let setup = create_setup();
    setup.network.reject_add_chain(true);

    let params = ChainParams::registry_chain(&setup.context.config().registry)?;
    let error = switch_chain(setup.network.as_ref(), &params)
        .await
        .unwrap_err();
    assert!(error.is_user_rejected(), "{error:?}");
    assert_eq!(setup.network.wallet_chain(), STORAGE_CHAIN_ID);
    Ok(())
}

#[tokio::test]
async fn test_network_guard() -> Result<()> {
    let setup = create_setup();
    ensure_chain(setup.network.as_ref(), STORAGE_CHAIN_ID).await?;

    let error = ensure_chain(setup.network.as_ref(), REGISTRY_CHAIN_ID)
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        HavenError::NetworkMismatch {
            expected: REGISTRY_CHAIN_ID,
            actual: STORAGE_CHAIN_ID
        }
    ));
    Ok(())
}
