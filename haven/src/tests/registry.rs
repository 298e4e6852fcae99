use anyhow::Result;

use super::fake_network::REGISTRY_CHAIN_ID;
use super::utils::{OTHER_OWNER, OWNER, create_setup, create_setup_with, test_config};
use crate::error::HavenError;

#[tokio::test]
async fn test_assets_are_saved_listed_and_deleted() -> Result<()> {
    let setup = create_setup();
    let registry = setup.context.registry()?;
    assert!(registry.is_configured());

    registry.ensure_contract_chain().await?;
    assert_eq!(setup.network.wallet_chain(), REGISTRY_CHAIN_ID);

    registry.save_asset(OWNER, "0xcid-one").await?;
    registry.save_asset(OWNER, "0xcid-two").await?;
    registry.save_asset(OTHER_OWNER, "0xcid-other").await?;
    assert_eq!(
        registry.get_assets(OWNER).await?,
        vec!["0xcid-one".to_string(), "0xcid-two".to_string()]
    );

    registry.delete_asset(OWNER, "0xcid-one").await?;
    assert_eq!(registry.get_assets(OWNER).await?, vec!["0xcid-two".to_string()]);
    assert!(registry.get_assets(Default::default()).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_registry_requires_a_contract_address() -> Result<()> {
    let mut config = test_config();
    config.registry.contract_address = None;
    let setup = create_setup_with(config, |connector| connector);
    let registry = setup.context.registry()?;

    let error = registry.get_assets(OWNER).await.unwrap_err();
    assert!(matches!(
        error,
        HavenError::ConfigurationMissing("registry.contract_address")
    ));
    let error = registry.save_asset(OWNER, "0xcid").await.unwrap_err();
    assert!(matches!(
        error,
        HavenError::ConfigurationMissing("registry.contract_address")
    ));
    assert_eq!(setup.network.sent_transactions(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_tracker_records_uploads() -> Result<()> {
    let setup = create_setup();
    let tracker = setup.context.tracker()?;

    // The tracker never switches networks on its own.
    let error = tracker.track(OWNER, "0xcid").await.unwrap_err();
    assert!(matches!(error, HavenError::NetworkMismatch { .. }), "{error:?}");

    setup.network.set_wallet_chain(REGISTRY_CHAIN_ID);
    tracker.track(OWNER, "0xcid").await?;
    assert_eq!(*setup.network.tracked.lock().unwrap(), vec!["0xcid".to_string()]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_tracker_input_and_configuration() -> Result<()> {
    let setup = create_setup();
    setup.network.set_wallet_chain(REGISTRY_CHAIN_ID);
    let tracker = setup.context.tracker()?;

    let error = tracker.track(OWNER, "   ").await.unwrap_err();
    assert!(matches!(error, HavenError::InvalidCid));

    setup.network.reject_transactions(true);
    let error = tracker.track(OWNER, "0xcid").await.unwrap_err();
    assert!(error.is_user_rejected(), "{error:?}");

    let mut config = test_config();
    config.registry.tracker_address = None;
    let unconfigured = create_setup_with(config, |connector| connector);
    let error = unconfigured
        .context
        .tracker()?
        .track(OWNER, "0xcid")
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        HavenError::ConfigurationMissing("registry.tracker_address")
    ));
    Ok(())
}
