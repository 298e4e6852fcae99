use anyhow::Result;
use haven_core::ScopedBucket;
use haven_msp_api::fake::CallCounters;

use super::fake_network::REGISTRY_CHAIN_ID;
use super::utils::{OWNER, create_setup};
use crate::error::{HavenError, WaitStage};
use crate::progress::Progress;

#[tokio::test(start_paused = true)]
async fn test_bucket_is_created_once() -> Result<()> {
    let setup = create_setup();

    let (progress, mut events) = Progress::channel();
    let bucket_id = setup
        .context
        .ensure_bucket(OWNER, "game-assets", &progress)
        .await?;
    assert_eq!(bucket_id, ScopedBucket::new(OWNER, "game-assets").id());
    assert!(setup.network.msp.has_bucket(&bucket_id));
    assert_eq!(setup.network.sent_transactions(), 1);
    assert!(events.try_recv().is_ok());

    let again = setup
        .context
        .ensure_bucket(OWNER, "game-assets", &Progress::none())
        .await?;
    assert_eq!(again, bucket_id);
    assert_eq!(setup.network.sent_transactions(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_bucket_sync_polls_until_backend_knows_it() -> Result<()> {
    let setup = create_setup();
    // The existence check and three sync polls miss the bucket.
    setup.network.msp.hide_buckets_for(4);

    let bucket_id = setup
        .context
        .ensure_bucket(OWNER, "game-assets", &Progress::none())
        .await?;
    assert!(setup.network.msp.has_bucket(&bucket_id));
    assert_eq!(setup.network.sent_transactions(), 1);
    assert_eq!(CallCounters::get(&setup.network.msp.calls.get_bucket), 5);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_bucket_sync_gives_up_after_bounded_attempts() -> Result<()> {
    let setup = create_setup();
    setup.network.msp.hide_buckets_for(usize::MAX);

    let error = setup
        .context
        .ensure_bucket(OWNER, "game-assets", &Progress::none())
        .await
        .unwrap_err();
    assert!(
        matches!(
            error,
            HavenError::Timeout {
                stage: WaitStage::BackendBucketSync,
                ..
            }
        ),
        "{error:?}"
    );
    // One existence check plus ten sync attempts.
    assert_eq!(CallCounters::get(&setup.network.msp.calls.get_bucket), 11);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reverted_bucket_transaction_fails() -> Result<()> {
    let setup = create_setup();
    setup.network.revert_transactions(true);

    let error = setup
        .context
        .ensure_bucket(OWNER, "game-assets", &Progress::none())
        .await
        .unwrap_err();
    assert!(matches!(error, HavenError::TransactionFailed(_)), "{error:?}");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_wrong_network_sends_nothing() -> Result<()> {
    let setup = create_setup();
    setup.network.set_wallet_chain(REGISTRY_CHAIN_ID);

    let error = setup
        .context
        .ensure_bucket(OWNER, "game-assets", &Progress::none())
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        HavenError::NetworkMismatch {
            expected: 55931,
            actual: REGISTRY_CHAIN_ID
        }
    ));
    assert_eq!(setup.network.sent_transactions(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_wallet_prompt_times_out() -> Result<()> {
    let setup = create_setup();
    setup.network.hang_transactions(true);

    let started = tokio::time::Instant::now();
    let error = setup
        .context
        .ensure_bucket(OWNER, "game-assets", &Progress::none())
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        HavenError::Timeout {
            stage: WaitStage::WalletConfirmation,
            ..
        }
    ));
    assert!(started.elapsed() >= std::time::Duration::from_secs(120));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_refused_bucket_transaction_is_user_rejection() -> Result<()> {
    let setup = create_setup();
    setup.network.reject_transactions(true);

    let error = setup
        .context
        .ensure_bucket(OWNER, "game-assets", &Progress::none())
        .await
        .unwrap_err();
    assert!(error.is_user_rejected(), "{error:?}");
    assert!(!setup.network.msp.has_bucket(&ScopedBucket::new(OWNER, "game-assets").id()));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_backend_is_fatal_before_any_transaction() -> Result<()> {
    let setup = create_setup();
    setup.network.msp.set_unavailable(true);

    let error = setup
        .context
        .ensure_bucket(OWNER, "game-assets", &Progress::none())
        .await
        .unwrap_err();
    assert!(matches!(error, HavenError::Backend(_)), "{error:?}");
    assert_eq!(setup.network.sent_transactions(), 0);
    Ok(())
}
