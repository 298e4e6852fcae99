use std::sync::Arc;

use alloy_primitives::Address;
use haven_config::{Config, PollConfig, Timings};
use haven_core::BucketId;
use url::Url;

use super::fake_network::{FakeConnector, FakeNetwork, REGISTRY, TRACKER};
use crate::context::Context;
use crate::progress::Progress;
use crate::tracing::setup_tracing;

pub const OWNER: Address = Address::repeat_byte(0xaa);
pub const OTHER_OWNER: Address = Address::repeat_byte(0xbb);

pub struct Setup {
    pub network: Arc<FakeNetwork>,
    pub connector: Arc<FakeConnector>,
    pub context: Context,
}

pub fn create_setup() -> Setup {
    create_setup_with(test_config(), |connector| connector)
}

pub fn create_setup_with<F>(config: Config, customize: F) -> Setup
where
    F: FnOnce(FakeConnector) -> FakeConnector,
{
    create_setup_on(FakeNetwork::new(OWNER), config, customize)
}

pub fn create_setup_on<F>(network: Arc<FakeNetwork>, config: Config, customize: F) -> Setup
where
    F: FnOnce(FakeConnector) -> FakeConnector,
{
    setup_tracing(Some("INFO".into()));

    let connector = Arc::new(customize(FakeConnector::new(network.clone())));
    let context = Context::new(config, network.clone(), connector.clone())
        .with_registry_chain(network.clone());
    Setup {
        network,
        connector,
        context,
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.chain.rpc_url = Some(Url::parse("http://127.0.0.1:9944").unwrap());
    config.registry.rpc_url = Some(Url::parse("http://127.0.0.1:8545").unwrap());
    config.registry.contract_address = Some(REGISTRY);
    config.registry.tracker_address = Some(TRACKER);
    config
}

/// Short waits for tests which run against real sockets and cannot pause the clock.
pub fn fast_timings() -> Timings {
    Timings {
        wallet_confirmation_ms: 5_000,
        transaction_finality_ms: 5_000,
        receipt_poll_ms: 10,
        bucket_sync: PollConfig::new(10, 10),
        chain_acceptance: PollConfig::new(10, 20),
        file_ready: PollConfig::new(10, 40),
        upload_retries: 2,
        upload_retry_delay_ms: 10,
    }
}

pub async fn game_assets(setup: &Setup) -> BucketId {
    setup
        .context
        .ensure_bucket(OWNER, "game-assets", &Progress::none())
        .await
        .unwrap()
}

/// Roughly 10 KB of JSON.
pub fn json_document() -> Vec<u8> {
    let items: Vec<_> = (0..250)
        .map(|i| format!(r#"{{"id":{i},"name":"sword-{i:04}","damage":{}}}"#, i * 7 % 100))
        .collect();
    format!("[{}]", items.join(",")).into_bytes()
}
