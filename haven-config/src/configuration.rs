use std::path::PathBuf;
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::Result;
use clap::Args;
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const ENV_PREFIX: &str = "HAVEN_";

pub const CONFIG_FILE_NAME: &str = "config.yaml";

const DEFAULT_CHAIN_ID: u64 = 55931;
const DEFAULT_RPC_URL: &str = "https://services.datahaven-testnet.network/testnet";
const DEFAULT_WS_URL: &str = "wss://services.datahaven-testnet.network/testnet";
const DEFAULT_MSP_URL: &str = "https://deo-dh-backend.testnet.datahaven-infra.network/";
const DEFAULT_REGISTRY_CHAIN_ID: u64 = 11155111;

/// A required setting is absent. Carries the dotted name of the setting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0} is not configured")]
pub struct ConfigError(pub &'static str);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chain: ChainConfig,
    pub msp: MspConfig,
    pub wallet: WalletConfig,
    pub registry: RegistryConfig,
    pub timings: Timings,
    pub log_level: Option<String>,
}

/// Storage network chain: EVM JSON-RPC endpoint plus the file system precompile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub chain_name: String,
    pub rpc_url: Option<Url>,
    pub ws_url: Option<Url>,
    pub filesystem_address: Option<Address>,
    /// JSON-RPC method answering storage request lookups by file key. Without it uploads skip
    /// waiting for the provider's on-chain acceptance.
    pub storage_request_method: Option<String>,
    pub explorer_url: Option<Url>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            chain_name: "DataHaven Testnet".to_string(),
            rpc_url: Url::parse(DEFAULT_RPC_URL).ok(),
            ws_url: Url::parse(DEFAULT_WS_URL).ok(),
            filesystem_address: None,
            storage_request_method: None,
            explorer_url: Url::parse("https://explorer.datahaven-testnet.network/").ok(),
        }
    }
}

impl ChainConfig {
    pub fn require_rpc_url(&self) -> Result<&Url, ConfigError> {
        self.rpc_url.as_ref().ok_or(ConfigError("chain.rpc_url"))
    }

    pub fn require_ws_url(&self) -> Result<&Url, ConfigError> {
        self.ws_url.as_ref().ok_or(ConfigError("chain.ws_url"))
    }

    pub fn require_filesystem_address(&self) -> Result<Address, ConfigError> {
        self.filesystem_address
            .ok_or(ConfigError("chain.filesystem_address"))
    }
}

/// Main storage provider backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MspConfig {
    pub base_url: Option<Url>,
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for MspConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_MSP_URL).ok(),
            timeout_ms: 300_000,
            connect_timeout_ms: 20_000,
        }
    }
}

impl MspConfig {
    pub fn require_base_url(&self) -> Result<&Url, ConfigError> {
        self.base_url.as_ref().ok_or(ConfigError("msp.base_url"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    MetaMask,
    Okx,
    #[default]
    Other,
}

/// An EIP-1193 wallet reachable over JSON-RPC.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalletProviderConfig {
    pub url: Url,
    #[serde(default)]
    pub kind: WalletKind,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub providers: Vec<WalletProviderConfig>,
}

/// Asset registry and upload tracker contracts, usually on a different chain than storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub chain_id: u64,
    pub rpc_url: Option<Url>,
    pub contract_address: Option<Address>,
    pub tracker_address: Option<Address>,
    pub tracker_chain_id: Option<u64>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_REGISTRY_CHAIN_ID,
            rpc_url: None,
            contract_address: None,
            tracker_address: None,
            tracker_chain_id: None,
        }
    }
}

impl RegistryConfig {
    pub fn require_rpc_url(&self) -> Result<&Url, ConfigError> {
        self.rpc_url.as_ref().ok_or(ConfigError("registry.rpc_url"))
    }

    pub fn require_contract_address(&self) -> Result<Address, ConfigError> {
        self.contract_address
            .ok_or(ConfigError("registry.contract_address"))
    }

    pub fn tracker_chain_id(&self) -> u64 {
        self.tracker_chain_id.unwrap_or(self.chain_id)
    }

    pub fn chain_name(&self) -> &'static str {
        match self.chain_id {
            11155111 => "Sepolia",
            31337 => "Localhost 8545",
            _ => "Contract Network",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub max_attempts: usize,
}

impl PollConfig {
    pub const fn new(interval_ms: u64, max_attempts: usize) -> Self {
        Self {
            interval_ms,
            max_attempts,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Bounds for every wait in bucket provisioning and uploads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub wallet_confirmation_ms: u64,
    pub transaction_finality_ms: u64,
    pub receipt_poll_ms: u64,
    pub bucket_sync: PollConfig,
    pub chain_acceptance: PollConfig,
    pub file_ready: PollConfig,
    pub upload_retries: usize,
    pub upload_retry_delay_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            wallet_confirmation_ms: 120_000,
            transaction_finality_ms: 120_000,
            receipt_poll_ms: 1_000,
            bucket_sync: PollConfig::new(2_000, 10),
            chain_acceptance: PollConfig::new(2_000, 20),
            file_ready: PollConfig::new(5_000, 40),
            upload_retries: 2,
            upload_retry_delay_ms: 2_000,
        }
    }
}

impl Timings {
    pub fn wallet_confirmation(&self) -> Duration {
        Duration::from_millis(self.wallet_confirmation_ms)
    }

    pub fn transaction_finality(&self) -> Duration {
        Duration::from_millis(self.transaction_finality_ms)
    }

    pub fn receipt_poll(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms)
    }

    pub fn upload_retry_delay(&self) -> Duration {
        Duration::from_millis(self.upload_retry_delay_ms)
    }
}

/// Command line flags which override file and environment configuration.
#[derive(Args, Clone, Debug, Default)]
pub struct ConfigArgs {
    /// Path to a YAML configuration file
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level, either a bare level ("debug") or a full filter directive
    #[arg(short = 'l', long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Storage network JSON-RPC endpoint
    #[arg(long, value_name = "URL")]
    pub rpc_url: Option<Url>,

    /// Storage provider backend endpoint
    #[arg(long, value_name = "URL")]
    pub msp_url: Option<Url>,
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("network", "haven", "haven")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

/// Layers defaults, the YAML file, `HAVEN_*` environment variables and command line flags, in
/// that order of increasing priority.
pub fn figment(args: &ConfigArgs) -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

    if let Some(path) = args.config.clone().or_else(default_config_path) {
        figment = figment.merge(Yaml::file(path));
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    if let Some(level) = &args.log_level {
        figment = figment.merge(Serialized::default("log_level", level));
    }
    if let Some(url) = &args.rpc_url {
        figment = figment.merge(Serialized::default("chain.rpc_url", url.as_str()));
    }
    if let Some(url) = &args.msp_url {
        figment = figment.merge(Serialized::default("msp.base_url", url.as_str()));
    }
    figment
}

pub fn load_config(args: &ConfigArgs) -> Result<Config> {
    let config: Config = figment(args).extract()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use alloy_primitives::Address;
    use figment::Jail;
    use url::Url;

    use super::{Config, ConfigArgs, ConfigError, PollConfig, WalletKind, figment};

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.chain.chain_id, 55931);
        assert_eq!(config.registry.chain_id, 11155111);
        assert_eq!(config.timings.file_ready, PollConfig::new(5_000, 40));
        assert_eq!(config.timings.upload_retries, 2);
        assert_eq!(
            config.chain.require_filesystem_address(),
            Err(ConfigError("chain.filesystem_address"))
        );
        assert_eq!(
            config.registry.require_contract_address(),
            Err(ConfigError("registry.contract_address"))
        );
    }

    #[test]
    fn file_env_and_flags_are_layered() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "haven.yaml",
                r#"
chain:
  chain_id: 1337
  filesystem_address: "0x0000000000000000000000000000000000000404"
msp:
  base_url: "http://file.example/"
wallet:
  providers:
    - url: "http://127.0.0.1:1248"
      kind: okx
timings:
  bucket_sync:
    interval_ms: 10
    max_attempts: 3
"#,
            )?;
            jail.set_env("HAVEN_MSP__BASE_URL", "http://env.example/");
            jail.set_env("HAVEN_CHAIN__RPC_URL", "http://rpc.env.example/");

            let args = ConfigArgs {
                config: Some(PathBuf::from("haven.yaml")),
                rpc_url: Some(Url::parse("http://rpc.flag.example/").unwrap()),
                ..ConfigArgs::default()
            };
            let config: Config = figment(&args).extract()?;

            assert_eq!(config.chain.chain_id, 1337);
            let expected: Address = "0x0000000000000000000000000000000000000404"
                .parse()
                .unwrap();
            assert_eq!(config.chain.filesystem_address, Some(expected));
            assert_eq!(
                config.msp.base_url.as_ref().map(Url::as_str),
                Some("http://env.example/")
            );
            assert_eq!(
                config.chain.rpc_url.as_ref().map(Url::as_str),
                Some("http://rpc.flag.example/")
            );
            assert_eq!(config.wallet.providers.len(), 1);
            assert_eq!(config.wallet.providers[0].kind, WalletKind::Okx);
            assert_eq!(config.timings.bucket_sync, PollConfig::new(10, 3));
            // Untouched sections keep their defaults.
            assert_eq!(config.timings.file_ready, PollConfig::new(5_000, 40));
            Ok(())
        });
    }

    #[test]
    fn tracker_chain_falls_back_to_registry_chain() {
        let mut config = Config::default();
        assert_eq!(config.registry.tracker_chain_id(), 11155111);
        config.registry.tracker_chain_id = Some(31337);
        assert_eq!(config.registry.tracker_chain_id(), 31337);
    }
}
