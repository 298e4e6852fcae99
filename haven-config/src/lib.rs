pub mod configuration;

pub use configuration::{
    ChainConfig, Config, ConfigArgs, ConfigError, MspConfig, PollConfig, RegistryConfig, Timings,
    WalletConfig, WalletKind, WalletProviderConfig, load_config,
};
