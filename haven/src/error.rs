use haven_config::ConfigError;
use haven_core::{FileKey, PrepareError, TxHash};
use haven_msp_api::MspApiError;
use strum::Display;
use thiserror::Error;

/// EIP-1193 error code for a request the user refused.
pub const USER_REJECTED_CODE: i64 = 4001;

/// EIP-1193 error code for a chain the wallet does not know about.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// Bounded waits, named so a timeout says what it was waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum WaitStage {
    BackendConnect,
    WalletConfirmation,
    TransactionFinality,
    BackendBucketSync,
    ChainAcceptance,
    BackendFileReady,
}

#[derive(Debug, Error)]
pub enum HavenError {
    #[error("{0} is not configured")]
    ConfigurationMissing(&'static str),

    #[error("no wallet or session is available for this operation")]
    Unauthenticated,

    #[error("request was rejected in the wallet")]
    UserRejected,

    #[error("wallet is on chain {actual}, expected chain {expected}")]
    NetworkMismatch { expected: u64, actual: u64 },

    #[error("transaction {0} did not succeed")]
    TransactionFailed(TxHash),

    #[error("storage request transaction {0} did not succeed")]
    StorageRequestFailed(TxHash),

    #[error("file was rejected by the storage provider")]
    BackendRejected,

    #[error("file upload was revoked")]
    BackendRevoked,

    #[error("storage request expired")]
    BackendExpired,

    #[error("timed out during {stage}: {message}")]
    Timeout { stage: WaitStage, message: String },

    #[error("storage provider has no reachable peer")]
    NoStorageProvider,

    #[error("storage request for {0} no longer exists on chain")]
    StorageRequestMissing(FileKey),

    #[error("upload to the storage provider did not succeed: {0}")]
    UploadFailed(String),

    #[error("download failed with status {0}")]
    DownloadFailed(u16),

    #[error("storage provider backend is unavailable: {0}")]
    BackendUnavailable(String),

    #[error("chain {0} could not be added to the wallet")]
    ChainNotAdded(u64),

    #[error("content id must not be empty")]
    InvalidCid,

    #[error(transparent)]
    Backend(#[from] MspApiError),

    #[error("chain request failed: {0}")]
    Chain(String),

    #[error("wallet request failed ({code}): {message}")]
    Wallet { code: i64, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Unknown(String),
}

impl HavenError {
    pub fn timeout(stage: WaitStage, message: impl Into<String>) -> Self {
        HavenError::Timeout {
            stage,
            message: message.into(),
        }
    }

    /// Classifies an error returned by a wallet request.
    pub fn from_wallet(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        if code == USER_REJECTED_CODE
            || lowered.contains("user rejected")
            || lowered.contains("user denied")
        {
            HavenError::UserRejected
        } else {
            HavenError::Wallet { code, message }
        }
    }

    pub fn is_user_rejected(&self) -> bool {
        matches!(self, HavenError::UserRejected)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, HavenError::Timeout { .. })
    }
}

impl From<ConfigError> for HavenError {
    fn from(error: ConfigError) -> Self {
        HavenError::ConfigurationMissing(error.0)
    }
}

impl From<PrepareError> for HavenError {
    fn from(error: PrepareError) -> Self {
        match error {
            PrepareError::Unauthenticated => HavenError::Unauthenticated,
            PrepareError::Io(error) => HavenError::Io(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use haven_config::ConfigError;

    use super::{HavenError, WaitStage};

    #[test]
    fn wallet_errors_are_classified() {
        assert!(HavenError::from_wallet(4001, "rejected").is_user_rejected());
        assert!(HavenError::from_wallet(-32000, "User denied transaction signature").is_user_rejected());
        assert!(matches!(
            HavenError::from_wallet(-32603, "insufficient funds"),
            HavenError::Wallet { code: -32603, .. }
        ));
    }

    #[test]
    fn missing_configuration_names_the_setting() {
        let error: HavenError = ConfigError("chain.rpc_url").into();
        assert_eq!(error.to_string(), "chain.rpc_url is not configured");
    }

    #[test]
    fn timeouts_name_their_stage() {
        let error = HavenError::timeout(WaitStage::BackendBucketSync, "bucket not visible");
        assert!(error.is_timeout());
        assert_eq!(
            error.to_string(),
            "timed out during backend_bucket_sync: bucket not visible"
        );
    }
}
