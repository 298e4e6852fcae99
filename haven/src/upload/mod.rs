//! End to end upload of one file into a bucket.
//!
//! The flow walks through [`UploadStage`]s in order. A failure aborts the flow and is reported
//! together with the stage that was being worked towards, see [`UploadError`].
pub mod prepare;

use std::sync::Arc;

use alloy_primitives::Address;
use haven_config::Timings;
use haven_core::{BucketId, FileKey, FileSource, PreparedUpload};
use haven_msp_api::{FileStatus, FileUpload, MspApi, SessionToken, UploadStatus};
use strum::Display;
use thiserror::Error;
use tracing::{debug, info};

use crate::chain::{StorageRequestIndex, calls, wait_for_receipt};
use crate::error::{HavenError, WaitStage};
use crate::progress::Progress;
use crate::session::{ActiveSession, SessionManager};
use crate::utils::{PollStep, poll_until, with_retry, with_timeout};
use crate::wallet::{TransactionRequest, ensure_chain};

pub use prepare::Preparer;

/// Number of providers asked to store a file.
pub const REPLICAS: u32 = 1;

/// States an upload passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum UploadStage {
    Prepared,
    RequestIssued,
    ChainConfirmed,
    Authenticated,
    BackendUploaded,
    ChainAcceptedMsp,
    BackendReady,
}

/// Upload failure together with the stage the flow was trying to reach.
#[derive(Debug, Error)]
#[error("upload failed before reaching {stage}: {kind}")]
pub struct UploadError {
    pub stage: UploadStage,
    #[source]
    pub kind: HavenError,
}

trait AtStage<T> {
    fn at(self, stage: UploadStage) -> Result<T, UploadError>;
}

impl<T, E: Into<HavenError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: UploadStage) -> Result<T, UploadError> {
        self.map_err(|err| UploadError {
            stage,
            kind: err.into(),
        })
    }
}

/// What a finished upload hands back to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadOutcome {
    pub file_key: FileKey,
    pub file_name: String,
    pub content_type: Option<String>,
}

/// Input of [`UploadOrchestrator::upload`].
#[derive(Debug)]
pub struct UploadRequest<'a> {
    pub bucket_id: BucketId,
    pub file: &'a FileSource,
    /// Wallet address paying for and owning the file, `None` when no wallet is connected.
    pub owner: Option<Address>,
    /// Speculative preparation to reuse. Ignored unless it was made for the same bucket, owner
    /// and file name.
    pub prepared: Option<PreparedUpload>,
}

/// Runs the upload flow against the clients of the owner's session.
pub struct UploadOrchestrator {
    sessions: Arc<SessionManager>,
    timings: Timings,
}

impl UploadOrchestrator {
    pub fn new(sessions: Arc<SessionManager>, timings: Timings) -> Self {
        Self { sessions, timings }
    }

    pub async fn upload(
        &self,
        request: UploadRequest<'_>,
        progress: &Progress,
    ) -> Result<UploadOutcome, UploadError> {
        let UploadRequest {
            bucket_id,
            file,
            owner,
            prepared,
        } = request;
        let owner = owner.ok_or(HavenError::Unauthenticated).at(UploadStage::Prepared)?;

        let session = self.sessions.session(owner).await.at(UploadStage::Prepared)?;
        let handle = session.handle().clone();
        ensure_chain(handle.wallet.as_ref(), handle.chain_id)
            .await
            .at(UploadStage::Prepared)?;

        let prepared = match prepared.filter(|p| p.matches(&bucket_id, &owner, file.name())) {
            Some(prepared) => {
                debug!(file_key = %prepared.file_key, "reusing prepared upload");
                prepared
            }
            None => {
                progress.stage(UploadStage::Prepared, "Computing file fingerprint...");
                haven_core::prepare(bucket_id, file, Some(owner))
                    .await
                    .at(UploadStage::Prepared)?
            }
        };
        let file_key = prepared.file_key;
        progress.stage(
            UploadStage::Prepared,
            format!("Prepared {} ({} bytes)", prepared.file_name, prepared.file_size),
        );

        self.issue_request(&session, &prepared, progress).await?;

        progress.stage(UploadStage::Authenticated, "Authenticating with the storage provider...");
        let token = session.authenticate().await.at(UploadStage::Authenticated)?;

        progress.stage(UploadStage::BackendUploaded, "Uploading file to the storage provider...");
        self.upload_to_backend(handle.msp.as_ref(), &token, &prepared)
            .await
            .at(UploadStage::BackendUploaded)?;

        match &handle.requests {
            Some(requests) => {
                progress.stage(
                    UploadStage::ChainAcceptedMsp,
                    "Waiting for the storage provider to confirm on chain...",
                );
                self.wait_for_acceptance(requests.as_ref(), &file_key)
                    .await
                    .at(UploadStage::ChainAcceptedMsp)?;
            }
            None => debug!(%file_key, "no storage request index, skipping chain acceptance"),
        }

        progress.stage(UploadStage::BackendReady, "Waiting for the file to become ready...");
        self.wait_for_ready(handle.msp.as_ref(), &token, &bucket_id, &file_key)
            .await
            .at(UploadStage::BackendReady)?;

        info!(%file_key, %bucket_id, name = %prepared.file_name, "upload complete");
        Ok(UploadOutcome {
            file_key,
            file_name: prepared.file_name,
            content_type: file.content_type().map(str::to_string),
        })
    }

    /// Sends the storage request and waits until the chain confirms it.
    async fn issue_request(
        &self,
        session: &ActiveSession,
        prepared: &PreparedUpload,
        progress: &Progress,
    ) -> Result<(), UploadError> {
        let handle = session.handle();

        let info = session.msp_info().await.at(UploadStage::RequestIssued)?;
        let peer_ids = info.peer_ids();
        if peer_ids.is_empty() {
            return Err(HavenError::NoStorageProvider).at(UploadStage::RequestIssued);
        }

        progress.stage(
            UploadStage::RequestIssued,
            "Issuing storage request. Confirm the transaction in your wallet...",
        );
        let request = TransactionRequest {
            from: prepared.owner,
            to: handle.filesystem,
            data: calls::issue_storage_request(prepared, info.msp_id, &peer_ids, REPLICAS),
        };
        let tx_hash = with_timeout(
            handle.wallet.send_transaction(request),
            self.timings.wallet_confirmation(),
            WaitStage::WalletConfirmation,
            "Timed out waiting for wallet confirmation",
        )
        .await
        .at(UploadStage::RequestIssued)?;

        progress.stage(
            UploadStage::ChainConfirmed,
            "Waiting for the storage request to be mined...",
        );
        let receipt = with_timeout(
            wait_for_receipt(handle.chain.as_ref(), &tx_hash, self.timings.receipt_poll()),
            self.timings.transaction_finality(),
            WaitStage::TransactionFinality,
            "Timed out waiting for the storage request to be mined",
        )
        .await
        .at(UploadStage::ChainConfirmed)?;
        if !receipt.succeeded {
            return Err(HavenError::StorageRequestFailed(tx_hash)).at(UploadStage::ChainConfirmed);
        }

        if let Some(requests) = &handle.requests {
            let found = requests
                .storage_request(&prepared.file_key)
                .await
                .at(UploadStage::ChainConfirmed)?;
            if found.is_none() {
                return Err(HavenError::StorageRequestMissing(prepared.file_key))
                    .at(UploadStage::ChainConfirmed);
            }
        }
        debug!(%tx_hash, file_key = %prepared.file_key, "storage request confirmed");
        Ok(())
    }

    async fn upload_to_backend(
        &self,
        msp: &dyn MspApi,
        token: &SessionToken,
        prepared: &PreparedUpload,
    ) -> Result<(), HavenError> {
        let upload = FileUpload {
            bucket_id: prepared.bucket_id,
            file_key: prepared.file_key,
            owner: prepared.owner,
            location: prepared.file_name.clone(),
            data: prepared.blob.clone(),
        };
        let receipt = with_retry(
            |attempt| {
                let upload = upload.clone();
                async move {
                    if attempt > 0 {
                        debug!(attempt, "retrying backend upload");
                    }
                    msp.upload_file(token, upload).await
                }
            },
            self.timings.upload_retries,
            self.timings.upload_retry_delay(),
        )
        .await?;

        match receipt.status {
            UploadStatus::UploadSuccessful => Ok(()),
            status => Err(HavenError::UploadFailed(format!(
                "backend answered {status:?} for {}",
                receipt.file_key
            ))),
        }
    }

    async fn wait_for_acceptance(
        &self,
        requests: &dyn StorageRequestIndex,
        file_key: &FileKey,
    ) -> Result<(), HavenError> {
        poll_until(
            self.timings.chain_acceptance,
            WaitStage::ChainAcceptance,
            "Timed out waiting for the storage provider to confirm on chain",
            |_| async move {
                match requests.storage_request(file_key).await? {
                    None => Err(HavenError::StorageRequestMissing(*file_key)),
                    Some(request) if request.msp_status.is_accepted() => Ok(PollStep::Ready(())),
                    Some(_) => Ok(PollStep::Pending),
                }
            },
        )
        .await
    }

    async fn wait_for_ready(
        &self,
        msp: &dyn MspApi,
        token: &SessionToken,
        bucket_id: &BucketId,
        file_key: &FileKey,
    ) -> Result<(), HavenError> {
        poll_until(
            self.timings.file_ready,
            WaitStage::BackendFileReady,
            "Timed out waiting for the file to become ready",
            |_| async move {
                match msp.get_file_info(Some(token), bucket_id, file_key).await {
                    Ok(info) => match info.status {
                        FileStatus::Ready => Ok(PollStep::Ready(())),
                        FileStatus::Rejected => Err(HavenError::BackendRejected),
                        FileStatus::Revoked => Err(HavenError::BackendRevoked),
                        FileStatus::Expired => Err(HavenError::BackendExpired),
                        FileStatus::Pending | FileStatus::Unknown => Ok(PollStep::Pending),
                    },
                    Err(err) if msp.is_not_found(&err) => Ok(PollStep::Pending),
                    Err(err) => Err(err.into()),
                }
            },
        )
        .await
    }
}
