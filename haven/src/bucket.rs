use std::sync::Arc;

use alloy_primitives::Address;
use haven_config::Timings;
use haven_core::{BucketId, ScopedBucket};
use haven_msp_api::MspApi;
use tracing::{debug, info};

use crate::chain::{calls, wait_for_receipt};
use crate::error::{HavenError, WaitStage};
use crate::progress::Progress;
use crate::session::SessionManager;
use crate::utils::{PollStep, poll_until, with_timeout};
use crate::wallet::{TransactionRequest, ensure_chain};

/// Makes sure a named bucket exists for an owner, on chain and in the backend.
pub struct BucketProvisioner {
    sessions: Arc<SessionManager>,
    timings: Timings,
}

impl BucketProvisioner {
    pub fn new(sessions: Arc<SessionManager>, timings: Timings) -> Self {
        Self { sessions, timings }
    }

    /// Returns the id of `owner`'s bucket called `name`, creating it first if the backend does
    /// not know it.
    ///
    /// The id only depends on owner and name, so calling this again for an existing bucket costs
    /// one backend lookup and no transaction.
    pub async fn ensure_bucket(
        &self,
        owner: Address,
        name: &str,
        progress: &Progress,
    ) -> Result<BucketId, HavenError> {
        progress.report("Initializing DataHaven clients...");
        let session = self.sessions.session(owner).await?;
        let handle = session.handle();

        progress.report("Checking the wallet network...");
        ensure_chain(handle.wallet.as_ref(), handle.chain_id).await?;

        let bucket_id = ScopedBucket::new(owner, name).id();
        progress.report("Checking if bucket already exists...");
        if bucket_exists(handle.msp.as_ref(), &bucket_id).await? {
            debug!(%bucket_id, name, "bucket already exists");
            return Ok(bucket_id);
        }

        progress.report("Fetching storage provider information...");
        let (info, value_prop) = tokio::try_join!(session.msp_info(), session.value_prop())?;

        progress.report("Creating bucket. Confirm the transaction in your wallet...");
        let request = TransactionRequest {
            from: owner,
            to: handle.filesystem,
            data: calls::create_bucket(info.msp_id, name, false, value_prop),
        };
        let tx_hash = with_timeout(
            handle.wallet.send_transaction(request),
            self.timings.wallet_confirmation(),
            WaitStage::WalletConfirmation,
            "Timed out waiting for wallet confirmation",
        )
        .await?;

        progress.report("Waiting for bucket transaction to be mined...");
        let receipt = with_timeout(
            wait_for_receipt(handle.chain.as_ref(), &tx_hash, self.timings.receipt_poll()),
            self.timings.transaction_finality(),
            WaitStage::TransactionFinality,
            "Timed out waiting for bucket transaction to be mined",
        )
        .await?;
        if !receipt.succeeded {
            return Err(HavenError::TransactionFailed(tx_hash));
        }

        progress.report("Waiting for the storage provider backend to sync the bucket...");
        let msp = handle.msp.as_ref();
        poll_until(
            self.timings.bucket_sync,
            WaitStage::BackendBucketSync,
            &format!("bucket {bucket_id} not found in the backend after waiting"),
            |_| async move {
                Ok(if bucket_exists(msp, &bucket_id).await? {
                    PollStep::Ready(())
                } else {
                    PollStep::Pending
                })
            },
        )
        .await?;

        info!(%bucket_id, name, %tx_hash, "bucket created");
        Ok(bucket_id)
    }
}

/// `false` when the backend reports the bucket as missing; any other failure is an error.
async fn bucket_exists(msp: &dyn MspApi, bucket_id: &BucketId) -> Result<bool, HavenError> {
    match msp.get_bucket(bucket_id).await {
        Ok(_) => Ok(true),
        Err(err) if msp.is_not_found(&err) => Ok(false),
        Err(err) => Err(err.into()),
    }
}
