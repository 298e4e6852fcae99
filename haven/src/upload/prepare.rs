use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy_primitives::Address;
use haven_core::{BucketId, FileSource, PreparedUpload};
use tracing::debug;

use crate::error::HavenError;

/// Speculative upload preparation.
///
/// Fingerprinting starts as soon as bucket, file and owner are known so the upload itself can
/// skip it. Inputs change while a preparation runs; every run takes a generation number and
/// only the newest one may publish its result.
#[derive(Debug, Default)]
pub struct Preparer {
    generation: AtomicU64,
    latest: Mutex<Option<PreparedUpload>>,
}

impl Preparer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_latest(&self) -> MutexGuard<'_, Option<PreparedUpload>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Prepares `file` and publishes the result.
    ///
    /// The generation is taken when this is called, not when the returned future is first
    /// polled. The future yields `Ok(None)` when newer inputs arrived in the meantime; neither
    /// the stale result nor a stale error is surfaced.
    pub fn prepare<'a>(
        &'a self,
        bucket_id: BucketId,
        file: &'a FileSource,
        owner: Option<Address>,
    ) -> impl Future<Output = Result<Option<PreparedUpload>, HavenError>> + 'a {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            let result = haven_core::prepare(bucket_id, file, owner).await;

            let mut latest = self.lock_latest();
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!(generation, name = file.name(), "discarding stale preparation");
                return Ok(None);
            }
            let prepared = result?;
            *latest = Some(prepared.clone());
            Ok(Some(prepared))
        }
    }

    /// Inputs changed: forget the published result and make runs in flight stale.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.lock_latest().take();
    }

    pub fn latest(&self) -> Option<PreparedUpload> {
        self.lock_latest().clone()
    }

    /// Published result, if it was made for exactly these inputs.
    pub fn matching(
        &self,
        bucket_id: &BucketId,
        owner: &Address,
        file_name: &str,
    ) -> Option<PreparedUpload> {
        self.lock_latest()
            .as_ref()
            .filter(|prepared| prepared.matches(bucket_id, owner, file_name))
            .cloned()
    }
}
