use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures_util::{StreamExt, stream};
use haven_core::{Address, BucketId, FileKey, ProviderId, ValuePropId};
use tracing::debug;

use crate::api::{
    HTTP_AUTH_VERIFY_ROUTE, HTTP_HEALTH_ROUTE, HTTP_INFO_ROUTE, HTTP_VALUE_PROPS_ROUTE, MspApi,
    bucket_route, file_info_route, file_upload_route,
};
use crate::error::{MspApiError, NOT_FOUND_RECORD};
use crate::status::{
    Bucket, Download, FileInfo, FileStatus, FileUpload, HealthStatus, MspInfo, NonceRequest,
    NonceResponse, ServiceStatus, Session, SessionToken, SessionUser, UploadReceipt, UploadStatus,
    ValueProp, VerifyRequest,
};

pub const FAKE_PEER_ID: &str = "12D3KooWFakeMspPeer";

struct StoredFile {
    info: FileInfo,
    data: Bytes,
}

/// Counts how often each backend operation was invoked.
#[derive(Default, Debug)]
pub struct CallCounters {
    pub info: AtomicUsize,
    pub value_props: AtomicUsize,
    pub nonce: AtomicUsize,
    pub verify: AtomicUsize,
    pub get_bucket: AtomicUsize,
    pub file_info: AtomicUsize,
    pub upload: AtomicUsize,
    pub download: AtomicUsize,
}

impl CallCounters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// In-memory backend which behaves like a main storage provider.
///
/// Buckets only appear once something (usually a fake chain) calls [`FakeMsp::insert_bucket`].
/// Uploaded files start out as [`FileStatus::Pending`] unless a status script was registered for
/// their key, in which case every file info lookup consumes the next scripted status and the last
/// one sticks.
///
/// Failure injection:
///
/// * `fail_next_uploads(n)` answers the next `n` uploads with a 503.
/// * `reject_uploads(true)` answers uploads with a non-successful receipt.
/// * `hide_buckets_for(n)` answers the next `n` bucket lookups with "not found".
/// * `set_unavailable(true)` answers every call with a transport error.
pub struct FakeMsp {
    info: Mutex<MspInfo>,
    value_props: Mutex<Vec<ValueProp>>,
    buckets: DashMap<BucketId, Bucket>,
    files: DashMap<FileKey, StoredFile>,
    status_scripts: DashMap<FileKey, VecDeque<FileStatus>>,
    nonces: DashMap<String, Address>,
    sessions: DashMap<String, Address>,
    session_ids: AtomicU64,
    failing_uploads: AtomicUsize,
    hidden_bucket_lookups: AtomicUsize,
    rejecting_uploads: AtomicBool,
    unavailable: AtomicBool,
    pub calls: CallCounters,
}

impl Default for FakeMsp {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeMsp {
    pub fn new() -> FakeMsp {
        FakeMsp {
            info: Mutex::new(MspInfo {
                msp_id: ProviderId::new([0x4d; 32]),
                multiaddresses: vec![format!("/ip4/127.0.0.1/tcp/30333/p2p/{FAKE_PEER_ID}")],
            }),
            value_props: Mutex::new(vec![ValueProp {
                id: ValuePropId::new([0x56; 32]),
                price_per_giga_unit_of_data_per_block: Some("100".to_string()),
                is_available: true,
            }]),
            buckets: DashMap::new(),
            files: DashMap::new(),
            status_scripts: DashMap::new(),
            nonces: DashMap::new(),
            sessions: DashMap::new(),
            session_ids: AtomicU64::new(1),
            failing_uploads: AtomicUsize::new(0),
            hidden_bucket_lookups: AtomicUsize::new(0),
            rejecting_uploads: AtomicBool::new(false),
            unavailable: AtomicBool::new(false),
            calls: CallCounters::default(),
        }
    }

    pub fn msp_id(&self) -> ProviderId {
        lock(&self.info).msp_id
    }

    pub fn set_multiaddresses(&self, multiaddresses: Vec<String>) {
        lock(&self.info).multiaddresses = multiaddresses;
    }

    pub fn set_value_props(&self, value_props: Vec<ValueProp>) {
        *lock(&self.value_props) = value_props;
    }

    pub fn insert_bucket(&self, bucket_id: BucketId, name: &str) {
        debug!(%bucket_id, name, "fake MSP learned about bucket");
        self.buckets.insert(
            bucket_id,
            Bucket {
                bucket_id,
                name: name.to_string(),
                root: None,
                is_public: false,
                size_bytes: 0,
                file_count: 0,
            },
        );
    }

    pub fn has_bucket(&self, bucket_id: &BucketId) -> bool {
        self.buckets.contains_key(bucket_id)
    }

    /// Makes a file known to the backend without going through an upload.
    pub fn insert_file(&self, bucket_id: BucketId, file_key: FileKey, location: &str, data: Bytes) {
        self.files.insert(
            file_key,
            StoredFile {
                info: FileInfo {
                    file_key,
                    bucket_id,
                    location: location.to_string(),
                    size: data.len() as u64,
                    status: FileStatus::Ready,
                },
                data,
            },
        );
    }

    pub fn file_data(&self, file_key: &FileKey) -> Option<Bytes> {
        self.files.get(file_key).map(|file| file.data.clone())
    }

    pub fn set_file_status(&self, file_key: &FileKey, status: FileStatus) {
        self.status_scripts.remove(file_key);
        if let Some(mut file) = self.files.get_mut(file_key) {
            file.info.status = status;
        }
    }

    /// Registers the statuses successive file info lookups for `file_key` report.
    pub fn script_file_statuses(&self, file_key: FileKey, statuses: Vec<FileStatus>) {
        self.status_scripts.insert(file_key, statuses.into());
    }

    pub fn fail_next_uploads(&self, count: usize) {
        self.failing_uploads.store(count, Ordering::SeqCst);
    }

    pub fn reject_uploads(&self, reject: bool) {
        self.rejecting_uploads.store(reject, Ordering::SeqCst);
    }

    pub fn hide_buckets_for(&self, lookups: usize) {
        self.hidden_bucket_lookups.store(lookups, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    fn check_available(&self, route: &str) -> Result<(), MspApiError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MspApiError::Transport {
                route: route.to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    fn session_owner(&self, route: &str, token: &SessionToken) -> Result<Address, MspApiError> {
        self.sessions
            .get(token.as_str())
            .map(|owner| *owner)
            .ok_or_else(|| MspApiError::Status {
                route: route.to_string(),
                status: 401,
                error: Some("Unauthorized: invalid session".to_string()),
            })
    }

    /// Consumes one unit of a countdown, returning whether it was still positive.
    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn not_found(route: String) -> MspApiError {
    MspApiError::Status {
        route,
        status: 404,
        error: Some(NOT_FOUND_RECORD.to_string()),
    }
}

#[async_trait]
impl MspApi for FakeMsp {
    async fn health(&self) -> Result<HealthStatus, MspApiError> {
        self.check_available(HTTP_HEALTH_ROUTE)?;
        Ok(HealthStatus {
            status: ServiceStatus::Healthy,
            msg: None,
        })
    }

    async fn info(&self) -> Result<MspInfo, MspApiError> {
        self.calls.info.fetch_add(1, Ordering::SeqCst);
        self.check_available(HTTP_INFO_ROUTE)?;
        Ok(lock(&self.info).clone())
    }

    async fn value_props(&self) -> Result<Vec<ValueProp>, MspApiError> {
        self.calls.value_props.fetch_add(1, Ordering::SeqCst);
        self.check_available(HTTP_VALUE_PROPS_ROUTE)?;
        Ok(lock(&self.value_props).clone())
    }

    async fn nonce(&self, request: &NonceRequest) -> Result<NonceResponse, MspApiError> {
        let id = self.calls.nonce.fetch_add(1, Ordering::SeqCst);
        let nonce = format!("nonce{id}");
        let message = format!(
            "{domain} wants you to sign in with your Ethereum account:\n{address}\n\nURI: {uri}\nVersion: 1\nChain ID: {chain_id}\nNonce: {nonce}",
            domain = request.domain,
            address = request.address,
            uri = request.uri,
            chain_id = request.chain_id,
        );
        self.nonces.insert(message.clone(), request.address);
        Ok(NonceResponse {
            message,
            nonce: Some(nonce),
        })
    }

    async fn verify(&self, request: &VerifyRequest) -> Result<Session, MspApiError> {
        self.calls.verify.fetch_add(1, Ordering::SeqCst);
        let unauthorized = |error: &str| MspApiError::Status {
            route: HTTP_AUTH_VERIFY_ROUTE.to_string(),
            status: 401,
            error: Some(error.to_string()),
        };
        if request.signature.is_empty() {
            return Err(unauthorized("Unauthorized: missing signature"));
        }
        let (_, address) = self
            .nonces
            .remove(&request.message)
            .ok_or_else(|| unauthorized("Unauthorized: unknown sign-in message"))?;

        let token = format!("session-{}", self.session_ids.fetch_add(1, Ordering::SeqCst));
        self.sessions.insert(token.clone(), address);
        Ok(Session {
            token: SessionToken::new(token),
            user: SessionUser { address },
        })
    }

    async fn get_bucket(&self, bucket_id: &BucketId) -> Result<Bucket, MspApiError> {
        self.calls.get_bucket.fetch_add(1, Ordering::SeqCst);
        let route = bucket_route(bucket_id);
        self.check_available(&route)?;
        if Self::take(&self.hidden_bucket_lookups) {
            return Err(not_found(route));
        }
        self.buckets
            .get(bucket_id)
            .map(|bucket| bucket.clone())
            .ok_or_else(|| not_found(route))
    }

    async fn get_file_info(
        &self,
        _token: Option<&SessionToken>,
        bucket_id: &BucketId,
        file_key: &FileKey,
    ) -> Result<FileInfo, MspApiError> {
        self.calls.file_info.fetch_add(1, Ordering::SeqCst);
        let route = file_info_route(bucket_id, file_key);
        self.check_available(&route)?;
        let mut file = self
            .files
            .get_mut(file_key)
            .ok_or_else(|| not_found(route.clone()))?;

        if let Some(mut script) = self.status_scripts.get_mut(file_key) {
            let status = if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().copied()
            };
            if let Some(status) = status {
                file.info.status = status;
            }
        }
        Ok(file.info.clone())
    }

    async fn upload_file(
        &self,
        token: &SessionToken,
        upload: FileUpload,
    ) -> Result<UploadReceipt, MspApiError> {
        self.calls.upload.fetch_add(1, Ordering::SeqCst);
        let route = file_upload_route(&upload.bucket_id, &upload.file_key);
        self.check_available(&route)?;
        let owner = self.session_owner(&route, token)?;

        if Self::take(&self.failing_uploads) {
            return Err(MspApiError::Status {
                route,
                status: 503,
                error: Some("Service unavailable".to_string()),
            });
        }

        if self.rejecting_uploads.load(Ordering::SeqCst) {
            return Ok(UploadReceipt {
                status: UploadStatus::Failed,
                file_key: upload.file_key,
                bucket_id: upload.bucket_id,
            });
        }

        if owner != upload.owner {
            return Err(MspApiError::Status {
                route,
                status: 403,
                error: Some("Forbidden: session does not own the upload".to_string()),
            });
        }

        debug!(file_key = %upload.file_key, size = upload.data.len(), "fake MSP stored file");
        self.files.insert(
            upload.file_key,
            StoredFile {
                info: FileInfo {
                    file_key: upload.file_key,
                    bucket_id: upload.bucket_id,
                    location: upload.location,
                    size: upload.data.len() as u64,
                    status: FileStatus::Pending,
                },
                data: upload.data,
            },
        );
        Ok(UploadReceipt {
            status: UploadStatus::UploadSuccessful,
            file_key: upload.file_key,
            bucket_id: upload.bucket_id,
        })
    }

    async fn download_file(
        &self,
        _token: Option<&SessionToken>,
        file_key: &FileKey,
    ) -> Result<Download, MspApiError> {
        self.calls.download.fetch_add(1, Ordering::SeqCst);
        let Some(data) = self.file_data(file_key) else {
            return Ok(Download {
                status: 404,
                stream: stream::empty().boxed(),
            });
        };

        // Split into two chunks so consumers have to reassemble the body.
        let middle = data.len() / 2;
        let chunks = vec![Ok(data.slice(..middle)), Ok(data.slice(middle..))];
        Ok(Download {
            status: 200,
            stream: stream::iter(chunks).boxed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use haven_core::{Address, BucketId, FileKey};

    use super::{CallCounters, FAKE_PEER_ID, FakeMsp};
    use crate::api::MspApi;
    use crate::status::{FileStatus, FileUpload, NonceRequest, UploadStatus, VerifyRequest};

    async fn session(fake: &FakeMsp, owner: Address) -> crate::status::SessionToken {
        let nonce = fake
            .nonce(&NonceRequest {
                address: owner,
                chain_id: 1,
                domain: "localhost".into(),
                uri: "http://localhost".into(),
            })
            .await
            .unwrap();
        fake.verify(&VerifyRequest {
            message: nonce.message,
            signature: "0x01".into(),
        })
        .await
        .unwrap()
        .token
    }

    fn upload(owner: Address) -> FileUpload {
        FileUpload {
            bucket_id: BucketId::new([1; 32]),
            file_key: FileKey::new([2; 32]),
            owner,
            location: "a.json".into(),
            data: Bytes::from_static(b"abc"),
        }
    }

    #[tokio::test]
    async fn scripted_statuses_are_consumed_in_order() {
        let fake = FakeMsp::new();
        let owner = Address::repeat_byte(1);
        let token = session(&fake, owner).await;
        fake.upload_file(&token, upload(owner)).await.unwrap();
        fake.script_file_statuses(
            FileKey::new([2; 32]),
            vec![FileStatus::Pending, FileStatus::Ready],
        );

        let bucket = BucketId::new([1; 32]);
        let key = FileKey::new([2; 32]);
        let first = fake.get_file_info(None, &bucket, &key).await.unwrap();
        let second = fake.get_file_info(None, &bucket, &key).await.unwrap();
        let third = fake.get_file_info(None, &bucket, &key).await.unwrap();
        assert_eq!(first.status, FileStatus::Pending);
        assert_eq!(second.status, FileStatus::Ready);
        assert_eq!(third.status, FileStatus::Ready);
    }

    #[tokio::test]
    async fn injected_failures_run_out() {
        let fake = FakeMsp::new();
        let owner = Address::repeat_byte(1);
        let token = session(&fake, owner).await;
        fake.fail_next_uploads(1);

        let error = fake.upload_file(&token, upload(owner)).await.unwrap_err();
        assert_eq!(error.status(), Some(503));
        let receipt = fake.upload_file(&token, upload(owner)).await.unwrap();
        assert_eq!(receipt.status, UploadStatus::UploadSuccessful);
        assert_eq!(CallCounters::get(&fake.calls.upload), 2);
    }

    #[tokio::test]
    async fn hidden_buckets_reappear() {
        let fake = FakeMsp::new();
        let bucket = BucketId::new([3; 32]);
        fake.insert_bucket(bucket, "b");
        fake.hide_buckets_for(1);
        let error = fake.get_bucket(&bucket).await.unwrap_err();
        assert!(fake.is_not_found(&error));
        assert!(fake.get_bucket(&bucket).await.is_ok());
    }

    #[tokio::test]
    async fn sign_in_message_is_single_use() {
        let fake = FakeMsp::new();
        let nonce = fake
            .nonce(&NonceRequest {
                address: Address::repeat_byte(1),
                chain_id: 1,
                domain: "localhost".into(),
                uri: "http://localhost".into(),
            })
            .await
            .unwrap();
        let verify = VerifyRequest {
            message: nonce.message,
            signature: "0x01".into(),
        };
        assert!(fake.verify(&verify).await.is_ok());
        assert_eq!(fake.verify(&verify).await.unwrap_err().status(), Some(401));
        assert_eq!(fake.info().await.unwrap().peer_ids(), vec![FAKE_PEER_ID]);
    }
}
