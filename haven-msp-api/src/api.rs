use async_trait::async_trait;
use haven_core::{BucketId, FileKey};

use crate::error::{self, MspApiError};
use crate::status::{
    Bucket, Download, FileInfo, FileUpload, HealthStatus, MspInfo, NonceRequest, NonceResponse,
    Session, SessionToken, UploadReceipt, ValueProp, VerifyRequest,
};

pub const HTTP_HEALTH_ROUTE: &str = "/health";
pub const HTTP_INFO_ROUTE: &str = "/info";
pub const HTTP_VALUE_PROPS_ROUTE: &str = "/value-props";
pub const HTTP_AUTH_NONCE_ROUTE: &str = "/auth/nonce";
pub const HTTP_AUTH_VERIFY_ROUTE: &str = "/auth/verify";
pub const HTTP_BUCKET_ROUTE: &str = "/buckets/{bucket_id}";
pub const HTTP_FILE_INFO_ROUTE: &str = "/buckets/{bucket_id}/info/{file_key}";
pub const HTTP_FILE_UPLOAD_ROUTE: &str = "/buckets/{bucket_id}/upload/{file_key}";
pub const HTTP_DOWNLOAD_ROUTE: &str = "/download/{file_key}";

/// Main storage provider backend.
///
/// Buckets are only ever created on chain; the backend learns about them by following the chain,
/// which is why callers poll [`MspApi::get_bucket`] after a creation transaction.
#[async_trait]
pub trait MspApi: Send + Sync {
    async fn health(&self) -> Result<HealthStatus, MspApiError>;

    async fn info(&self) -> Result<MspInfo, MspApiError>;

    async fn value_props(&self) -> Result<Vec<ValueProp>, MspApiError>;

    /// Requests the sign-in message for `request.address`.
    async fn nonce(&self, request: &NonceRequest) -> Result<NonceResponse, MspApiError>;

    /// Exchanges the signed sign-in message for a session.
    async fn verify(&self, request: &VerifyRequest) -> Result<Session, MspApiError>;

    async fn get_bucket(&self, bucket_id: &BucketId) -> Result<Bucket, MspApiError>;

    async fn get_file_info(
        &self,
        token: Option<&SessionToken>,
        bucket_id: &BucketId,
        file_key: &FileKey,
    ) -> Result<FileInfo, MspApiError>;

    async fn upload_file(
        &self,
        token: &SessionToken,
        upload: FileUpload,
    ) -> Result<UploadReceipt, MspApiError>;

    async fn download_file(
        &self,
        token: Option<&SessionToken>,
        file_key: &FileKey,
    ) -> Result<Download, MspApiError>;

    /// Whether `error` means "this record does not exist (yet)".
    ///
    /// Backends differ in how they report missing records, so implementations may override this.
    fn is_not_found(&self, error: &MspApiError) -> bool {
        error::is_not_found(error)
    }
}

pub fn bucket_route(bucket_id: &BucketId) -> String {
    HTTP_BUCKET_ROUTE.replace("{bucket_id}", &bucket_id.to_string())
}

pub fn file_info_route(bucket_id: &BucketId, file_key: &FileKey) -> String {
    HTTP_FILE_INFO_ROUTE
        .replace("{bucket_id}", &bucket_id.to_string())
        .replace("{file_key}", &file_key.to_string())
}

pub fn file_upload_route(bucket_id: &BucketId, file_key: &FileKey) -> String {
    HTTP_FILE_UPLOAD_ROUTE
        .replace("{bucket_id}", &bucket_id.to_string())
        .replace("{file_key}", &file_key.to_string())
}

pub fn download_route(file_key: &FileKey) -> String {
    HTTP_DOWNLOAD_ROUTE.replace("{file_key}", &file_key.to_string())
}
