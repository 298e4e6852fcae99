pub mod api;
pub mod client;
pub mod error;
pub mod status;

#[cfg(any(test, feature = "fake"))]
pub mod fake;
#[cfg(any(test, feature = "fake"))]
pub mod server;

pub use api::MspApi;
pub use client::MspApiClient;
pub use error::{MspApiError, is_not_found};
pub use status::{
    Bucket, Download, FileInfo, FileStatus, FileUpload, HealthStatus, MspInfo, NonceRequest,
    NonceResponse, ServiceStatus, Session, SessionToken, SessionUser, UploadReceipt, UploadStatus,
    ValueProp, VerifyRequest,
};
