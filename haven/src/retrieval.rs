use bytes::{Bytes, BytesMut};
use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use haven_core::FileKey;
use tracing::debug;

use crate::error::HavenError;
use crate::session::SessionManager;

pub type ByteStream = BoxStream<'static, Result<Bytes, HavenError>>;

/// Streams the content of `file_key` from the storage provider of the active session.
///
/// Sends the cached backend token when there is one, so private files of the signed-in owner
/// are readable without another wallet prompt.
pub async fn fetch(sessions: &SessionManager, file_key: &FileKey) -> Result<ByteStream, HavenError> {
    let session = sessions.active_session().await?;
    let token = session.token().await;
    debug!(%file_key, authenticated = token.is_some(), "downloading file");

    let download = session
        .handle()
        .msp
        .download_file(token.as_ref(), file_key)
        .await?;
    if !download.is_success() {
        return Err(HavenError::DownloadFailed(download.status));
    }
    Ok(download.stream.map_err(HavenError::from).boxed())
}

/// Collects a download into memory.
pub async fn collect(mut stream: ByteStream) -> Result<Bytes, HavenError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.try_next().await? {
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}
