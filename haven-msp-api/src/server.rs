use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use haven_core::{Address, BucketId, FileKey};
use tokio::net::TcpListener;
use tracing::debug;

use crate::api::{
    HTTP_AUTH_NONCE_ROUTE, HTTP_AUTH_VERIFY_ROUTE, HTTP_BUCKET_ROUTE, HTTP_DOWNLOAD_ROUTE,
    HTTP_FILE_INFO_ROUTE, HTTP_FILE_UPLOAD_ROUTE, HTTP_HEALTH_ROUTE, HTTP_INFO_ROUTE,
    HTTP_VALUE_PROPS_ROUTE, MspApi,
};
use crate::error::{ErrorBody, MspApiError};
use crate::status::{FileUpload, NonceRequest, SessionToken, VerifyRequest};

/// Serves any [`MspApi`] implementation over HTTP, using the same routes and error bodies the
/// real backend uses.
pub struct MspHttpServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    api: Arc<dyn MspApi>,
}

impl MspHttpServer {
    /// Binds the listener. Pass port 0 to let the OS pick a free port.
    pub async fn bind(addr: SocketAddr, api: Arc<dyn MspApi>) -> Result<MspHttpServer> {
        let listener = TcpListener::bind(addr)
            .await
            .context("TCP Listener binding")?;
        let local_addr = listener.local_addr()?;
        debug!("MSP HTTP endpoint listening on {}", local_addr);
        Ok(MspHttpServer {
            listener,
            local_addr,
            api,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn run(self) -> Result<()> {
        let state = ServerState { api: self.api };
        let app = Router::new()
            .route(HTTP_HEALTH_ROUTE, get(health))
            .route(HTTP_INFO_ROUTE, get(info))
            .route(HTTP_VALUE_PROPS_ROUTE, get(value_props))
            .route(HTTP_AUTH_NONCE_ROUTE, post(nonce))
            .route(HTTP_AUTH_VERIFY_ROUTE, post(verify))
            .route(HTTP_BUCKET_ROUTE, get(bucket))
            .route(HTTP_FILE_INFO_ROUTE, get(file_info))
            .route(HTTP_FILE_UPLOAD_ROUTE, put(upload))
            .route(HTTP_DOWNLOAD_ROUTE, get(download))
            .with_state(state);
        axum::serve(self.listener, app)
            .await
            .context("MSP HTTP serving")?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct ServerState {
    pub api: Arc<dyn MspApi>,
}

/// Turns a backend error into the status and `{"error": ..}` body the client decodes.
struct Failure(StatusCode, Option<String>);

impl From<MspApiError> for Failure {
    fn from(error: MspApiError) -> Self {
        match error {
            MspApiError::Status { status, error, .. } => Failure(
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                error,
            ),
            other => Failure(StatusCode::BAD_GATEWAY, Some(other.to_string())),
        }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorBody { error: self.1 })).into_response()
    }
}

fn bad_request(message: impl ToString) -> Failure {
    Failure(StatusCode::BAD_REQUEST, Some(message.to_string()))
}

fn parse<T: FromStr>(value: &str) -> Result<T, Failure>
where
    T::Err: ToString,
{
    value.parse::<T>().map_err(bad_request)
}

fn bearer(headers: &HeaderMap) -> Option<SessionToken> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(SessionToken::new)
}

async fn health(State(state): State<ServerState>) -> Result<impl IntoResponse, Failure> {
    Ok(Json(state.api.health().await?))
}

async fn info(State(state): State<ServerState>) -> Result<impl IntoResponse, Failure> {
    Ok(Json(state.api.info().await?))
}

async fn value_props(State(state): State<ServerState>) -> Result<impl IntoResponse, Failure> {
    Ok(Json(state.api.value_props().await?))
}

async fn nonce(
    State(state): State<ServerState>,
    Json(request): Json<NonceRequest>,
) -> Result<impl IntoResponse, Failure> {
    Ok(Json(state.api.nonce(&request).await?))
}

async fn verify(
    State(state): State<ServerState>,
    Json(request): Json<VerifyRequest>,
) -> Result<impl IntoResponse, Failure> {
    Ok(Json(state.api.verify(&request).await?))
}

async fn bucket(
    State(state): State<ServerState>,
    Path(bucket_id): Path<String>,
) -> Result<impl IntoResponse, Failure> {
    let bucket_id: BucketId = parse(&bucket_id)?;
    Ok(Json(state.api.get_bucket(&bucket_id).await?))
}

async fn file_info(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path((bucket_id, file_key)): Path<(String, String)>,
) -> Result<impl IntoResponse, Failure> {
    let bucket_id: BucketId = parse(&bucket_id)?;
    let file_key: FileKey = parse(&file_key)?;
    let token = bearer(&headers);
    Ok(Json(
        state
            .api
            .get_file_info(token.as_ref(), &bucket_id, &file_key)
            .await?,
    ))
}

async fn upload(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path((bucket_id, file_key)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, Failure> {
    let bucket_id: BucketId = parse(&bucket_id)?;
    let file_key: FileKey = parse(&file_key)?;
    let token = bearer(&headers).ok_or(Failure(
        StatusCode::UNAUTHORIZED,
        Some("Unauthorized: missing bearer token".to_string()),
    ))?;

    let mut owner: Option<Address> = None;
    let mut location = None;
    let mut data = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("owner") => owner = Some(parse(&field.text().await.map_err(bad_request)?)?),
            Some("location") => location = Some(field.text().await.map_err(bad_request)?),
            Some("file") => data = Some(field.bytes().await.map_err(bad_request)?),
            _ => {}
        }
    }

    let upload = FileUpload {
        bucket_id,
        file_key,
        owner: owner.ok_or_else(|| bad_request("missing owner field"))?,
        location: location.ok_or_else(|| bad_request("missing location field"))?,
        data: data.ok_or_else(|| bad_request("missing file field"))?,
    };
    Ok(Json(state.api.upload_file(&token, upload).await?))
}

async fn download(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(file_key): Path<String>,
) -> Result<Response, Failure> {
    let file_key: FileKey = parse(&file_key)?;
    let token = bearer(&headers);
    let download = state.api.download_file(token.as_ref(), &file_key).await?;
    let status = StatusCode::from_u16(download.status).unwrap_or(StatusCode::BAD_GATEWAY);
    if !download.is_success() {
        return Ok(status.into_response());
    }
    Ok((status, Body::from_stream(download.stream)).into_response())
}
