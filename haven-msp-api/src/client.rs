use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt, stream};
use haven_core::{BucketId, FileKey};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::api::{
    HTTP_AUTH_NONCE_ROUTE, HTTP_AUTH_VERIFY_ROUTE, HTTP_HEALTH_ROUTE, HTTP_INFO_ROUTE,
    HTTP_VALUE_PROPS_ROUTE, MspApi, bucket_route, download_route, file_info_route,
    file_upload_route,
};
use crate::error::{ErrorBody, MspApiError};
use crate::status::{
    Bucket, Download, FileInfo, FileUpload, HealthStatus, MspInfo, NonceRequest, NonceResponse,
    Session, SessionToken, UploadReceipt, ValueProp, VerifyRequest,
};

/// reqwest based [`MspApi`] implementation.
#[derive(Clone, Debug)]
pub struct MspApiClient {
    endpoint: Url,
    http: Client,
}

impl MspApiClient {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<MspApiClient, MspApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| MspApiError::Transport {
                route: endpoint.to_string(),
                message: err.to_string(),
            })?;
        Ok(MspApiClient { endpoint, http })
    }

    /// Builds a client and checks the backend answers its health route.
    pub async fn connect(endpoint: Url, timeout: Duration) -> Result<MspApiClient, MspApiError> {
        let client = MspApiClient::new(endpoint, timeout)?;
        let health = client.health().await?;
        debug!(endpoint = %client.endpoint, status = ?health.status, "connected to MSP backend");
        Ok(client)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.endpoint.as_str().trim_end_matches('/'), route)
    }

    async fn send(&self, route: &str, request: RequestBuilder) -> Result<Response, MspApiError> {
        trace!(route, "MSP request");
        let response = request.send().await.map_err(|err| MspApiError::Transport {
            route: route.to_string(),
            message: err.to_string(),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: ErrorBody = response.json().await.unwrap_or_default();
        Err(MspApiError::Status {
            route: route.to_string(),
            status: status.as_u16(),
            error: body.error,
        })
    }

    async fn json<T: DeserializeOwned>(
        &self,
        route: &str,
        request: RequestBuilder,
    ) -> Result<T, MspApiError> {
        self.send(route, request)
            .await?
            .json::<T>()
            .await
            .map_err(|err| MspApiError::Decode {
                route: route.to_string(),
                message: err.to_string(),
            })
    }
}

fn with_token(request: RequestBuilder, token: Option<&SessionToken>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token.as_str()),
        None => request,
    }
}

#[async_trait]
impl MspApi for MspApiClient {
    async fn health(&self) -> Result<HealthStatus, MspApiError> {
        let route = HTTP_HEALTH_ROUTE;
        self.json(route, self.http.get(self.url(route))).await
    }

    async fn info(&self) -> Result<MspInfo, MspApiError> {
        let route = HTTP_INFO_ROUTE;
        self.json(route, self.http.get(self.url(route))).await
    }

    async fn value_props(&self) -> Result<Vec<ValueProp>, MspApiError> {
        let route = HTTP_VALUE_PROPS_ROUTE;
        self.json(route, self.http.get(self.url(route))).await
    }

    async fn nonce(&self, request: &NonceRequest) -> Result<NonceResponse, MspApiError> {
        let route = HTTP_AUTH_NONCE_ROUTE;
        self.json(route, self.http.post(self.url(route)).json(request))
            .await
    }

    async fn verify(&self, request: &VerifyRequest) -> Result<Session, MspApiError> {
        let route = HTTP_AUTH_VERIFY_ROUTE;
        self.json(route, self.http.post(self.url(route)).json(request))
            .await
    }

    async fn get_bucket(&self, bucket_id: &BucketId) -> Result<Bucket, MspApiError> {
        let route = bucket_route(bucket_id);
        self.json(&route, self.http.get(self.url(&route))).await
    }

    async fn get_file_info(
        &self,
        token: Option<&SessionToken>,
        bucket_id: &BucketId,
        file_key: &FileKey,
    ) -> Result<FileInfo, MspApiError> {
        let route = file_info_route(bucket_id, file_key);
        let request = with_token(self.http.get(self.url(&route)), token);
        self.json(&route, request).await
    }

    async fn upload_file(
        &self,
        token: &SessionToken,
        upload: FileUpload,
    ) -> Result<UploadReceipt, MspApiError> {
        let route = file_upload_route(&upload.bucket_id, &upload.file_key);
        let size = upload.data.len();
        let form = Form::new()
            .text("owner", upload.owner.to_string())
            .text("location", upload.location.clone())
            .part(
                "file",
                Part::stream_with_length(upload.data, size as u64).file_name(upload.location),
            );
        let request = self
            .http
            .put(self.url(&route))
            .bearer_auth(token.as_str())
            .multipart(form);
        self.json(&route, request).await
    }

    async fn download_file(
        &self,
        token: Option<&SessionToken>,
        file_key: &FileKey,
    ) -> Result<Download, MspApiError> {
        let route = download_route(file_key);
        let request = with_token(self.http.get(self.url(&route)), token);
        let response = request.send().await.map_err(|err| MspApiError::Transport {
            route: route.clone(),
            message: err.to_string(),
        })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Ok(Download {
                status,
                stream: stream::empty().boxed(),
            });
        }

        let stream = response
            .bytes_stream()
            .map_err(move |err| MspApiError::Transport {
                route: route.clone(),
                message: err.to_string(),
            })
            .boxed();
        Ok(Download { status, stream })
    }
}
