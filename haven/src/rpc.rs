use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::trace;
use url::Url;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("{method} request failed: {message}")]
    Transport { method: String, message: String },

    /// The endpoint answered with a JSON-RPC error object.
    #[error("{method} returned error {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("unexpected {method} response: {message}")]
    Decode { method: String, message: String },
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    #[serde(default)]
    code: i64,
    message: String,
}

/// Plain JSON-RPC 2.0 over HTTP, shared by the chain and wallet clients.
#[derive(Debug)]
pub struct JsonRpcClient {
    url: Url,
    http: Client,
    ids: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, RpcError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RpcError::Transport {
                method: "connect".to_string(),
                message: err.to_string(),
            })?;
        Ok(Self {
            url,
            http,
            ids: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sends `method` with `params`. A `null` result decodes into `T` as well, so use an `Option`
    /// for methods which may legitimately return nothing.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        let id = self.ids.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });
        trace!(method, id, "JSON-RPC request");

        let response: JsonRpcResponse = self
            .http
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|err| RpcError::Transport {
                method: method.to_string(),
                message: err.to_string(),
            })?
            .json()
            .await
            .map_err(|err| RpcError::Decode {
                method: method.to_string(),
                message: err.to_string(),
            })?;

        if let Some(error) = response.error {
            return Err(RpcError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }

        serde_json::from_value(response.result.unwrap_or(Value::Null)).map_err(|err| {
            RpcError::Decode {
                method: method.to_string(),
                message: err.to_string(),
            }
        })
    }
}

/// Parses a `0x`-prefixed hex quantity.
pub fn parse_quantity(value: &str) -> Option<u64> {
    u64::from_str_radix(value.trim().trim_start_matches("0x"), 16).ok()
}

pub fn to_quantity(value: u64) -> String {
    format!("{value:#x}")
}
