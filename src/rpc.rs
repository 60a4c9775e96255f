use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    num::NonZeroUsize,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("json-rpc transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("json-rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("cannot decode `{method}` result: {source}")]
    Decode {
        method: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize)]
struct Request<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<ErrorObject>,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC 2.0 over http.
#[derive(Debug)]
pub struct JsonRpcTransport {
    http: reqwest::Client,
    url: Url,
    attempts: NonZeroUsize,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    pub fn new(url: Url, timeout: Duration, attempts: NonZeroUsize) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url,
            attempts,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sends a request, retrying on transport failures only.
    /// A `null` result is passed to `R` as is, so `Option<_>` results decode to `None`.
    pub async fn request<P, R>(&self, method: &str, params: P) -> Result<R, RpcError>
    where
        P: Serialize + Send + Sync,
        R: DeserializeOwned,
    {
        let request = Request {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let mut response = self.send(&request).await;
        for _ in 1..self.attempts.get() {
            match &response {
                Err(RpcError::Transport(err)) => {
                    log::debug!(target: "json_rpc", "retrying `{}` after transport error: {}", method, err);
                    response = self.send(&request).await;
                }
                _ => break,
            }
        }
        let response = response?;

        if let Some(error) = response.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        let result = response.result.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(result).map_err(|source| RpcError::Decode {
            method: method.to_string(),
            source,
        })
    }

    async fn send<P: Serialize>(&self, request: &Request<'_, P>) -> Result<Response, RpcError> {
        let response = self
            .http
            .post(self.url.clone())
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response)
    }
}
