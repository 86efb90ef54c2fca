//! Minimal JSON-RPC over HTTP client
//!
//! One call per HTTP POST. Transport problems and protocol violations are reported as
//! [`ClientError`]; a well-formed error response from the remote side is returned as the
//! inner `Err` so callers can tell "the call failed" apart from "the server said no".

use std::collections::HashMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::value::RawValue;
use thiserror::Error;
use tracing::debug;

use crate::{JSONRPC_VERSION, error::JsonRpcErrorObject};

/// Header carrying the correlation id alongside the envelope id
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid status code: {0}")]
    BadStatus(http::StatusCode),

    #[error("request/response mismatch: sent id '{sent}', received '{received}'")]
    IdMismatch { sent: String, received: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct ClientRequest<'a, P> {
    id: &'a str,
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a P>,
}

#[derive(Deserialize)]
struct ClientResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
    #[serde(default)]
    result: Option<Box<RawValue>>,
}

/// Perform one JSON-RPC call
///
/// A fresh UUID v4 is used as the request id when `request_id` is `None` or empty. The id
/// is sent both in the envelope and in the `X-Request-ID` header, and the response must
/// echo it back.
pub async fn call<P, R>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    request_id: Option<&str>,
    headers: &HashMap<String, String>,
    params: Option<&P>,
) -> Result<Result<R, JsonRpcErrorObject>, ClientError>
where
    P: Serialize,
    R: DeserializeOwned,
{
    let request_id = match request_id {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => uuid::Uuid::new_v4().to_string(),
    };

    let body = serde_json::to_vec(&ClientRequest {
        id: &request_id,
        jsonrpc: JSONRPC_VERSION,
        method,
        params,
    })?;

    let mut builder = client
        .post(url)
        .header(http::header::CONTENT_TYPE, "application/json")
        .header(REQUEST_ID_HEADER, request_id.as_str());
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    debug!(%method, request_id = %request_id, "sending JSON-RPC call");
    let response = builder.body(body).send().await?;

    let status = response.status();
    if status != http::StatusCode::OK {
        return Err(ClientError::BadStatus(status));
    }

    let bytes = response.bytes().await?;
    let reply: ClientResponse = serde_json::from_slice(&bytes)?;

    let received = reply.id.unwrap_or_default();
    if received != request_id {
        return Err(ClientError::IdMismatch {
            sent: request_id,
            received,
        });
    }

    if let Some(error) = reply.error {
        return Ok(Err(error));
    }

    let result = match reply.result {
        Some(raw) => serde_json::from_str(raw.get())?,
        None => serde_json::from_str("null")?,
    };
    Ok(Ok(result))
}
