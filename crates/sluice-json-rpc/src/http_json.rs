//! Plain JSON over HTTP client
//!
//! The non-RPC sibling of [`client::call`](crate::client::call): one request, a JSON body
//! in, a JSON body out. Every request carries `Content-Type: application/json` and the
//! `X-Request-ID` correlation header. [`HttpJsonClient::proxy`] forwards an inbound request
//! to an upstream service and never fails; upstream problems become 502/500 responses.

use std::collections::HashMap;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};

use crate::client::REQUEST_ID_HEADER;

const CONTENT_TYPE_JSON: &str = "application/json";

/// How much of a rejected response body is kept in [`HttpJsonError::Status`]
pub const STATUS_BODY_LIMIT: usize = 100;

/// How much of an unread body is consumed before a response is dropped
const DRAIN_LIMIT: usize = 64 * 1024;

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// End-to-end headers [`HttpJsonClient::proxy`] copies upstream and back
const PROXY_REQUEST_HEADERS: [HeaderName; 1] = [CONTENT_TYPE];
const PROXY_RESPONSE_HEADERS: [HeaderName; 2] = [CONTENT_TYPE, X_REQUEST_ID];

#[derive(Debug, Error)]
pub enum HttpJsonError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Any status other than 200, with the start of the response body
    #[error("invalid status code {}{}", .status.as_u16(), body_suffix(.body))]
    Status { status: StatusCode, body: String },

    #[error("invalid header {0:?}")]
    InvalidHeader(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

/// JSON client over a shared `reqwest::Client`
///
/// An empty reply body decodes as JSON `null`, so `()` or `Option<T>` can be used as the
/// response type for endpoints that answer with nothing.
#[derive(Debug, Clone, Default)]
pub struct HttpJsonClient {
    client: reqwest::Client,
}

impl HttpJsonClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub async fn get_json<R>(
        &self,
        url: &str,
        request_id: &str,
        headers: &HashMap<String, String>,
    ) -> Result<R, HttpJsonError>
    where
        R: DeserializeOwned,
    {
        self.json::<(), R>(Method::GET, url, None, request_id, headers)
            .await
    }

    pub async fn post_json<Q, R>(
        &self,
        url: &str,
        request: &Q,
        request_id: &str,
        headers: &HashMap<String, String>,
    ) -> Result<R, HttpJsonError>
    where
        Q: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.json(Method::POST, url, Some(request), request_id, headers)
            .await
    }

    /// Send `request` (if any) as JSON and decode a 200 reply
    ///
    /// Any other status is an [`HttpJsonError::Status`] carrying at most
    /// [`STATUS_BODY_LIMIT`] bytes of the reply body.
    pub async fn json<Q, R>(
        &self,
        method: Method,
        url: &str,
        request: Option<&Q>,
        request_id: &str,
        headers: &HashMap<String, String>,
    ) -> Result<R, HttpJsonError>
    where
        Q: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .send(method, url, request, request_id, headers)
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(status_error(status, response).await);
        }

        let body = response.bytes().await?;
        Ok(decode(&body)?)
    }

    /// Like [`json`](Self::json), but a non-200 status is returned instead of failing
    ///
    /// The reply is decoded only for 200; for any other status the body is discarded and
    /// `None` is returned next to the status.
    pub async fn json_x<Q, R>(
        &self,
        method: Method,
        url: &str,
        request: Option<&Q>,
        request_id: &str,
        headers: &HashMap<String, String>,
    ) -> Result<(StatusCode, Option<R>), HttpJsonError>
    where
        Q: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .send(method, url, request, request_id, headers)
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            safe_close(response).await;
            return Ok((status, None));
        }

        let body = response.bytes().await?;
        Ok((status, Some(decode(&body)?)))
    }

    /// Forward a request to `target_url` and build the response to send back
    ///
    /// Only end-to-end headers cross in either direction: Content-Type on the way up,
    /// Content-Type and X-Request-ID on the way down. `headers` are set on the upstream
    /// request last. The body of a GET is never forwarded. An upstream timeout gives 502,
    /// any other failure 500 with an empty body; failures are logged at WARN.
    pub async fn proxy(
        &self,
        target_url: &str,
        method: &Method,
        inbound: &HeaderMap,
        body: Bytes,
        headers: &HashMap<String, String>,
    ) -> http::Response<Bytes> {
        let mut upstream = HeaderMap::new();
        for name in PROXY_REQUEST_HEADERS {
            if let Some(value) = inbound.get(&name)
                && !value.is_empty()
            {
                upstream.insert(name, value.clone());
            }
        }
        if let Err(err) = extend_headers(&mut upstream, headers) {
            warn!(target_url, "error building upstream request: {}", err);
            return empty_response(StatusCode::INTERNAL_SERVER_ERROR);
        }

        let mut builder = self
            .client
            .request(method.clone(), target_url)
            .headers(upstream);
        if *method != Method::GET {
            builder = builder.body(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(target_url, "error calling upstream: {}", err);
                let status = if err.is_timeout() {
                    StatusCode::BAD_GATEWAY
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                return empty_response(status);
            }
        };

        let status = response.status();
        let mut forwarded = HeaderMap::new();
        for name in PROXY_RESPONSE_HEADERS {
            if let Some(value) = response.headers().get(&name) {
                forwarded.insert(name, value.clone());
            }
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => {
                warn!(target_url, "error reading body from upstream: {}", err);
                return empty_response(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        let mut reply = http::Response::new(body);
        *reply.status_mut() = status;
        *reply.headers_mut() = forwarded;
        reply
    }

    async fn send<Q>(
        &self,
        method: Method,
        url: &str,
        request: Option<&Q>,
        request_id: &str,
        headers: &HashMap<String, String>,
    ) -> Result<reqwest::Response, HttpJsonError>
    where
        Q: Serialize + ?Sized,
    {
        let mut request_headers = HeaderMap::new();
        request_headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
        if !request_id.is_empty() {
            let value = HeaderValue::from_str(request_id)
                .map_err(|_| HttpJsonError::InvalidHeader(REQUEST_ID_HEADER.to_string()))?;
            request_headers.insert(X_REQUEST_ID, value);
        }
        extend_headers(&mut request_headers, headers)?;

        let mut builder = self
            .client
            .request(method.clone(), url)
            .headers(request_headers);
        if let Some(request) = request {
            builder = builder.body(serde_json::to_vec(request)?);
        }

        debug!(%method, url, request_id, "sending JSON request");
        Ok(builder.send().await?)
    }
}

/// Set each extra header, replacing any value already present under the same name
fn extend_headers(
    target: &mut HeaderMap,
    headers: &HashMap<String, String>,
) -> Result<(), HttpJsonError> {
    for (name, value) in headers {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| HttpJsonError::InvalidHeader(name.clone()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| HttpJsonError::InvalidHeader(name.clone()))?;
        target.insert(header, value);
    }
    Ok(())
}

fn decode<R: DeserializeOwned>(body: &[u8]) -> serde_json::Result<R> {
    if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_slice(b"null")
    } else {
        serde_json::from_slice(body)
    }
}

fn empty_response(status: StatusCode) -> http::Response<Bytes> {
    let mut response = http::Response::new(Bytes::new());
    *response.status_mut() = status;
    response
}

async fn status_error(status: StatusCode, mut response: reqwest::Response) -> HttpJsonError {
    let mut head = Vec::with_capacity(STATUS_BODY_LIMIT);
    while head.len() < STATUS_BODY_LIMIT {
        match response.chunk().await {
            Ok(Some(chunk)) => head.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(err) => {
                debug!("error reading rejected response body: {}", err);
                break;
            }
        }
    }
    head.truncate(STATUS_BODY_LIMIT);
    safe_close(response).await;

    HttpJsonError::Status {
        status,
        body: String::from_utf8_lossy(&head).into_owned(),
    }
}

/// Consume what is left of a response body, up to a limit, so the connection can be reused
///
/// Read errors are logged and otherwise ignored.
pub async fn safe_close(mut response: reqwest::Response) {
    let mut drained = 0;
    while drained < DRAIN_LIMIT {
        match response.chunk().await {
            Ok(Some(chunk)) => drained += chunk.len(),
            Ok(None) => return,
            Err(err) => {
                debug!("error closing HTTP response: {}", err);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_status_error_message_includes_body_when_present() {
        let error = HttpJsonError::Status {
            status: StatusCode::NOT_FOUND,
            body: "no such order".to_string(),
        };
        assert_eq!(error.to_string(), "invalid status code 404: no such order");

        let error = HttpJsonError::Status {
            status: StatusCode::IM_A_TEAPOT,
            body: String::new(),
        };
        assert_eq!(error.to_string(), "invalid status code 418");
    }

    #[test]
    fn test_empty_body_decodes_as_null() {
        decode::<()>(b"").unwrap();
        let missing: Option<Value> = decode(b"  \n").unwrap();
        assert!(missing.is_none());
        let value: Value = decode(br#"{"a":1}"#).unwrap();
        assert_eq!(value, json!({"a": 1}));
        assert!(decode::<Value>(b"{").is_err());
    }

    #[test]
    fn test_extra_headers_replace_defaults() {
        let mut target = HeaderMap::new();
        target.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
        let extra = HashMap::from([(
            "Content-Type".to_string(),
            "application/json; charset=utf-8".to_string(),
        )]);

        extend_headers(&mut target, &extra).unwrap();
        assert_eq!(target.get_all(CONTENT_TYPE).iter().count(), 1);
        assert_eq!(target[CONTENT_TYPE], "application/json; charset=utf-8");

        let bad = HashMap::from([("bad header".to_string(), "x".to_string())]);
        assert!(matches!(
            extend_headers(&mut target, &bad),
            Err(HttpJsonError::InvalidHeader(name)) if name == "bad header"
        ));
    }
}
