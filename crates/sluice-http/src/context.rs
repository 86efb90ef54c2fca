//! Per-request facade shared by every pipeline step

use bytes::Bytes;
use http::{
    HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Uri,
    header::{CONTENT_TYPE, COOKIE},
    request::Parts,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Body, CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT, HttpResponse,
    cancel::{CancelContext, CancelError},
    error::RequestError,
    interceptor::{BufferedResponse, ResponseSink, StatusInterceptor},
    logger::RequestLogger,
    router::PathParam,
    values::Values,
};

/// Everything a step needs to process one request
///
/// Created by the pipeline once per request and owned exclusively by it. The send
/// operations never report failures: once a response is being written there is nothing
/// business code could do about a broken connection, so write errors are only logged.
pub struct RequestContext {
    parts: Parts,
    body: Option<Body>,
    values: Values,
    cancel: CancelContext,
    logger: RequestLogger,
    request_id: String,
    writer: StatusInterceptor<BufferedResponse>,
    max_body_bytes: Option<usize>,
}

impl RequestContext {
    pub fn new(request: Request<Body>, request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        let (parts, body) = request.into_parts();
        Self {
            parts,
            body: Some(body),
            values: Values::new(),
            cancel: CancelContext::default(),
            logger: RequestLogger::new(&request_id),
            request_id,
            writer: StatusInterceptor::new(BufferedResponse::new()),
            max_body_bytes: None,
        }
    }

    pub fn with_values(mut self, values: Values) -> Self {
        self.values = values;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelContext) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_logger(mut self, logger: RequestLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Fail body reads that go past `limit` bytes
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = Some(limit);
        self
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    /// First value of a request header, if it is valid visible ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Value of the trailing path parameter bound by the router
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.parts
            .extensions
            .get::<PathParam>()
            .filter(|param| param.name == name)
            .map(|param| param.value.as_str())
    }

    /// First value of a query parameter, percent-decoded
    pub fn query_param(&self, name: &str) -> Option<String> {
        query_param(&self.parts.uri, name)
    }

    /// Value of a request cookie
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|header| header.to_str().ok())
            .flat_map(|header| header.split(';'))
            .find_map(|pair| {
                let (key, value) = pair.trim().split_once('=')?;
                (key.trim() == name).then(|| {
                    let value = value.trim();
                    value
                        .strip_prefix('"')
                        .and_then(|v| v.strip_suffix('"'))
                        .unwrap_or(value)
                        .to_string()
                })
            })
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Values {
        &mut self.values
    }

    pub fn cancel_context(&self) -> &CancelContext {
        &self.cancel
    }

    pub fn logger(&self) -> &RequestLogger {
        &self.logger
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.writer.headers_mut().insert(name, value);
    }

    /// The intercepted response sink
    pub fn writer(&mut self) -> &mut StatusInterceptor<BufferedResponse> {
        &mut self.writer
    }

    /// Split borrow of the response sink and the request head, for panic recovery
    pub fn writer_and_parts(&mut self) -> (&mut StatusInterceptor<BufferedResponse>, &Parts) {
        (&mut self.writer, &self.parts)
    }

    /// Status written so far (200 when none was written)
    pub fn status(&self) -> StatusCode {
        self.writer.status()
    }

    /// Take the raw body stream, bypassing the size ceiling and deadline
    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    /// Read the whole body, honouring the size ceiling and the request deadline
    ///
    /// A body that was already consumed reads as empty.
    pub async fn read_body(&mut self) -> Result<Bytes, RequestError> {
        let Some(body) = self.body.take() else {
            return Ok(Bytes::new());
        };

        let limit = self.max_body_bytes;
        type CollectFuture = std::pin::Pin<
            Box<
                dyn Future<Output = Result<http_body_util::Collected<Bytes>, crate::BoxError>>
                    + Send,
            >,
        >;
        let collect: CollectFuture = match limit {
            Some(limit) => Box::pin(Limited::new(body, limit).collect()),
            None => Box::pin(body.collect()),
        };
        let collected = self.cancel.run(collect).await;

        match collected {
            Ok(Ok(collected)) => Ok(collected.to_bytes()),
            Ok(Err(err)) if err.is::<LengthLimitError>() => Err(RequestError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "request body too large",
            )
            .with_private(err.to_string())),
            Ok(Err(err)) => Err(RequestError::failure(err)),
            Err(CancelError::DeadlineExceeded) => Err(RequestError::new(
                StatusCode::REQUEST_TIMEOUT,
                "request timeout",
            )
            .with_private("deadline exceeded while reading body")),
            Err(err @ CancelError::Cancelled) => Err(RequestError::failure(err)),
        }
    }

    /// Decode a JSON body into `T`
    ///
    /// The Content-Type media type must be `application/json` (parameters such as charset are
    /// ignored), otherwise the request is rejected with 415 before the body is read.
    pub async fn decode_json<T>(&mut self) -> Result<T, RequestError>
    where
        T: DeserializeOwned,
    {
        self.decode_json_with(|body| serde_json::from_slice(body)).await
    }

    /// Like [`decode_json`](Self::decode_json) with a caller-supplied decoder
    pub async fn decode_json_with<T, F>(&mut self, decode: F) -> Result<T, RequestError>
    where
        F: FnOnce(&[u8]) -> serde_json::Result<T>,
    {
        if !is_json_content_type(&self.parts.headers) {
            return Err(RequestError::unsupported_media_type());
        }

        let body = self.read_body().await?;
        decode(&body).map_err(|err| {
            RequestError::bad_request("invalid JSON body")
                .with_private(err.to_string())
                .with_source(err)
        })
    }

    /// Send a response; `data` may be empty
    pub fn send(&mut self, status: StatusCode, content_type: Option<&str>, data: &[u8]) {
        if let Some(content_type) = content_type {
            match HeaderValue::from_str(content_type) {
                Ok(value) => self.set_header(CONTENT_TYPE, value),
                Err(err) => self.logger.warn(format_args!(
                    "invalid content type {:?}: {}",
                    content_type, err
                )),
            }
        }
        self.writer.write_status(status);
        if !data.is_empty()
            && let Err(err) = self.writer.write(data)
        {
            self.logger.warn(format_args!("Error writing: {}", err));
        }
    }

    pub fn send_text(&mut self, status: StatusCode, text: &str) {
        self.send(status, Some(CONTENT_TYPE_TEXT), text.as_bytes());
    }

    /// Serialize `value` as JSON and send it; serialization failure becomes a 500 text reply
    pub fn send_json<T>(&mut self, status: StatusCode, value: &T)
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_vec(value) {
            Ok(data) => self.send(status, Some(CONTENT_TYPE_JSON), &data),
            Err(err) => {
                self.logger.warn(format_args!(
                    "{} {}: error marshalling response: {}",
                    self.parts.method, self.parts.uri, err
                ));
                self.send_text(StatusCode::INTERNAL_SERVER_ERROR, "Marshalling error");
            }
        }
    }

    /// Hand the buffered response over to the transport
    pub fn into_response(self) -> HttpResponse {
        self.writer.into_inner().into_response()
    }
}

/// Whether the Content-Type media type is `application/json`, ignoring parameters and case
pub fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|media| media.trim().eq_ignore_ascii_case(CONTENT_TYPE_JSON))
}

/// First value of the named query parameter in `uri`, percent-decoded
pub fn query_param(uri: &Uri, name: &str) -> Option<String> {
    uri.query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (decode_query_component(key)? == name)
            .then(|| decode_query_component(value))
            .flatten()
    })
}

fn decode_query_component(raw: &str) -> Option<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).ok().map(|s| s.into_owned())
}
