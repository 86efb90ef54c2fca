//! Response sinks and the status-recording interceptor

use std::io;

use bytes::BytesMut;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::Full;
use tracing::debug;

use crate::HttpResponse;

/// Where a handler writes its response
///
/// Mirrors the usual server-side writer: headers are mutable until the status is written,
/// the status is written once, and body writes may fail once transmission has started.
pub trait ResponseSink: Send {
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Write the status line; only the first call has an effect
    fn write_status(&mut self, status: StatusCode);

    /// Append body bytes, implicitly writing 200 if no status was written yet
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;
}

/// In-memory sink that becomes an [`HttpResponse`] once the pipeline is done
#[derive(Debug, Default)]
pub struct BufferedResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_response(self) -> HttpResponse {
        let mut response = Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseSink for BufferedResponse {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        match self.status {
            None => self.status = Some(status),
            Some(existing) => debug!(
                "superfluous status write {} ignored, {} already written",
                status, existing
            ),
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(data);
        Ok(data.len())
    }
}

/// Records the status actually written through a sink
///
/// Bytes pass through untouched. If the handler never writes a status explicitly the
/// observed status is 200, matching what the underlying sink sends.
#[derive(Debug)]
pub struct StatusInterceptor<S> {
    inner: S,
    status: Option<StatusCode>,
}

impl<S: ResponseSink> StatusInterceptor<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            status: None,
        }
    }

    /// Status used for metrics and logging
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn has_written_status(&self) -> bool {
        self.status.is_some()
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ResponseSink> ResponseSink for StatusInterceptor<S> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
        self.inner.write_status(status);
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.inner.write(data)
    }
}
