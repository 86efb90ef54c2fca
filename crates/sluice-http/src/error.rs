//! Error types for routing, request processing and serving

use http::{Method, StatusCode};
use thiserror::Error;

use crate::BoxError;

/// Registration-time router failures
///
/// These indicate a programming mistake in the route table and are expected to abort startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("path is empty")]
    EmptyPath,

    #[error("method {0} not supported by router")]
    UnsupportedMethod(Method),

    #[error("{0}: parameter route needs a non-empty base path")]
    EmptyBasePath(String),

    #[error("{0}: parameter name must be a single non-empty segment")]
    InvalidParamName(String),

    #[error("{method} {pattern} parameter {requested} differs from {existing} declared earlier")]
    ParamConflict {
        method: Method,
        pattern: String,
        requested: String,
        existing: String,
    },
}

/// A failure that halts the pipeline for one request
///
/// Carries an optional HTTP status (500 when unset), a public message that is safe to send
/// to the client, and private details that only ever reach the logs.
#[derive(Debug, Error)]
#[error("{}", describe(.public.as_deref(), .private.as_deref()))]
pub struct RequestError {
    status: Option<StatusCode>,
    public: Option<String>,
    private: Option<String>,
    #[source]
    source: Option<BoxError>,
}

fn describe(public: Option<&str>, private: Option<&str>) -> String {
    match (public, private) {
        (Some(public), Some(private)) => format!("{public} -- {private}"),
        (Some(message), None) | (None, Some(message)) => message.to_string(),
        (None, None) => "request failed".to_string(),
    }
}

impl RequestError {
    pub fn new(status: StatusCode, public: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            public: Some(public.into()),
            private: None,
            source: None,
        }
    }

    /// An error with a status and nothing else; rendered with an empty body
    pub fn status_only(status: StatusCode) -> Self {
        Self {
            status: Some(status),
            public: None,
            private: None,
            source: None,
        }
    }

    pub fn bad_request(public: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, public)
    }

    pub fn bad_request_detailed(public: impl Into<String>, private: impl Into<String>) -> Self {
        Self::bad_request(public).with_private(private)
    }

    pub fn unsupported_media_type() -> Self {
        Self::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Invalid Content-Type. Expected 'application/json'",
        )
    }

    /// A 500 whose cause is kept out of the response body
    pub fn failure<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        let err = err.into();
        Self {
            status: Some(StatusCode::INTERNAL_SERVER_ERROR),
            public: None,
            private: Some(err.to_string()),
            source: Some(err),
        }
    }

    /// An error that only carries log-side details; status defaults to 500 when rendered
    pub fn private(details: impl Into<String>) -> Self {
        Self {
            status: None,
            public: None,
            private: Some(details.into()),
            source: None,
        }
    }

    pub fn with_private(mut self, details: impl Into<String>) -> Self {
        self.private = Some(details.into());
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        self.source = Some(source.into());
        self
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn public_message(&self) -> Option<&str> {
        self.public.as_deref().filter(|m| !m.is_empty())
    }

    pub fn private_details(&self) -> Option<&str> {
        self.private.as_deref().filter(|m| !m.is_empty())
    }
}

/// Errors from the TCP accept loop
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_composes_public_and_private() {
        let err = RequestError::bad_request_detailed("bad input", "field x missing");
        assert_eq!(err.to_string(), "bad input -- field x missing");
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_failure_hides_cause_from_public_message() {
        let io = std::io::Error::other("disk on fire");
        let err = RequestError::failure(io);
        assert!(err.public_message().is_none());
        assert_eq!(err.private_details(), Some("disk on fire"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_empty_messages_are_treated_as_absent() {
        let err = RequestError::new(StatusCode::CONFLICT, "");
        assert!(err.public_message().is_none());
        assert!(err.private_details().is_none());
    }
}
