//! Request-scoped logger

use std::fmt;

use tracing::Span;

/// Logger bound to one request
///
/// A thin handle over a `tracing` span that carries the request id. Child loggers created
/// with [`RequestLogger::with`] nest a span holding one extra key/value, so every event
/// emitted through them is reported with the full chain of bound fields.
#[derive(Debug, Clone)]
pub struct RequestLogger {
    span: Span,
}

impl RequestLogger {
    pub fn new(request_id: &str) -> Self {
        Self {
            span: tracing::info_span!("request", request_id = %request_id),
        }
    }

    /// Wrap an existing span, e.g. one created by the host application
    pub fn from_span(span: Span) -> Self {
        Self { span }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Derive a child logger bound with one extra key/value
    pub fn with(&self, key: &str, value: impl fmt::Display) -> Self {
        Self {
            span: tracing::info_span!(parent: &self.span, "scope", key = %key, value = %value),
        }
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(parent: &self.span, "{}", args);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(parent: &self.span, "{}", args);
    }
}
