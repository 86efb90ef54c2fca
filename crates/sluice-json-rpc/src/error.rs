use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{error_codes, types::RequestId};

/// The reserved protocol error codes this crate emits on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
}

impl JsonRpcErrorCode {
    pub fn code(self) -> i64 {
        match self {
            Self::ParseError => error_codes::PARSE_ERROR,
            Self::InvalidRequest => error_codes::INVALID_REQUEST,
            Self::MethodNotFound => error_codes::METHOD_NOT_FOUND,
            Self::InvalidParams => error_codes::INVALID_PARAMS,
            Self::InternalError => error_codes::INTERNAL_ERROR,
        }
    }

    /// Message used when the caller supplies none
    pub fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
        }
    }
}

/// The `error` member of a response envelope
///
/// Also what call handlers return on failure; the server wraps it with the request id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("JSON-RPC error {code}: {message}")]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    pub fn new(code: JsonRpcErrorCode, message: Option<String>) -> Self {
        Self {
            code: code.code(),
            message: message.unwrap_or_else(|| code.default_message().to_string()),
            data: None,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(JsonRpcErrorCode::ParseError, None)
    }

    pub fn invalid_request() -> Self {
        Self::new(JsonRpcErrorCode::InvalidRequest, None)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::MethodNotFound,
            Some(format!("method not found: '{method}'")),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(JsonRpcErrorCode::InvalidParams, Some(message.into()))
    }

    pub fn internal_error(message: Option<String>) -> Self {
        Self::new(JsonRpcErrorCode::InternalError, message)
    }
}

/// An error response envelope
///
/// `id` is null whenever the request id could not be determined (parse error, invalid request).
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("{error}")]
pub struct JsonRpcError {
    #[serde(rename = "jsonrpc")]
    pub version: String,
    pub id: Option<RequestId>,
    pub error: JsonRpcErrorObject,
}

impl JsonRpcError {
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorObject) -> Self {
        Self {
            version: crate::JSONRPC_VERSION.to_string(),
            id,
            error,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(None, JsonRpcErrorObject::parse_error())
    }

    pub fn invalid_request(id: Option<RequestId>) -> Self {
        Self::new(id, JsonRpcErrorObject::invalid_request())
    }

    pub fn method_not_found(id: Option<RequestId>, method: &str) -> Self {
        Self::new(id, JsonRpcErrorObject::method_not_found(method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_messages_follow_the_code() {
        let error = JsonRpcErrorObject::internal_error(None);
        assert_eq!(error.code, -32603);
        assert_eq!(error.message, "Internal error");

        let error = JsonRpcErrorObject::invalid_params("amount: expected i64");
        assert_eq!(error.code, -32602);
        assert_eq!(error.to_string(), "JSON-RPC error -32602: amount: expected i64");
    }

    #[test]
    fn test_parse_error_has_null_id() {
        let json = serde_json::to_value(JsonRpcError::parse_error()).unwrap();
        assert_eq!(
            json,
            json!({"jsonrpc": "2.0", "id": null, "error": {"code": -32700, "message": "Parse error"}})
        );
    }

    #[test]
    fn test_method_not_found_names_the_method() {
        let error = JsonRpcError::method_not_found(Some(RequestId::from(1i64)), "getPrice");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("method not found: 'getPrice'"));
        assert!(!json.contains("\"data\""));
    }
}
