//! # JSON-RPC 2.0 Server Implementation
//!
//! A transport-agnostic JSON-RPC 2.0 method table. The crate knows nothing about HTTP:
//! callers hand it a raw request body plus an arbitrary per-request context value and get
//! back a reply that serializes to either a single response object or a batch array.
//!
//! ## Features
//! - Single-object and batch (array) bodies, batch output preserves input order
//! - Named method table or single-method mode (method resolved by the caller, e.g. from a path)
//! - Standard error codes for parse errors, invalid requests and unknown methods
//! - Optional HTTP clients (`client` feature): JSON-RPC calls and plain JSON requests/proxying

pub mod error;
pub mod request;
pub mod response;
pub mod server;
pub mod types;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "client")]
pub mod http_json;

pub use error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use request::JsonRpcRequest;
pub use response::{JsonRpcMessage, JsonRpcReply, JsonRpcResponse};
pub use server::{CallHandler, FunctionHandler, JsonRpcServer};
pub use types::RequestId;

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}
