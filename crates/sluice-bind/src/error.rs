//! Binding errors
//!
//! [`ConfigError`] is a programming mistake found while building a binding and should abort
//! startup. [`EnrichError`] is bad input found while populating one request.

use std::num::ParseIntError;

use serde_json::Value;
use thiserror::Error;

use crate::binding::Source;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid tag syntax, expected 'key', 'key,required' or 'key,notEmpty': {0:?}")]
    InvalidTag(String),

    #[error("{type_name}: {kind} binding is not available over JSON-RPC")]
    UnsupportedSource {
        type_name: &'static str,
        kind: Source,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichError {
    #[error("required value '{0}' missing")]
    Missing(String),

    #[error("empty value for tag '{0}'")]
    Empty(String),

    #[error("empty value (zero) for tag '{0}'")]
    Zero(String),

    #[error("value {0} is not a string")]
    NotAString(Value),

    #[error("value {0} cannot be converted to int")]
    NotAnInteger(Value),

    #[error("invalid integer {value:?} for '{key}': {source}")]
    Parse {
        key: String,
        value: String,
        source: ParseIntError,
    },
}
