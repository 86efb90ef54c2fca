use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::fmt;

/// Identifier echoed from a request envelope into its response
///
/// The protocol allows strings, numbers and null. Null (and a missing id) is modelled as
/// `Option::None` at the envelope level, so this type only carries real identifiers.
/// Numbers keep their JSON form, so ids beyond `i64` echo back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(Number),
}

impl RequestId {
    /// The empty string is the one id a server refuses outright.
    pub fn is_empty_string(&self) -> bool {
        matches!(self, RequestId::String(s) if s.is_empty())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{}", s),
            RequestId::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        RequestId::String(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        RequestId::String(value.to_string())
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        RequestId::Number(value.into())
    }
}

impl From<u64> for RequestId {
    fn from(value: u64) -> Self {
        RequestId::Number(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_ids() {
        let s: RequestId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(s, RequestId::String("abc".into()));

        let n: RequestId = serde_json::from_str("42").unwrap();
        assert_eq!(n, RequestId::from(42i64));
    }

    #[test]
    fn test_ids_above_i64_keep_their_value() {
        let n: RequestId = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(n, RequestId::from(u64::MAX));
        assert_eq!(n.to_string(), "18446744073709551615");
        assert_eq!(serde_json::to_string(&n).unwrap(), "18446744073709551615");
    }

    #[test]
    fn test_only_the_empty_string_is_refused() {
        assert!(RequestId::from("").is_empty_string());
        assert!(!RequestId::from("1").is_empty_string());
        assert!(!RequestId::from(0i64).is_empty_string());
    }
}
