use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::types::RequestId;

/// A JSON-RPC request envelope as received by the server
///
/// Every field is optional at the serde level so that a syntactically valid object with
/// missing members still decodes; the server decides whether it is a valid request.
/// `params` stays as raw JSON so handlers can decode it straight into their own types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub id: Option<RequestId>,
    #[serde(default)]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Box<RawValue>>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Box<RawValue>>) -> Self {
        Self {
            version: Some(crate::JSONRPC_VERSION.to_string()),
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    /// An explicit `""` id; a missing or null id is still a call, answered with a null id.
    pub fn has_empty_id(&self) -> bool {
        self.id.as_ref().is_some_and(RequestId::is_empty_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::from_str;

    #[test]
    fn test_request_decodes_raw_params() {
        let request: JsonRpcRequest =
            from_str(r#"{"id":"1","jsonrpc":"2.0","method":"foo","params":{"a":1}}"#).unwrap();

        assert_eq!(request.id, Some(RequestId::String("1".into())));
        assert_eq!(request.version.as_deref(), Some("2.0"));
        assert_eq!(request.method, "foo");
        assert_eq!(request.params.unwrap().get(), r#"{"a":1}"#);
    }

    #[test]
    fn test_missing_members_still_decode() {
        let request: JsonRpcRequest = from_str("{}").unwrap();
        assert!(request.id.is_none());
        assert!(!request.has_empty_id());
        assert!(request.version.is_none());
        assert!(request.method.is_empty());
        assert!(request.params.is_none());
    }

    #[test]
    fn test_empty_string_id_is_flagged() {
        let request: JsonRpcRequest =
            from_str(r#"{"id":"","jsonrpc":"2.0","method":"foo"}"#).unwrap();
        assert!(request.has_empty_id());

        let request: JsonRpcRequest = from_str(r#"{"id":null,"method":"foo"}"#).unwrap();
        assert!(!request.has_empty_id());
    }
}
