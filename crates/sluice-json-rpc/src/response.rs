use serde::Serialize;
use serde_json::value::RawValue;

use crate::error::JsonRpcError;
use crate::types::RequestId;

/// A successful JSON-RPC response
///
/// The result is kept as raw JSON so that pre-serialized payloads are embedded as-is.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub version: &'static str,
    pub id: Option<RequestId>,
    pub result: Box<RawValue>,
}

impl JsonRpcResponse {
    pub fn new(id: Option<RequestId>, result: Box<RawValue>) -> Self {
        Self {
            version: crate::JSONRPC_VERSION,
            id,
            result,
        }
    }
}

/// One reply envelope: `result` or `error`, never both
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Response(JsonRpcResponse),
    Error(JsonRpcError),
}

impl JsonRpcMessage {
    pub fn success(id: Option<RequestId>, result: Box<RawValue>) -> Self {
        Self::Response(JsonRpcResponse::new(id, result))
    }

    pub fn error(error: JsonRpcError) -> Self {
        Self::Error(error)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, JsonRpcMessage::Error(_))
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Response(resp) => resp.id.as_ref(),
            JsonRpcMessage::Error(err) => err.id.as_ref(),
        }
    }
}

impl From<JsonRpcError> for JsonRpcMessage {
    fn from(error: JsonRpcError) -> Self {
        Self::Error(error)
    }
}

/// What the server sends back for one HTTP body
///
/// Shape follows the input: a single object in, a single object out; an array in, an array out.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JsonRpcReply {
    Single(JsonRpcMessage),
    Batch(Vec<JsonRpcMessage>),
}

impl JsonRpcReply {
    pub fn messages(&self) -> &[JsonRpcMessage] {
        match self {
            JsonRpcReply::Single(message) => std::slice::from_ref(message),
            JsonRpcReply::Batch(messages) => messages,
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, JsonRpcReply::Batch(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(s: &str) -> Box<RawValue> {
        RawValue::from_string(s.to_string()).unwrap()
    }

    #[test]
    fn test_success_embeds_raw_result() {
        let message = JsonRpcMessage::success(Some(RequestId::from("1")), raw(r#"{"x":1}"#));
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json, json!({"jsonrpc": "2.0", "id": "1", "result": {"x": 1}}));
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_batch_serializes_as_array() {
        let reply = JsonRpcReply::Batch(vec![
            JsonRpcMessage::success(Some(RequestId::from(1i64)), raw("true")),
            JsonRpcMessage::success(None, raw("null")),
            JsonRpcError::parse_error().into(),
        ]);
        let json = serde_json::to_value(&reply).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["result"], true);
        assert!(json[1]["id"].is_null());
        assert_eq!(json[2]["error"]["code"], -32700);
        assert_eq!(reply.messages().len(), 3);
    }
}
