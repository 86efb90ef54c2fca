use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::IgnoredAny;
use serde_json::Value;
use serde_json::value::RawValue;
use tracing::{debug, warn};

use crate::{
    error::{JsonRpcError, JsonRpcErrorObject},
    request::JsonRpcRequest,
    response::{JsonRpcMessage, JsonRpcReply},
};

/// Trait for handling one JSON-RPC method call
///
/// `C` is whatever per-request context the transport hands over; the server only passes it
/// through. Results are raw JSON so that handlers holding pre-serialized bytes can return
/// them without a decode/encode round trip.
#[async_trait]
pub trait CallHandler<C>: Send + Sync {
    async fn call(
        &self,
        ctx: &C,
        params: Option<&RawValue>,
    ) -> Result<Box<RawValue>, JsonRpcErrorObject>;
}

/// A simple function-based handler that ignores the transport context
pub struct FunctionHandler<F> {
    handler_fn: F,
}

impl<F> FunctionHandler<F>
where
    F: Fn(Option<&RawValue>) -> Result<Value, JsonRpcErrorObject> + Send + Sync,
{
    pub fn new(handler_fn: F) -> Self {
        Self { handler_fn }
    }
}

#[async_trait]
impl<C, F> CallHandler<C> for FunctionHandler<F>
where
    C: Send + Sync + 'static,
    F: Fn(Option<&RawValue>) -> Result<Value, JsonRpcErrorObject> + Send + Sync,
{
    async fn call(
        &self,
        _ctx: &C,
        params: Option<&RawValue>,
    ) -> Result<Box<RawValue>, JsonRpcErrorObject> {
        let value = (self.handler_fn)(params)?;
        serde_json::value::to_raw_value(&value)
            .map_err(|err| JsonRpcErrorObject::internal_error(Some(err.to_string())))
    }
}

/// JSON-RPC method table
///
/// Built once before serving and only read afterwards. In single-method mode every envelope
/// goes to the same handler and the envelope `method` member is ignored; the caller picks the
/// server instance (typically one per route path).
pub struct JsonRpcServer<C> {
    methods: HashMap<String, Arc<dyn CallHandler<C>>>,
    single: Option<Arc<dyn CallHandler<C>>>,
}

impl<C> JsonRpcServer<C>
where
    C: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
            single: None,
        }
    }

    /// Create a server where the method is implied by the route rather than the envelope
    pub fn single_method<H>(handler: H) -> Self
    where
        H: CallHandler<C> + 'static,
    {
        Self {
            methods: HashMap::new(),
            single: Some(Arc::new(handler)),
        }
    }

    /// Register a handler under a method name; a later registration replaces an earlier one
    pub fn add_method<H>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: CallHandler<C> + 'static,
    {
        self.methods.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn is_single_method(&self) -> bool {
        self.single.is_some()
    }

    pub fn registered_methods(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }

    /// Process one request body
    ///
    /// Never fails: every problem is expressed as a JSON-RPC error inside the reply.
    pub async fn handle(&self, ctx: &C, body: &[u8]) -> JsonRpcReply {
        let body = trim_leading_whitespace(body);

        if body.first() == Some(&b'{') {
            return match serde_json::from_slice::<Box<RawValue>>(body) {
                Ok(raw) => JsonRpcReply::Single(self.dispatch(ctx, &raw).await),
                Err(err) => {
                    warn!("error parsing JSON-RPC call: {}", err);
                    JsonRpcReply::Single(JsonRpcError::parse_error().into())
                }
            };
        }

        let items = match serde_json::from_slice::<Vec<Box<RawValue>>>(body) {
            Ok(items) => items,
            Err(err) => {
                // Well-formed JSON that is neither an object nor an array
                if serde_json::from_slice::<IgnoredAny>(body).is_ok() {
                    return JsonRpcReply::Single(JsonRpcError::invalid_request(None).into());
                }
                warn!("error parsing JSON-RPC call: {}", err);
                return JsonRpcReply::Single(JsonRpcError::parse_error().into());
            }
        };

        if items.is_empty() {
            return JsonRpcReply::Single(JsonRpcError::invalid_request(None).into());
        }

        let mut messages = Vec::with_capacity(items.len());
        for item in &items {
            messages.push(self.dispatch(ctx, item).await);
        }
        JsonRpcReply::Batch(messages)
    }

    async fn dispatch(&self, ctx: &C, raw: &RawValue) -> JsonRpcMessage {
        let request: JsonRpcRequest = match serde_json::from_str(raw.get()) {
            Ok(request) => request,
            Err(err) => {
                debug!("malformed JSON-RPC envelope: {}", err);
                return JsonRpcError::invalid_request(None).into();
            }
        };

        if request.has_empty_id() {
            return JsonRpcError::invalid_request(None).into();
        }
        // The version member is not enforced and a missing id is answered with null
        let id = request.id;

        let handler = match &self.single {
            Some(handler) => handler,
            None => match self.methods.get(&request.method) {
                Some(handler) => handler,
                None => {
                    debug!("JSON-RPC method not found: {}", request.method);
                    return JsonRpcError::method_not_found(id, &request.method).into();
                }
            },
        };

        debug!(method = %request.method, id = ?id, "dispatching JSON-RPC call");
        match handler.call(ctx, request.params.as_deref()).await {
            Ok(result) => JsonRpcMessage::success(id, result),
            Err(error) => JsonRpcError::new(id, error).into(),
        }
    }
}

impl<C> Default for JsonRpcServer<C>
where
    C: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

fn trim_leading_whitespace(body: &[u8]) -> &[u8] {
    let start = body
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .unwrap_or(body.len());
    &body[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracing_test::traced_test;

    struct Ctx {
        tenant: String,
    }

    struct TenantHandler;

    #[async_trait]
    impl CallHandler<Ctx> for TenantHandler {
        async fn call(
            &self,
            ctx: &Ctx,
            _params: Option<&RawValue>,
        ) -> Result<Box<RawValue>, JsonRpcErrorObject> {
            Ok(serde_json::value::to_raw_value(&json!({"tenant": ctx.tenant})).unwrap())
        }
    }

    fn echo() -> FunctionHandler<impl Fn(Option<&RawValue>) -> Result<Value, JsonRpcErrorObject>>
    {
        FunctionHandler::new(|params: Option<&RawValue>| {
            let params: Value = match params {
                Some(raw) => serde_json::from_str(raw.get())
                    .map_err(|e| JsonRpcErrorObject::invalid_params(e.to_string()))?,
                None => Value::Null,
            };
            Ok(json!({"echo": params}))
        })
    }

    fn ctx() -> Ctx {
        Ctx {
            tenant: "acme".to_string(),
        }
    }

    async fn reply_json(server: &JsonRpcServer<Ctx>, body: &str) -> Value {
        let reply = server.handle(&ctx(), body.as_bytes()).await;
        serde_json::to_value(&reply).unwrap()
    }

    async fn reply_body(server: &JsonRpcServer<Ctx>, body: &str) -> String {
        let reply = server.handle(&ctx(), body.as_bytes()).await;
        serde_json::to_string(&reply).unwrap()
    }

    #[tokio::test]
    async fn test_single_object_success() {
        let server = JsonRpcServer::new().add_method("foo", echo());
        let out = reply_json(
            &server,
            r#"{"id":"1","jsonrpc":"2.0","method":"foo","params":{}}"#,
        )
        .await;

        assert_eq!(
            out,
            json!({"jsonrpc": "2.0", "id": "1", "result": {"echo": {}}})
        );
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let server = JsonRpcServer::new().add_method("foo", echo());
        let out = reply_json(&server, r#"{"id":7,"jsonrpc":"2.0","method":"bar"}"#).await;

        assert_eq!(out["id"], 7);
        assert_eq!(out["error"]["code"], -32601);
        assert_eq!(out["error"]["message"], "method not found: 'bar'");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_malformed_body_is_parse_error_with_null_id() {
        let server = JsonRpcServer::new().add_method("foo", echo());
        let out = reply_json(&server, r#"{"id":"1","jsonrpc":"2.0","#).await;

        assert!(out["id"].is_null());
        assert_eq!(out["error"]["code"], -32700);
        assert!(logs_contain("error parsing JSON-RPC call"));
    }

    #[tokio::test]
    async fn test_batch_preserves_length_and_order() {
        let server = JsonRpcServer::new().add_method("foo", echo());
        let out = reply_json(
            &server,
            r#"  [
                {"id":"a","jsonrpc":"2.0","method":"foo","params":[1]},
                {"id":"b","jsonrpc":"2.0","method":"missing"},
                {"id":"c","jsonrpc":"2.0","method":"foo","params":[3]}
            ]"#,
        )
        .await;

        let items = out.as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["id"], "a");
        assert_eq!(items[0]["result"]["echo"], json!([1]));
        assert_eq!(items[1]["id"], "b");
        assert_eq!(items[1]["error"]["code"], -32601);
        assert_eq!(items[2]["id"], "c");
    }

    #[tokio::test]
    async fn test_empty_string_id_is_invalid_request() {
        let server = JsonRpcServer::new().add_method("foo", echo());

        let out = reply_json(&server, r#"{"id":"","jsonrpc":"2.0","method":"foo"}"#).await;
        assert_eq!(out["error"]["code"], -32600);
        assert!(out["id"].is_null());
    }

    #[tokio::test]
    async fn test_missing_or_null_id_is_dispatched_with_null_id() {
        let server = JsonRpcServer::new().add_method("foo", echo());

        let out = reply_json(&server, r#"{"jsonrpc":"2.0","method":"foo","params":{}}"#).await;
        assert_eq!(
            out,
            json!({"jsonrpc": "2.0", "id": null, "result": {"echo": {}}})
        );

        let out = reply_json(&server, r#"{"id":null,"jsonrpc":"2.0","method":"foo"}"#).await;
        assert!(out["id"].is_null());
        assert_eq!(out["result"]["echo"], Value::Null);

        let out = reply_json(&server, r#"{"jsonrpc":"2.0","method":"bar"}"#).await;
        assert!(out["id"].is_null());
        assert_eq!(out["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_version_member_is_not_enforced() {
        let server = JsonRpcServer::new().add_method("foo", echo());

        let out = reply_json(&server, r#"{"id":"1","method":"foo","params":{}}"#).await;
        assert_eq!(out["id"], "1");
        assert_eq!(out["result"]["echo"], json!({}));

        let out = reply_json(&server, r#"{"id":"x","jsonrpc":"1.0","method":"foo"}"#).await;
        assert_eq!(out["id"], "x");
        assert!(out.get("error").is_none());
    }

    #[tokio::test]
    async fn test_large_numeric_id_is_echoed() {
        let server = JsonRpcServer::new().add_method("foo", echo());
        let body = reply_body(
            &server,
            r#"{"id":18446744073709551615,"jsonrpc":"2.0","method":"foo"}"#,
        )
        .await;
        assert!(body.contains(r#""id":18446744073709551615"#));
        assert!(body.contains(r#""result""#));
    }

    #[tokio::test]
    async fn test_empty_batch_and_scalar_bodies() {
        let server = JsonRpcServer::new().add_method("foo", echo());

        let out = reply_json(&server, "[]").await;
        assert_eq!(out["error"]["code"], -32600);

        let out = reply_json(&server, "42").await;
        assert_eq!(out["error"]["code"], -32600);

        let out = reply_json(&server, "").await;
        assert_eq!(out["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_single_method_mode_ignores_envelope_method() {
        let server = JsonRpcServer::single_method(TenantHandler);
        assert!(server.is_single_method());

        let out = reply_json(&server, r#"{"id":"1","jsonrpc":"2.0","method":"whatever"}"#).await;
        assert_eq!(out["result"]["tenant"], "acme");
    }

    #[tokio::test]
    async fn test_handler_error_is_wrapped_with_id() {
        let failing = FunctionHandler::new(|_: Option<&RawValue>| {
            Err(JsonRpcErrorObject::internal_error(Some("boom".into())))
        });
        let server: JsonRpcServer<Ctx> = JsonRpcServer::new().add_method("fail", failing);
        let out = reply_json(&server, r#"{"id":3,"jsonrpc":"2.0","method":"fail"}"#).await;

        assert_eq!(out["id"], 3);
        assert_eq!(out["error"]["code"], -32603);
        assert_eq!(out["error"]["message"], "boom");
        assert!(out.get("result").is_none());
    }
}
