//! JSON-RPC over HTTP as a pipeline step

use std::sync::Arc;

use async_trait::async_trait;
use http::{HeaderMap, StatusCode, Uri};
use sluice_json_rpc::JsonRpcServer;

use crate::{
    cancel::CancelContext,
    context::{self, RequestContext},
    error::RequestError,
    logger::RequestLogger,
    middleware::{Flow, Step},
    values::Values,
};

/// Transport context handed to JSON-RPC call handlers
///
/// A snapshot of the parts of [`RequestContext`] a call may need. The value bag is lent to
/// the batch and handed back to the request context once the batch is done.
#[derive(Debug, Clone)]
pub struct RpcContext {
    pub values: Values,
    pub cancel: CancelContext,
    pub logger: RequestLogger,
    pub request_id: String,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RpcContext {
    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn cancel_context(&self) -> &CancelContext {
        &self.cancel
    }

    pub fn logger(&self) -> &RequestLogger {
        &self.logger
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// First value of a query parameter of the HTTP request carrying the call
    pub fn query_param(&self, name: &str) -> Option<String> {
        context::query_param(&self.uri, name)
    }
}

/// Terminal step that answers the request with a JSON-RPC reply
///
/// Always responds 200 with a JSON body; protocol failures are reported inside the reply.
/// Only a failure to read the body (size ceiling, deadline) halts the pipeline with an error.
pub struct JsonRpcStep {
    server: Arc<JsonRpcServer<RpcContext>>,
}

impl JsonRpcStep {
    pub fn new(server: JsonRpcServer<RpcContext>) -> Self {
        Self {
            server: Arc::new(server),
        }
    }

    pub fn from_arc(server: Arc<JsonRpcServer<RpcContext>>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl Step for JsonRpcStep {
    async fn run(&self, ctx: &mut RequestContext) -> Result<Flow, RequestError> {
        let body = ctx.read_body().await?;

        let rpc = RpcContext {
            values: std::mem::take(ctx.values_mut()),
            cancel: ctx.cancel_context().clone(),
            logger: ctx.logger().clone(),
            request_id: ctx.request_id().to_string(),
            uri: ctx.uri().clone(),
            headers: ctx.headers().clone(),
        };
        let reply = self.server.handle(&rpc, &body).await;
        *ctx.values_mut() = rpc.values;

        ctx.send_json(StatusCode::OK, &reply);
        Ok(Flow::Halt)
    }
}
