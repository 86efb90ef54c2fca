//! Transport adapters around one typed business function
//!
//! A business function receives its bound request and a [`CallContext`] and knows nothing
//! about the transport:
//!
//! ```rust,ignore
//! #[derive(Default, Bind)]
//! struct SetPrice {
//!     #[bind(header = "X-Supplier-Id,notEmpty")]
//!     supplier_id: String,
//!     #[bind(query = "price,required")]
//!     price: i64,
//! }
//!
//! let vat = Vat::new(|req: SetPrice, cx: CallContext| async move {
//!     cx.logger().debug(format_args!("{} set price to {}", req.supplier_id, req.price));
//!     Ok(sluice_bind::None {})
//! })?;
//!
//! router.post("/setPrice", Pipeline::builder().step(vat.step()).build())?;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{FutureExt, future::BoxFuture};
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use sluice_http::{
    CONTENT_TYPE_JSON, CancelContext, Flow, RequestContext, RequestError, RequestLogger,
    RpcContext, Step,
};
use tracing::debug;

use crate::{
    binding::{Bind, Binding, Seed, Source, SourceLookup, Sources},
    error::ConfigError,
    json_rpc::VatCallHandler,
};

/// What a business function may see of the request: cancellation, logging and the id
#[derive(Debug, Clone)]
pub struct CallContext {
    cancel: CancelContext,
    logger: RequestLogger,
    request_id: String,
}

impl CallContext {
    pub fn new(
        cancel: CancelContext,
        logger: RequestLogger,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            cancel,
            logger,
            request_id: request_id.into(),
        }
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
}

impl From<&RequestContext> for CallContext {
    fn from(ctx: &RequestContext) -> Self {
        Self::new(
            ctx.cancel_context().clone(),
            ctx.logger().clone(),
            ctx.request_id(),
        )
    }
}

impl From<&RpcContext> for CallContext {
    fn from(ctx: &RpcContext) -> Self {
        Self::new(
            ctx.cancel_context().clone(),
            ctx.logger().clone(),
            ctx.request_id(),
        )
    }
}

/// Business result: a value to serialize, or JSON bytes serialized ahead of time
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<R> {
    Json(R),
    Raw(Bytes),
}

pub(crate) type BusinessFn<T, R> = Arc<
    dyn Fn(T, CallContext) -> BoxFuture<'static, Result<Reply<R>, RequestError>> + Send + Sync,
>;

/// One business function plus the binding of its request type
pub struct Vat<T, R> {
    binding: Arc<Binding<T>>,
    business: BusinessFn<T, R>,
}

impl<T, R> Clone for Vat<T, R> {
    fn clone(&self) -> Self {
        Self {
            binding: Arc::clone(&self.binding),
            business: Arc::clone(&self.business),
        }
    }
}

impl<T, R> Vat<T, R>
where
    T: Send + 'static,
    R: Serialize + Send + 'static,
{
    /// Wrap a business function returning a typed response, binding `T` via [`Bind`]
    pub fn new<F, Fut>(business: F) -> Result<Self, ConfigError>
    where
        T: Bind,
        F: Fn(T, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, RequestError>> + Send + 'static,
    {
        Ok(Self::with_binding(T::binding()?, business))
    }

    /// Wrap a business function that may answer with pre-serialized JSON
    pub fn cached<F, Fut>(business: F) -> Result<Self, ConfigError>
    where
        T: Bind,
        F: Fn(T, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply<R>, RequestError>> + Send + 'static,
    {
        Ok(Self::cached_with_binding(T::binding()?, business))
    }

    pub fn with_binding<F, Fut>(binding: Binding<T>, business: F) -> Self
    where
        F: Fn(T, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, RequestError>> + Send + 'static,
    {
        Self::cached_with_binding(binding, move |request, cx| {
            business(request, cx).map(|result| result.map(Reply::Json))
        })
    }

    pub fn cached_with_binding<F, Fut>(binding: Binding<T>, business: F) -> Self
    where
        F: Fn(T, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply<R>, RequestError>> + Send + 'static,
    {
        debug!("bound {}: {:?}", std::any::type_name::<T>(), binding);
        Self {
            binding: Arc::new(binding),
            business: Arc::new(move |request, cx| business(request, cx).boxed()),
        }
    }

    pub fn sources(&self) -> Sources {
        self.binding.sources()
    }

    pub fn binding(&self) -> &Binding<T> {
        &self.binding
    }

    /// Pipeline step that binds, calls and sends the reply
    pub fn step(&self) -> VatStep<T, R> {
        VatStep { vat: self.clone() }
    }

    /// JSON-RPC call handler for the same business function
    ///
    /// Fails when the request type reads headers or the query string, neither of which
    /// exists in a JSON-RPC envelope. Cookie fields are skipped and keep their default.
    pub fn json_rpc_handler(&self) -> Result<VatCallHandler<T, R>, ConfigError> {
        let sources = self.sources();
        for source in [Source::Header, Source::Query] {
            if sources.contains(source) {
                return Err(ConfigError::UnsupportedSource {
                    type_name: std::any::type_name::<T>(),
                    kind: source,
                });
            }
        }
        Ok(VatCallHandler::new(
            Arc::clone(&self.binding),
            Arc::clone(&self.business),
        ))
    }
}

/// Reads bound values out of an HTTP request
struct HttpLookup<'a> {
    ctx: &'a RequestContext,
}

impl SourceLookup for HttpLookup<'_> {
    fn lookup(&mut self, source: Source, key: &str) -> Option<Value> {
        match source {
            Source::Header => self
                .ctx
                .header(key)
                .filter(|value| !value.is_empty())
                .map(Value::from),
            Source::Cookie => self.ctx.cookie(key).map(Value::String),
            Source::Context => self.ctx.values().get(key).cloned(),
            Source::Query => self.ctx.query_param(key).map(Value::String),
            Source::Body => None,
        }
    }
}

/// Terminal pipeline step produced by [`Vat::step`]
pub struct VatStep<T, R> {
    vat: Vat<T, R>,
}

#[async_trait]
impl<T, R> Step for VatStep<T, R>
where
    T: Send + 'static,
    R: Serialize + Send + 'static,
{
    async fn run(&self, ctx: &mut RequestContext) -> Result<Flow, RequestError> {
        let binding = &self.vat.binding;

        let mut request = match binding.seed() {
            Seed::Body(decode) => ctx.decode_json_with(*decode).await?,
            Seed::Default(init) => init(),
        };

        binding
            .populate(&mut request, &mut HttpLookup { ctx: &*ctx })
            .map_err(|err| {
                RequestError::bad_request_detailed("error compiling request", err.to_string())
            })?;

        let cx = CallContext::from(&*ctx);
        match (self.vat.business)(request, cx).await? {
            Reply::Json(response) => ctx.send_json(StatusCode::OK, &response),
            Reply::Raw(data) => ctx.send(StatusCode::OK, Some(CONTENT_TYPE_JSON), &data),
        }
        Ok(Flow::Halt)
    }
}
