//! Pipeline construction and execution

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use http::{HeaderName, HeaderValue, Request, StatusCode, request::Parts};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::step::{Flow, Step};
use crate::{
    Body, HEADER_REQUEST_ID, HttpResponse,
    cancel::CancelContext,
    context::RequestContext,
    error::RequestError,
    interceptor::ResponseSink,
    metrics::HttpMetrics,
    router::Handler,
    values::Values,
};

/// Cross-cutting behaviour applied identically to every request
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on the request deadline; `None` keeps only the inbound cancellation
    pub request_timeout: Option<Duration>,
    /// Body reads beyond this many bytes fail
    pub max_body_bytes: Option<usize>,
    /// Header used to read and echo the request id
    pub request_id_header: HeaderName,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_timeout: None,
            max_body_bytes: None,
            request_id_header: HeaderName::from_static(HEADER_REQUEST_ID),
        }
    }
}

/// Called when a step panics, if configured
///
/// Receives the response sink, the request head and the panic payload. Without a hook the
/// panic propagates to the transport.
pub trait PanicHook: Send + Sync {
    fn recover(
        &self,
        writer: &mut dyn ResponseSink,
        request: &Parts,
        payload: Box<dyn Any + Send>,
    );
}

impl<F> PanicHook for F
where
    F: Fn(&mut dyn ResponseSink, &Parts, Box<dyn Any + Send>) + Send + Sync,
{
    fn recover(
        &self,
        writer: &mut dyn ResponseSink,
        request: &Parts,
        payload: Box<dyn Any + Send>,
    ) {
        self(writer, request, payload)
    }
}

pub struct Pipeline {
    steps: Vec<Arc<dyn Step>>,
    values: Arc<Values>,
    config: PipelineConfig,
    metrics: Option<HttpMetrics>,
    panic_hook: Option<Arc<dyn PanicHook>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every step against a fresh context for `request`
    pub async fn execute(&self, request: Request<Body>) -> HttpResponse {
        let started = Instant::now();
        let _in_flight = self.metrics.as_ref().map(HttpMetrics::start);

        let request_id = request
            .headers()
            .get(&self.config.request_id_header)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let inbound = request
            .extensions()
            .get::<CancellationToken>()
            .cloned()
            .map(CancelContext::new)
            .unwrap_or_default();
        let cancel = match self.config.request_timeout {
            Some(timeout) => inbound.with_timeout(timeout),
            None => inbound.child(),
        };
        let _cancel_on_exit = cancel.drop_guard();

        let mut ctx = RequestContext::new(request, request_id.clone())
            .with_values(Values::clone(&self.values))
            .with_cancel(cancel);
        if let Some(limit) = self.config.max_body_bytes {
            ctx = ctx.with_max_body_bytes(limit);
        }

        match HeaderValue::from_str(&request_id) {
            Ok(value) => ctx.set_header(self.config.request_id_header.clone(), value),
            Err(err) => ctx
                .logger()
                .warn(format_args!("cannot echo request id {:?}: {}", request_id, err)),
        }

        match &self.panic_hook {
            Some(hook) => {
                let outcome = AssertUnwindSafe(self.run_steps(&mut ctx))
                    .catch_unwind()
                    .await;
                if let Err(payload) = outcome {
                    let (writer, parts) = ctx.writer_and_parts();
                    hook.recover(writer, parts, payload);
                }
            }
            None => self.run_steps(&mut ctx).await,
        }

        if let Some(metrics) = &self.metrics {
            metrics.record(ctx.status(), started.elapsed());
        }
        ctx.into_response()
    }

    async fn run_steps(&self, ctx: &mut RequestContext) {
        for (index, step) in self.steps.iter().enumerate() {
            match step.run(ctx).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt) => {
                    debug!("pipeline halted by step {}", index);
                    return;
                }
                Err(err) => {
                    fail(ctx, err);
                    return;
                }
            }
        }
    }
}

/// Log a step failure and render it as the response
fn fail(ctx: &mut RequestContext, err: RequestError) {
    let message = match (err.public_message(), err.private_details()) {
        (Some(public), Some(private)) => format!("{public} -- {private}"),
        (Some(message), None) | (None, Some(message)) => message.to_string(),
        (None, None) => format!("{err:?}"),
    };
    ctx.logger()
        .warn(format_args!("{} {}: {}", ctx.method(), ctx.uri(), message));

    let status = err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match err.public_message() {
        Some(public) => ctx.send_text(status, public),
        None => ctx.send(status, None, &[]),
    }
}

#[async_trait]
impl Handler for Pipeline {
    async fn handle(&self, request: Request<Body>) -> HttpResponse {
        self.execute(request).await
    }
}

#[derive(Default)]
pub struct PipelineBuilder {
    steps: Vec<Arc<dyn Step>>,
    values: Values,
    config: PipelineConfig,
    metrics: Option<HttpMetrics>,
    panic_hook: Option<Arc<dyn PanicHook>>,
}

impl PipelineBuilder {
    /// Append a step; steps run in the order they are added
    pub fn step<S>(mut self, step: S) -> Self
    where
        S: Step + 'static,
    {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn step_arc(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    /// Add an entry to the base value bag copied into every request
    pub fn value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key, value);
        self
    }

    pub fn values(mut self, values: Values) -> Self {
        self.values = values;
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.config.max_body_bytes = Some(limit);
        self
    }

    pub fn request_id_header(mut self, header: HeaderName) -> Self {
        self.config.request_id_header = header;
        self
    }

    pub fn metrics(mut self, metrics: HttpMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn panic_hook<H>(mut self, hook: H) -> Self
    where
        H: PanicHook + 'static,
    {
        self.panic_hook = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            steps: self.steps,
            values: Arc::new(self.values),
            config: self.config,
            metrics: self.metrics,
            panic_hook: self.panic_hook,
        }
    }
}
