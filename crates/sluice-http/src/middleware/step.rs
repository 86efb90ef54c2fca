//! The pipeline step trait

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::{context::RequestContext, error::RequestError};

/// What the pipeline does after a step succeeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Run the next step
    Continue,
    /// Stop silently; the step has already sent a response
    Halt,
}

/// One stage of request processing
///
/// Steps run in registration order and share the request's context. Returning an error halts
/// the pipeline: it is logged with both its public and private parts and rendered as its
/// status (500 when unset) plus its public message.
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(&self, ctx: &mut RequestContext) -> Result<Flow, RequestError>;
}

/// Step backed by a closure returning a boxed future, see [`step_fn`]
pub struct StepFn<F> {
    f: F,
}

/// Wrap a closure as a [`Step`]
///
/// ```rust,no_run
/// use sluice_http::{Flow, step_fn};
///
/// let step = step_fn(|ctx| {
///     Box::pin(async move {
///         ctx.values_mut().insert("seen", true);
///         Ok(Flow::Continue)
///     })
/// });
/// ```
pub fn step_fn<F>(f: F) -> StepFn<F>
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, Result<Flow, RequestError>>
        + Send
        + Sync,
{
    StepFn { f }
}

#[async_trait]
impl<F> Step for StepFn<F>
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, Result<Flow, RequestError>>
        + Send
        + Sync,
{
    async fn run(&self, ctx: &mut RequestContext) -> Result<Flow, RequestError> {
        (self.f)(ctx).await
    }
}
