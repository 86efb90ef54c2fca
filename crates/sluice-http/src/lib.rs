//! # Sluice HTTP
//!
//! Request dispatch for hyper services: a method + path router, a per-request middleware
//! pipeline and the [`RequestContext`] every pipeline step works against.
//!
//! ## Features
//! - Static routes plus routes with a single trailing path parameter (`/users/:id`)
//! - Ordered pipeline steps with uniform error rendering and logging
//! - Request id propagation, request deadlines and a request body ceiling
//! - Status-class request counters, 2xx latency and an in-flight gauge
//! - Optional panic recovery hook
//! - JSON-RPC 2.0 endpoints as a pipeline step
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use sluice_http::{Flow, Pipeline, Router, Server, ServerConfig, step_fn};
//! use http::StatusCode;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hello = Pipeline::builder()
//!     .step(step_fn(|ctx| {
//!         Box::pin(async move {
//!             ctx.send_text(StatusCode::OK, "hello");
//!             Ok(Flow::Halt)
//!         })
//!     }))
//!     .build();
//!
//! let mut router = Router::new();
//! router.get("/hello", hello)?;
//!
//! Server::new(ServerConfig::default(), router).run().await?;
//! # Ok(())
//! # }
//! ```

pub mod body;
pub mod cancel;
pub mod context;
pub mod error;
pub mod interceptor;
pub mod json_rpc;
pub mod logger;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod server;
pub mod values;

#[cfg(test)]
mod tests;

use bytes::Bytes;
use http_body_util::Full;

pub use body::Body;
pub use cancel::{CancelContext, CancelError};
pub use context::RequestContext;
pub use error::{RequestError, RouteError, ServerError};
pub use interceptor::{BufferedResponse, ResponseSink, StatusInterceptor};
pub use json_rpc::{JsonRpcStep, RpcContext};
pub use logger::RequestLogger;
pub use metrics::{HttpMetrics, MetricsError, MetricsRegistry};
pub use middleware::{Flow, PanicHook, Pipeline, PipelineBuilder, PipelineConfig, Step, step_fn};
pub use router::{Handler, PathParam, RouteMatch, Router, StatusHandler, handler_fn};
pub use server::{Server, ServerConfig};
pub use values::Values;

/// Boxed error used for body streams and error sources
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response type produced by every handler
pub type HttpResponse = http::Response<Full<Bytes>>;

/// Request id header, read on input and always echoed on output
pub const HEADER_REQUEST_ID: &str = "x-request-id";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";
