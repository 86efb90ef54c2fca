//! Per-request middleware pipeline
//!
//! A [`Pipeline`] runs an ordered list of [`Step`]s against one [`RequestContext`]. Each step
//! either lets the request continue, halts it after sending its own response, or fails it
//! with a [`RequestError`] which the pipeline logs and renders.
//!
//! [`RequestContext`]: crate::RequestContext
//! [`RequestError`]: crate::RequestError

pub mod pipeline;
pub mod step;

pub use pipeline::{PanicHook, Pipeline, PipelineBuilder, PipelineConfig};
pub use step::{Flow, Step, StepFn, step_fn};
