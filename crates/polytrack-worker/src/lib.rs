//! Polytrack Worker Library
//!
//! Background execution of transcode jobs: an in-process runner with a
//! bounded worker pool, capped exponential retry, and a handler seam so the
//! embedding application wires in the pipeline at startup.

pub mod job;
pub mod runner;
pub mod telemetry;

pub use job::{JobHandler, JobKind, PipelineJobHandler};
pub use runner::{JobRunner, JobRunnerConfig};
pub use telemetry::init_tracing;
