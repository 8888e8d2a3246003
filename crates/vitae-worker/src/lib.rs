//! Vitae Worker
//!
//! Everything that moves an upload from NOT STARTED to a finished state: the
//! discovery scheduler that finds eligible uploads, the durable task queue that
//! dispatches them, and the claim / process / finalize pipeline each task runs.

pub mod context;
pub mod dispatcher;
pub mod handler;
pub mod pipeline;
pub mod queue;
pub mod scheduler;

#[cfg(test)]
pub mod test_helpers;

pub use context::TaskHandlerContext;
pub use dispatcher::{DispatchHandle, Dispatcher};
pub use handler::UploadTaskContext;
pub use pipeline::{PipelineDeps, PipelineOutcome, ResumePipeline};
pub use queue::{TaskQueue, TaskQueueConfig};
pub use scheduler::{DiscoveryScheduler, TickReport};
