//! Job execution -- the pipeline for a single resource.
//!
//! Split into focused submodules:
//! - [`context`] - Shared state and the failure path
//! - [`orchestration`] - State machine driving the stages
//! - [`transfer`] - Streaming download into the staging file
//! - [`convert`] - Offloaded conversion supervised by the progress monitor

mod context;
mod convert;
mod orchestration;
mod transfer;

pub(crate) use context::JobContext;
pub(crate) use orchestration::run_job;
