//! # Coordinator
//!
//! Owns the inference engine and both history stores. Front ends talk to it
//! through a [`CoordinatorHandle`]: each request is a [`Command`] carrying a
//! oneshot reply channel, served in arrival order on the coordinator thread.

#[allow(clippy::module_inception)]
mod coordinator;
mod handle;

pub use coordinator::{Classification, Coordinator, EvaluationReport, Listed, ModelListing};
pub use handle::{spawn, Command, CoordinatorHandle, Reply};
