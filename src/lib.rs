//! cxai: chest X-ray classification core.
//!
//! - [`inference`]: model registry, bounded session cache, current selection
//! - [`evaluation`]: streaming dataset evaluation and metrics
//! - [`history`]: bounded-retention logs of classifications and evaluations
//! - [`coordinator`]: single owner of the above, driven over a command channel
//! - [`console`]: terminal front end

pub mod config;
pub mod console;
pub mod coordinator;
pub mod error;
pub mod evaluation;
pub mod history;
pub mod inference;
pub mod preprocess;

pub use error::{Error, Result};
