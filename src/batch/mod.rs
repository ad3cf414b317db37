//! Offline batch generation
//!
//! Pre-warms the prerendering cache across an entire corpus with a
//! bounded pool of parallel workers and independent failure domains.

mod generator;
mod stats;

pub use generator::{BatchConfig, BatchGenerator, CancelFlag};
pub use stats::BatchReport;
