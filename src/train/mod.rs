//! Training module for the sampler
//!
//! This module contains the token resampler and the driver that runs it
//! under the annealing schedule.

mod resampler;
mod trainer;

pub(crate) use self::resampler::{run, Pass};

// Re-export public types
pub use self::resampler::sweep;
pub use self::trainer::Trainer;
