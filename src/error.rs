use std::io;

use thiserror::Error;

/// Errors raised while configuring, training or persisting a model.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value was rejected before sampling started.
    #[error("{0}")]
    InvalidConfig(String),

    /// The corpus cannot be used with the requested model.
    #[error("invalid corpus: {0}")]
    InvalidCorpus(String),

    /// A count table cell would have gone below zero.
    ///
    /// This means a token was removed from a table it was never added to,
    /// so the tables no longer describe the current assignments.
    #[error("count underflow in {table} at {index}")]
    CountUnderflow {
        /// Name of the table.
        table: &'static str,
        /// Index of the cell, formatted.
        index: String,
    },

    /// The posterior of a token had no usable mass.
    #[error("degenerate distribution at token {token}: total = {total}")]
    DegenerateDistribution {
        /// Position of the token in the corpus.
        token: usize,
        /// The offending normalizing sum, or the first negative or
        /// non-finite score.
        total: f64,
    },

    /// A snapshot does not agree with the assignments it carries.
    #[error("inconsistent model snapshot: {0}")]
    Inconsistent(String),

    /// I/O failure while reading or writing a snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Snapshot (de)serialization failure.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        Error::InvalidConfig(msg.into())
    }

    pub(crate) fn corpus<S: Into<String>>(msg: S) -> Self {
        Error::InvalidCorpus(msg.into())
    }
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
