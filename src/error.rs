//! Error taxonomy for the AAE training engine
//!
//! Construction-time problems (bad dimensions, unknown modality) are `Config`
//! errors carrying the offending field. Non-finite losses during training are
//! `Divergence` errors carrying the step index and phase; they halt the run.

use thiserror::Error;

use crate::training::Phase;

/// All errors produced by the core engine
#[derive(Debug, Error)]
pub enum AaeError {
    /// Invalid configuration detected at construction time
    #[error("invalid configuration: field `{field}`: {message}")]
    Config {
        /// Name of the offending configuration field
        field: &'static str,
        /// Description of what is wrong with it
        message: String,
    },

    /// Non-finite loss encountered during training
    #[error("non-finite {loss} loss at step {step} during {phase:?} phase; training halted")]
    Divergence {
        /// Global step index at which the divergence occurred
        step: usize,
        /// Phase that produced the non-finite value
        phase: Phase,
        /// Which loss term diverged
        loss: &'static str,
    },

    /// Malformed data from the batch source
    #[error("malformed batch: {0}")]
    Data(String),

    /// Checkpoint save/restore failure
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// Error from the tensor backend
    #[error(transparent)]
    Backend(#[from] tch::TchError),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AaeError>;

impl AaeError {
    /// Shorthand for a configuration error
    pub fn config(field: &'static str, message: impl Into<String>) -> Self {
        Self::Config {
            field,
            message: message.into(),
        }
    }
}
