//! Error types for filter design

use neurofilt_core::{CoreError, ErrorKind};
use thiserror::Error;

/// Design error types
#[derive(Error, Debug)]
pub enum DesignError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("The requested filter length {length} is too short for the requested {transition:.2} Hz transition band, which requires {required} samples")]
    FilterTooShort {
        length: usize,
        transition: f64,
        required: usize,
    },

    #[error("Filter poles outside unit circle, filter will be unstable. Consider using different filter coefficients.")]
    Unstable,

    #[error("Landen transformation not converging")]
    NotConverging,
}

impl DesignError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(e) => e.kind(),
            Self::FilterTooShort { .. } | Self::NotConverging => ErrorKind::Value,
            Self::Unstable => ErrorKind::Stability,
        }
    }
}

/// Result type for design operations
pub type Result<T> = std::result::Result<T, DesignError>;
