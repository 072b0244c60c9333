//! Error types for neurofilt

use neurofilt_core::{CoreError, ErrorKind};
use neurofilt_design::DesignError;
use thiserror::Error;

/// Filtering error types
#[derive(Error, Debug)]
pub enum FilterError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Design(#[from] DesignError),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

impl FilterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(e) => e.kind(),
            Self::Design(e) => e.kind(),
            Self::ConfigParse(_) | Self::ConfigSerialize(_) => ErrorKind::Configuration,
        }
    }
}

impl From<std::io::Error> for FilterError {
    fn from(err: std::io::Error) -> Self {
        Self::Core(CoreError::Io(err))
    }
}

/// Result type for neurofilt operations
pub type Result<T> = std::result::Result<T, FilterError>;
