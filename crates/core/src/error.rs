//! Error types for neurofilt core

use thiserror::Error;

/// Broad error category, used by callers that dispatch on the kind of
/// failure rather than on the exact message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or contradictory parameters.
    Configuration,
    /// A parameter is out of range or malformed.
    Value,
    /// A parameter has the wrong type.
    Type,
    /// A parameter combination is invalid for the requested operation.
    Argument,
    /// An IIR system has poles outside the unit circle.
    Stability,
    /// The FFT backend failed.
    Fft,
    /// Reading configuration failed.
    Io,
}

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{msg}")]
    Configuration { msg: String },

    #[error("{msg}")]
    InvalidValue { msg: String },

    #[error("{msg}")]
    InvalidType { msg: String },

    #[error("{msg}")]
    InvalidArgument { msg: String },

    #[error("{msg}")]
    Unstable { msg: String },

    #[error("FFT error: {msg}")]
    FftError { msg: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration { msg: msg.into() }
    }

    pub fn value(msg: impl Into<String>) -> Self {
        Self::InvalidValue { msg: msg.into() }
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::InvalidType { msg: msg.into() }
    }

    pub fn argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument { msg: msg.into() }
    }

    /// Error for a string that does not name one of `allowed`.
    pub fn invalid_choice(name: &str, allowed: &[&str], got: &str) -> Self {
        let allowed = allowed
            .iter()
            .map(|a| format!("'{}'", a))
            .collect::<Vec<_>>()
            .join(", ");
        Self::value(format!(
            "Invalid value for the '{}' parameter. Allowed values are {}, but got '{}' instead.",
            name, allowed, got
        ))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::InvalidValue { .. } => ErrorKind::Value,
            Self::InvalidType { .. } => ErrorKind::Type,
            Self::InvalidArgument { .. } => ErrorKind::Argument,
            Self::Unstable { .. } => ErrorKind::Stability,
            Self::FftError { .. } => ErrorKind::Fft,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<realfft::FftError> for CoreError {
    fn from(err: realfft::FftError) -> Self {
        Self::FftError {
            msg: err.to_string(),
        }
    }
}

/// Result type for neurofilt core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_choice_message() {
        let err = CoreError::invalid_choice("phase", &["zero", "forward"], "blah");
        assert_eq!(err.kind(), ErrorKind::Value);
        assert_eq!(
            err.to_string(),
            "Invalid value for the 'phase' parameter. Allowed values are 'zero', 'forward', but got 'blah' instead."
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(CoreError::config("x").kind(), ErrorKind::Configuration);
        assert_eq!(CoreError::argument("x").kind(), ErrorKind::Argument);
        assert_eq!(CoreError::type_error("x").kind(), ErrorKind::Type);
    }
}
