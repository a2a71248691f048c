//! Error types.
//!
//! - `FitError` is returned by the statistical kernel (comparator, weighted
//!   statistics, binning, grid evaluation).
//! - `AppError` is the binary-facing error: a message plus a process exit code.

use thiserror::Error;

/// Errors raised by the fitting kernel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// Parallel input sequences have different lengths.
    ///
    /// This is a configuration bug (filter sets out of alignment) and is never
    /// recovered from.
    #[error("{context}: length mismatch (expected {expected}, got {actual})")]
    ShapeMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// Every weight is zero, so weighted statistics are undefined.
    #[error("total weight is zero; weighted statistics are undefined")]
    ZeroTotalWeight,

    /// Model probabilities of one observation sum to NaN or infinity.
    #[error("observation '{0}' has non-finite total probability")]
    NonFiniteWeight(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A model did not provide a variable that the analysis asked for.
    #[error("model {model_index} has no variable '{variable}'")]
    MissingVariable { variable: String, model_index: usize },

    /// The model store has no entry for the requested key.
    #[error("no model stored for {0}")]
    ModelNotFound(String),

    /// The run was aborted by the caller.
    #[error("grid evaluation cancelled")]
    Cancelled,

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

impl FitError {
    pub fn shape(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        FitError::ShapeMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let exit_code = match err {
            FitError::ShapeMismatch { .. }
            | FitError::InvalidArgument(_)
            | FitError::MissingVariable { .. }
            | FitError::ModelNotFound(_) => 2,
            FitError::ZeroTotalWeight
            | FitError::NonFiniteWeight(_)
            | FitError::Cancelled
            | FitError::ThreadPool(_) => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_errors_map_to_input_exit_code() {
        let err: AppError = FitError::shape("observation 'g1' errors", 5, 4).into();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("expected 5, got 4"));
    }

    #[test]
    fn cancellation_maps_to_fatal_exit_code() {
        let err: AppError = FitError::Cancelled.into();
        assert_eq!(err.exit_code(), 4);
    }
}
