use thiserror::Error;

/// Error types for the odmrfit-rs library.
#[derive(Error, Debug)]
pub enum OdmrFitError {
    /// Unknown model name, constraint kind or other configuration value.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Shape mismatches, empty datasets and other malformed input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A spectrum was degenerate while computing initial guesses.
    #[error(
        "Numerical guess error at (polarization {polarization}, frequency range {frequency_range}, pixel {pixel}): {reason}"
    )]
    NumericalGuess {
        polarization: usize,
        frequency_range: usize,
        pixel: usize,
        reason: String,
    },

    /// The batched solver is unavailable, rejected the call, or failed internally.
    #[error("Fitting backend error: {0}")]
    FittingBackend(String),

    /// Unknown parameter name, or a result requested before fitting completed.
    #[error("Parameter lookup error: {0}")]
    ParameterLookup(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<crate::parameters::bounds::BoundsError> for OdmrFitError {
    fn from(err: crate::parameters::bounds::BoundsError) -> Self {
        OdmrFitError::InvalidInput(format!("{}", err))
    }
}

impl From<ndarray::ShapeError> for OdmrFitError {
    fn from(err: ndarray::ShapeError) -> Self {
        OdmrFitError::InvalidInput(format!("array shape error: {}", err))
    }
}

/// Result type alias for odmrfit-rs operations.
pub type Result<T> = std::result::Result<T, OdmrFitError>;
