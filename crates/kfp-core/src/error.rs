//! Error types for the forecasting and sizing pipeline.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// How the decision loop reacts to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Not enough data yet. The tick is treated as warm-up.
    Input,
    /// The math broke down for this tick. A flat fallback is substituted.
    Computation,
    /// Fatal, raised before the first tick.
    Configuration,
}

/// Failures raised by the window, predictors and sizer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Fewer price points (or diffs) than the computation needs.
    #[error("Insufficient history: need at least {required} points, got {available}")]
    InsufficientHistory { required: usize, available: usize },

    /// The window is not full yet.
    #[error("Insufficient window: predictor needs {required} prices, window holds {available}")]
    InsufficientWindow { required: usize, available: usize },

    /// Predicted price equals the current price, so the Kelly edge is zero.
    #[error("Undefined edge: predicted price {predicted} gives no edge over current price {current}")]
    UndefinedEdge { current: f64, predicted: f64 },

    /// Empty input series or a non-finite filtered output.
    #[error("Degenerate spectrum: {message}")]
    DegenerateSpectrum { message: String },

    /// Random walk parameters could not be sampled.
    #[error("Simulation failed: {message}")]
    Simulation { message: String },

    /// Invalid configuration value.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl PipelineError {
    /// Create an insufficient history error.
    pub fn insufficient_history(required: usize, available: usize) -> Self {
        Self::InsufficientHistory {
            required,
            available,
        }
    }

    /// Create an insufficient window error.
    pub fn insufficient_window(required: usize, available: usize) -> Self {
        Self::InsufficientWindow {
            required,
            available,
        }
    }

    /// Create an undefined edge error.
    pub fn undefined_edge(current: f64, predicted: f64) -> Self {
        Self::UndefinedEdge { current, predicted }
    }

    /// Create a degenerate spectrum error.
    pub fn degenerate_spectrum(message: impl Into<String>) -> Self {
        Self::DegenerateSpectrum {
            message: message.into(),
        }
    }

    /// Create a simulation error.
    pub fn simulation(message: impl Into<String>) -> Self {
        Self::Simulation {
            message: message.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientHistory { .. } | Self::InsufficientWindow { .. } => ErrorKind::Input,
            Self::UndefinedEdge { .. }
            | Self::DegenerateSpectrum { .. }
            | Self::Simulation { .. } => ErrorKind::Computation,
            Self::InvalidConfig { .. } => ErrorKind::Configuration,
        }
    }
}
