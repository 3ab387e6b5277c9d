//! Error types for virtual species generation

use thiserror::Error;

/// Main error type for virtual species operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Bad or inconsistent parameters: variable-name mismatch, unknown
    /// function, malformed formula, unknown area name.
    #[error("Configuration error in {context}: {reason}")]
    Configuration { context: String, reason: String },

    /// Min-max rescaling over a surface with no spread.
    #[error("Degenerate raster: {0}")]
    DegenerateRaster(String),

    #[error("Conversion did not converge after {iterations} iterations (target prevalence {target}, reached {achieved})")]
    ConversionNotConverged {
        iterations: usize,
        target: f64,
        achieved: f64,
    },

    #[error("Prevalence {target} is unreachable: attainable range is [{reachable_min}, {reachable_max}]")]
    PrevalenceUnreachable {
        target: f64,
        reachable_min: f64,
        reachable_max: f64,
    },

    /// Wrong raster value domain or wrong object state.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient cells: requested {requested}, only {available} eligible")]
    InsufficientCells { requested: usize, available: usize },

    #[error("Degenerate sampling weights: {0}")]
    DegenerateWeights(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a [`Error::Configuration`] error
    pub fn config(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Configuration {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for virtual species operations
pub type Result<T> = std::result::Result<T, Error>;
