//! Unified error type for the monitoring pipeline.
//!
//! Each variant maps to a distinct failure domain. Transient conditions
//! (vanished processes, unclassifiable frames) are deliberately not errors:
//! the pipeline's resilience strategy is skip-and-continue, since every
//! input is re-sampled on the next cycle.

/// Application-level error.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Errors from the packet capture engine.
    #[error("{0}")]
    Capture(String),

    /// Failures writing the threshold audit log. Surfaced rather than
    /// swallowed: silent loss of the audit log defeats its purpose.
    #[error("{0}")]
    Persistence(String),

    /// Invalid startup configuration.
    #[error("{0}")]
    Config(String),
}

impl AppError {
    /// Returns the error kind as a string matching the variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Capture(_) => "Capture",
            AppError::Persistence(_) => "Persistence",
            AppError::Config(_) => "Config",
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Persistence(err.to_string())
    }
}
