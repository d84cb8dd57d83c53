use thiserror::Error;

/// Canonical veq error taxonomy used across crates.
///
/// Classification guidance:
/// - [`VeqError::Planning`]: name/type/shape issues discovered before execution
/// - [`VeqError::Execution`]: runtime expression evaluation or data-shape failures
/// - [`VeqError::InvalidConfig`]: catalog/config contract violations
/// - [`VeqError::Unsupported`]: well-formed but intentionally unimplemented behavior
/// - [`VeqError::Io`]: raw filesystem IO failures from std APIs
#[derive(Debug, Error)]
pub enum VeqError {
    /// Invalid or inconsistent configuration/catalog state.
    ///
    /// Examples:
    /// - registering batches whose schema disagrees with the table schema
    /// - invalid engine option values
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Analysis failures before execution.
    ///
    /// Examples:
    /// - unknown table/column
    /// - type mismatch in expressions or lambda bodies
    /// - duplicate derived column name
    #[error("planning error: {0}")]
    Planning(String),

    /// Runtime execution failures after analysis succeeded.
    ///
    /// Examples:
    /// - expression evaluation/type mismatch at runtime
    /// - per-row array length mismatch in zip
    #[error("execution error: {0}")]
    Execution(String),

    /// Transparent std IO failures.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Valid request for a feature/shape not implemented in current version.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Standard veq result alias.
pub type Result<T> = std::result::Result<T, VeqError>;
