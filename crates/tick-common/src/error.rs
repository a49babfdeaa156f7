use thiserror::Error;

/// Timer error types covering configuration-time failures.
///
/// All failures are synchronous: they surface before a timer is armed.
/// There is no asynchronous error channel for scheduled firings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TickError {
    /// A frequency name that maps to no known calendar unit.
    #[error("unsupported frequency: {0}")]
    UnsupportedFrequency(String),

    /// Timer interval was zero or too large to represent on the timeline.
    #[error("interval must be a positive duration, got {0:?}")]
    InvalidInterval(std::time::Duration),
}

/// Convenience type alias for timer operations.
pub type TickResult<T> = Result<T, TickError>;
