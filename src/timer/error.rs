//! Error types for timer operations

use thiserror::Error;

/// Errors raised synchronously by timer construction and reconfiguration.
///
/// Errors returned by the tick callback itself are never surfaced through
/// this type; they are captured on the timer and read back via
/// [`RepeatingTimer::last_error`](crate::RepeatingTimer::last_error).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    /// The interval was zero, or the builder was finished without one.
    #[error("interval must be greater than zero")]
    InvalidInterval,

    /// The builder was finished without a tick callback.
    #[error("a tick callback is required")]
    MissingCallback,

    /// Reset was invoked while the timer owned no clock handle.
    #[error("timer has not been started")]
    NotStarted,
}
