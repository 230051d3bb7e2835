//! Repeating timer
//!
//! This module provides:
//! - **RepeatingTimer**: the wait loop and its lifecycle operations
//! - **TimerBuilder**: validated construction
//! - **TimerError**: synchronous construction/reconfiguration errors

mod error;
mod repeating;


pub use error::TimerError;
pub use repeating::{RepeatingTimer, TickError, TickFlow, TickFn, TimerBuilder};
