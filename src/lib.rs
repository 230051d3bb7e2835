//! Repeating interval timer with cooperative cancellation.
//!
//! A [`RepeatingTimer`] runs a caller-supplied callback once per interval on
//! the calling task until the callback signals stop, the callback errors, a
//! [`tokio_util::sync::CancellationToken`] fires, or another task stops it.
//!
//! ```
//! use std::time::Duration;
//! use retick::{RepeatingTimer, TickFlow};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut remaining = 3;
//! let timer = RepeatingTimer::new(Duration::from_millis(10), move || {
//!     remaining -= 1;
//!     Ok(if remaining == 0 { TickFlow::Stop } else { TickFlow::Continue })
//! })
//! .unwrap();
//!
//! timer.start().await;
//! assert_eq!(timer.ticks(), 3);
//! # }
//! ```

pub mod timer;

pub use timer::{RepeatingTimer, TickError, TickFlow, TickFn, TimerBuilder, TimerError};
