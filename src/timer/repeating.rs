//! Repeating timer (wait loop + lifecycle)
//!
//! A `RepeatingTimer` invokes a caller-supplied callback at a fixed interval
//! until the callback signals stop, the callback errors, an external
//! cancellation token fires, or another task calls [`RepeatingTimer::stop`].
//!
//! # Lifecycle
//!
//! 1. Construct via [`RepeatingTimer::new`] or [`RepeatingTimer::builder`]
//! 2. Await a start operation on a task of your choosing (the timer never
//!    spawns its own tasks)
//! 3. Stop from the callback, from a cancellation token, or from another
//!    task holding the same `Arc`

use std::error::Error;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::error::TimerError;

/// Signal returned by the tick callback to steer the wait loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    /// Keep ticking
    Continue,
    /// End the wait loop after this tick
    Stop,
}

/// Opaque error a tick callback may surface.
pub type TickError = Box<dyn Error + Send + Sync>;

/// Callback invoked once per tick.
pub type TickFn = Box<dyn FnMut() -> Result<TickFlow, TickError> + Send>;

/// Live clock state owned by the running wait loop.
///
/// Created fresh on each start, taken and discarded on each stop. The mutex
/// holding it doubles as the guard that keeps two concurrent stops (or a
/// stop racing a reset) from tearing the handle down twice.
struct ClockHandle {
    /// Fired by `stop()` to end the wait loop
    stop: CancellationToken,

    /// Carries interval rebinds from `reset()` into the wait loop
    interval_tx: watch::Sender<Duration>,
}

/// A timer that fires a callback every `interval` until told otherwise.
///
/// All methods take `&self`, so a timer wrapped in an `Arc` can be started
/// on one task and stopped, reset, or observed from another.
///
/// # Error policy (fail-fast)
///
/// The wait loop terminates on the first tick whose callback returns an
/// error, recording it for [`RepeatingTimer::last_error`]. A callback that
/// ends the loop with `Ok(TickFlow::Stop)` leaves the recorded error
/// untouched; successful ticks never overwrite it either.
pub struct RepeatingTimer {
    interval: Mutex<Duration>,
    callback: Mutex<TickFn>,
    started: AtomicBool,
    running: AtomicBool,
    tick_count: AtomicU64,
    last_error: Mutex<Option<Arc<dyn Error + Send + Sync>>>,
    clock: Mutex<Option<ClockHandle>>,
}

impl RepeatingTimer {
    /// Create a timer firing every `interval`.
    ///
    /// Fails with [`TimerError::InvalidInterval`] when `interval` is zero.
    pub fn new<F>(interval: Duration, callback: F) -> Result<Self, TimerError>
    where
        F: FnMut() -> Result<TickFlow, TickError> + Send + 'static,
    {
        Self::builder().interval(interval).on_tick(callback).build()
    }

    /// Start building a timer. See [`TimerBuilder`].
    pub fn builder() -> TimerBuilder {
        TimerBuilder::default()
    }

    /// Run the wait loop until the callback signals stop or errors, or
    /// another task calls [`RepeatingTimer::stop`].
    ///
    /// Blocks the calling task for the lifetime of the loop. Callback errors
    /// are not returned here; poll [`RepeatingTimer::last_error`] after this
    /// resolves.
    pub async fn start(&self) {
        self.run_loop(None).await;
    }

    /// Like [`RepeatingTimer::start`], but also ends the wait loop when
    /// `cancel` fires.
    ///
    /// Cancellation is observed between ticks, never mid-callback. Once
    /// observed, the clock handle is torn down and no further callback
    /// invocation occurs.
    pub async fn start_with_cancellation(&self, cancel: CancellationToken) {
        self.run_loop(Some(cancel)).await;
    }

    /// Stop the timer and release its clock handle.
    ///
    /// Idempotent: stopping an already-stopped or never-started timer is a
    /// no-op. Safe to call from any task or thread, including concurrently
    /// with another stop.
    pub fn stop(&self) {
        if let Ok(mut clock) = self.clock.lock() {
            if let Some(handle) = clock.take() {
                handle.stop.cancel();
            }
        }
        self.running.store(false, Ordering::SeqCst);
        self.started.store(false, Ordering::SeqCst);
    }

    /// Rebind the firing interval of the current clock handle.
    ///
    /// The running wait loop picks the new period up at its next suspension
    /// point; the tick count and all flags are untouched, and the next tick
    /// fires one full new period after the rebind. The stored interval is
    /// updated too, so a later restart honors the latest value.
    ///
    /// Fails with [`TimerError::InvalidInterval`] when `new_interval` is
    /// zero and with [`TimerError::NotStarted`] when the timer owns no clock
    /// handle (never started, or stopped).
    pub fn reset(&self, new_interval: Duration) -> Result<(), TimerError> {
        if new_interval.is_zero() {
            return Err(TimerError::InvalidInterval);
        }
        let clock = self.clock.lock().map_err(|_| TimerError::NotStarted)?;
        let handle = clock.as_ref().ok_or(TimerError::NotStarted)?;
        // The loop may already have exited on its own; rebinding a dead
        // clock is still a successful no-op, matching stop's idempotence.
        let _ = handle.interval_tx.send(new_interval);
        if let Ok(mut interval) = self.interval.lock() {
            *interval = new_interval;
        }
        tracing::debug!(interval_ms = new_interval.as_millis() as u64, "timer interval rebound");
        Ok(())
    }

    /// Clear the recorded error, stop, and run the wait loop again with the
    /// stored interval.
    ///
    /// The tick count is deliberately NOT reset; it keeps counting from its
    /// prior value across restarts.
    pub async fn restart(&self) {
        self.clear_error();
        self.stop();
        self.start().await;
    }

    /// Like [`RepeatingTimer::restart`], with a freshly supplied
    /// cancellation token for the new run.
    pub async fn restart_with_cancellation(&self, cancel: CancellationToken) {
        self.clear_error();
        self.stop();
        self.start_with_cancellation(cancel).await;
    }

    /// True once a start operation has run and no stop has since cleared it.
    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// True while the wait loop is actively dispatching ticks.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && self.running.load(Ordering::SeqCst)
    }

    /// Number of ticks dispatched so far, across restarts.
    pub fn ticks(&self) -> u64 {
        self.tick_count.load(Ordering::SeqCst)
    }

    /// Currently configured interval.
    pub fn interval(&self) -> Duration {
        self.interval.lock().map(|d| *d).unwrap_or_default()
    }

    /// Error recorded from the most recent erroring tick, if any.
    pub fn last_error(&self) -> Option<Arc<dyn Error + Send + Sync>> {
        self.last_error.lock().ok().and_then(|last| last.clone())
    }

    /// Clear the recorded error.
    pub fn clear_error(&self) {
        if let Ok(mut last) = self.last_error.lock() {
            *last = None;
        }
    }

    async fn run_loop(&self, cancel: Option<CancellationToken>) {
        let period = self.interval();
        let stop = CancellationToken::new();
        let (interval_tx, mut interval_rx) = watch::channel(period);
        if let Ok(mut clock) = self.clock.lock() {
            *clock = Some(ClockHandle {
                stop: stop.clone(),
                interval_tx,
            });
        }
        self.started.store(true, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        tracing::debug!(interval_ms = period.as_millis() as u64, "timer started");

        // A token nobody cancels stands in for the plain (non-cancellable)
        // start variant, so both variants share one loop.
        let cancel = cancel.unwrap_or_default();
        let mut ticker = new_ticker(period);

        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    // stop() already cleared the flags and took the handle
                    return;
                }
                _ = cancel.cancelled() => {
                    self.running.store(false, Ordering::SeqCst);
                    self.stop();
                    tracing::debug!("cancellation signal received, stopping timer");
                    return;
                }
                changed = interval_rx.changed() => {
                    match changed {
                        Ok(()) => {
                            let period = *interval_rx.borrow_and_update();
                            ticker = new_ticker(period);
                        }
                        // Sender gone: the handle was replaced or torn down
                        Err(_) => return,
                    }
                }
                _ = ticker.tick() => {
                    if self.dispatch_tick() == TickFlow::Stop {
                        return;
                    }
                }
            }
        }
    }

    /// Dispatch one tick: bump the count, run the callback, apply the
    /// fail-fast error policy.
    fn dispatch_tick(&self) -> TickFlow {
        self.tick_count.fetch_add(1, Ordering::SeqCst);
        let outcome = match self.callback.lock() {
            Ok(mut callback) => (*callback)(),
            // Poisoned callback mutex: a previous tick panicked mid-call
            Err(_) => Ok(TickFlow::Stop),
        };
        match outcome {
            Ok(TickFlow::Continue) => TickFlow::Continue,
            Ok(TickFlow::Stop) => {
                self.running.store(false, Ordering::SeqCst);
                TickFlow::Stop
            }
            Err(err) => {
                tracing::warn!(error = %err, "tick callback failed");
                if let Ok(mut last) = self.last_error.lock() {
                    *last = Some(Arc::from(err));
                }
                self.running.store(false, Ordering::SeqCst);
                TickFlow::Stop
            }
        }
    }
}

impl std::fmt::Debug for RepeatingTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepeatingTimer")
            .field("interval", &self.interval())
            .field("has_started", &self.has_started())
            .field("is_running", &self.is_running())
            .field("ticks", &self.ticks())
            .finish_non_exhaustive()
    }
}

/// Builder for [`RepeatingTimer`].
///
/// Validation happens in [`TimerBuilder::build`]: the interval must be
/// non-zero and a tick callback must have been supplied.
#[derive(Default)]
pub struct TimerBuilder {
    interval: Option<Duration>,
    callback: Option<TickFn>,
}

impl TimerBuilder {
    /// Set the firing interval.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Set the callback invoked once per tick.
    pub fn on_tick<F>(mut self, callback: F) -> Self
    where
        F: FnMut() -> Result<TickFlow, TickError> + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Finish the builder.
    ///
    /// Fails with [`TimerError::InvalidInterval`] when the interval is zero
    /// or was never set, and with [`TimerError::MissingCallback`] when no
    /// callback was supplied.
    pub fn build(self) -> Result<RepeatingTimer, TimerError> {
        let interval = self
            .interval
            .filter(|d| !d.is_zero())
            .ok_or(TimerError::InvalidInterval)?;
        let callback = self.callback.ok_or(TimerError::MissingCallback)?;

        Ok(RepeatingTimer {
            interval: Mutex::new(interval),
            callback: Mutex::new(callback),
            started: AtomicBool::new(false),
            running: AtomicBool::new(false),
            tick_count: AtomicU64::new(0),
            last_error: Mutex::new(None),
            clock: Mutex::new(None),
        })
    }
}

/// First fire one full period after creation, missed ticks dropped.
fn new_ticker(period: Duration) -> time::Interval {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
