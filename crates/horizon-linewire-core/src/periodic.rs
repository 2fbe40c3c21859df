//! Cancellable periodic tasks on a dedicated thread.
//!
//! A [`PeriodicTask`] invokes its closure every `interval` until one of:
//!
//! - [`PeriodicTask::cancel`] is called (blocks until the thread has exited),
//! - the closure returns [`ControlFlow::Break`],
//! - the task handle is dropped.
//!
//! Ticks never overlap: the next deadline is computed after the closure
//! returns. A tick that runs long simply delays the next one.
//!
//! # Example
//!
//! ```
//! use std::ops::ControlFlow;
//! use std::time::Duration;
//! use horizon_linewire_core::PeriodicTask;
//!
//! let mut remaining = 3;
//! let task = PeriodicTask::spawn("countdown", Duration::from_millis(10), move || {
//!     remaining -= 1;
//!     if remaining == 0 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
//! })
//! .unwrap();
//!
//! task.join();
//! assert!(!task.is_running());
//! ```

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use parking_lot::Mutex;

use crate::error::{CoreError, Result};
use crate::logging::targets;

/// Shared liveness state between the handle and the task thread.
struct PeriodicState {
    running: AtomicBool,
    ticks: AtomicU64,
}

/// A repeating task running on its own named thread.
pub struct PeriodicTask {
    name: String,
    interval: Duration,
    stop_tx: Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
    state: Arc<PeriodicState>,
}

impl PeriodicTask {
    /// Start a periodic task.
    ///
    /// The first tick fires one `interval` after this call returns.
    pub fn spawn<F>(name: impl Into<String>, interval: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        if interval.is_zero() {
            return Err(CoreError::InvalidInterval);
        }

        let name = name.into();
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let state = Arc::new(PeriodicState {
            running: AtomicBool::new(true),
            ticks: AtomicU64::new(0),
        });

        let thread_state = state.clone();
        let thread_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let mut deadline = Instant::now() + interval;
                loop {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    thread_state.ticks.fetch_add(1, Ordering::AcqRel);
                    if tick().is_break() {
                        tracing::debug!(target: targets::PERIODIC, task = %thread_name, "periodic task finished");
                        break;
                    }
                    deadline = Instant::now() + interval;
                }
                thread_state.running.store(false, Ordering::Release);
            })
            .map_err(|e| CoreError::thread_spawn(&name, e))?;

        tracing::debug!(target: targets::PERIODIC, task = %name, interval_ms = interval.as_millis() as u64, "periodic task started");

        Ok(Self {
            name,
            interval,
            stop_tx,
            handle: Mutex::new(Some(handle)),
            state,
        })
    }

    /// The task's thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configured tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the task thread is still ticking.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Number of ticks started so far.
    pub fn tick_count(&self) -> u64 {
        self.state.ticks.load(Ordering::Acquire)
    }

    /// Stop ticking and wait for the thread to exit.
    ///
    /// Safe to call more than once. Must not be called from inside the tick
    /// closure itself; return [`ControlFlow::Break`] there instead.
    pub fn cancel(&self) {
        let _ = self.stop_tx.try_send(());
        self.join();
    }

    /// Wait for the task thread to exit without requesting it.
    pub fn join(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            tracing::warn!(target: targets::PERIODIC, task = %self.name, "periodic task panicked");
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}
