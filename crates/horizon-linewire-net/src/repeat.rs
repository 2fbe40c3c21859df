//! Timer-driven resend of the armed text.

use std::ops::ControlFlow;
use std::time::Duration;

use horizon_linewire_core::PeriodicTask;
use horizon_linewire_core::logging::targets;
use parking_lot::Mutex;

use crate::error::{NetworkError, Result};

/// Shortest accepted repeat interval.
pub const MIN_REPEAT_INTERVAL: Duration = Duration::from_millis(100);

struct Armed {
    task: PeriodicTask,
    text: String,
}

/// Periodically hands a fixed line to a send function.
///
/// The scheduler never touches sockets: every tick goes through the same
/// send path manual sends use. Ticking stops when disarmed, when dropped, or
/// as soon as the send path reports [`NetworkError::NotRunning`].
pub struct RepeatScheduler {
    armed: Mutex<Option<Armed>>,
}

impl Default for RepeatScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RepeatScheduler {
    /// Create a disarmed scheduler.
    pub fn new() -> Self {
        Self {
            armed: Mutex::new(None),
        }
    }

    /// Parse an interval in milliseconds, enforcing [`MIN_REPEAT_INTERVAL`].
    pub fn parse_interval(text: &str) -> Result<Duration> {
        let text = text.trim();
        if text.is_empty() {
            return Err(NetworkError::RepeatRejected("Interval is empty.".into()));
        }
        let millis: u64 = text.parse().map_err(|_| {
            NetworkError::RepeatRejected(format!("Interval '{text}' is not a number of milliseconds."))
        })?;
        Self::check_interval(Duration::from_millis(millis))
    }

    fn check_interval(interval: Duration) -> Result<Duration> {
        if interval < MIN_REPEAT_INTERVAL {
            return Err(NetworkError::RepeatRejected(format!(
                "Interval {} ms is below the minimum of {} ms.",
                interval.as_millis(),
                MIN_REPEAT_INTERVAL.as_millis()
            )));
        }
        Ok(interval)
    }

    /// Start ticking `text` into `send` every `interval`.
    pub fn arm<F>(&self, interval: Duration, text: impl Into<String>, send: F) -> Result<()>
    where
        F: Fn(&str) -> Result<()> + Send + 'static,
    {
        let interval = Self::check_interval(interval)?;
        let text = text.into();

        let mut armed = self.armed.lock();
        if armed.as_ref().is_some_and(|a| a.task.is_running()) {
            return Err(NetworkError::RepeatRejected("Repeat is already enabled.".into()));
        }

        let tick_text = text.clone();
        let task = PeriodicTask::spawn("linewire-repeat", interval, move || match send(&tick_text) {
            Ok(()) => ControlFlow::Continue(()),
            Err(NetworkError::NotRunning) => {
                tracing::debug!(target: targets::REPEAT, "connection gone, repeat stopped");
                ControlFlow::Break(())
            }
            Err(e) => {
                tracing::warn!(target: targets::REPEAT, error = %e, "repeat tick failed");
                ControlFlow::Continue(())
            }
        })?;

        tracing::debug!(target: targets::REPEAT, interval_ms = interval.as_millis() as u64, "repeat armed");
        // A finished task left in the slot is replaced here; its thread has already exited.
        *armed = Some(Armed { task, text });
        Ok(())
    }

    /// Stop ticking. Returns whether a live repeat was stopped.
    pub fn disarm(&self) -> bool {
        let armed = self.armed.lock().take();
        match armed {
            Some(armed) => {
                let was_running = armed.task.is_running();
                armed.task.cancel();
                tracing::debug!(target: targets::REPEAT, "repeat disarmed");
                was_running
            }
            None => false,
        }
    }

    /// Whether ticks are still being produced.
    pub fn is_armed(&self) -> bool {
        self.armed
            .lock()
            .as_ref()
            .is_some_and(|a| a.task.is_running())
    }

    /// Interval of the live repeat.
    pub fn interval(&self) -> Option<Duration> {
        self.armed
            .lock()
            .as_ref()
            .filter(|a| a.task.is_running())
            .map(|a| a.task.interval())
    }

    /// Text of the live repeat.
    pub fn text(&self) -> Option<String> {
        self.armed
            .lock()
            .as_ref()
            .filter(|a| a.task.is_running())
            .map(|a| a.text.clone())
    }
}

impl std::fmt::Debug for RepeatScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepeatScheduler")
            .field("armed", &self.is_armed())
            .field("interval", &self.interval())
            .finish()
    }
}
