//! Request-stop-and-wait hand-shake between the control thread and the I/O loop.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::state::SessionState;

#[derive(Debug)]
struct Inner {
    keep_running: bool,
    running: bool,
    state: SessionState,
}

/// Per-session shutdown coordination.
///
/// One coordinator is shared (via `Arc`) by the owning endpoint and the single
/// I/O loop thread of the current session. [`begin`](Self::begin) resets it
/// under the lock before a new loop thread is spawned.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    inner: Mutex<Inner>,
    stopped: Condvar,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    /// Create a coordinator in the `Idle` state.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                keep_running: false,
                running: false,
                state: SessionState::Idle,
            }),
            stopped: Condvar::new(),
        }
    }

    /// Mark a new session as running. Called before the loop thread starts.
    pub fn begin(&self) {
        let mut inner = self.inner.lock();
        inner.keep_running = true;
        inner.running = true;
        inner.state = SessionState::Running;
    }

    /// Return to `Idle` after a failed start.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.keep_running = false;
        inner.running = false;
        inner.state = SessionState::Idle;
    }

    /// Whether the loop should continue. Checked once per loop iteration.
    pub fn keep_running(&self) -> bool {
        self.inner.lock().keep_running
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Clear the keep-running flag without waiting.
    ///
    /// Returns `false` if no loop was running.
    pub fn request_stop(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.keep_running = false;
        if inner.running {
            inner.state = SessionState::StoppingRequested;
            true
        } else {
            false
        }
    }

    /// Clear the keep-running flag and block until the loop has torn down.
    ///
    /// Returns immediately if the loop already stopped on its own.
    pub fn request_stop_and_wait(&self) {
        let mut inner = self.inner.lock();
        inner.keep_running = false;
        if inner.running {
            inner.state = SessionState::StoppingRequested;
        }
        while inner.running {
            self.stopped.wait(&mut inner);
        }
    }

    /// Wait up to `timeout` for the loop to stop. Returns whether it has.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut inner = self.inner.lock();
        if inner.running {
            let _ = self
                .stopped
                .wait_while_for(&mut inner, |inner| inner.running, timeout);
        }
        !inner.running
    }

    /// Called by the I/O loop once every socket is closed.
    pub fn mark_stopped(&self) {
        let mut inner = self.inner.lock();
        inner.keep_running = false;
        inner.running = false;
        inner.state = SessionState::Stopped;
        self.stopped.notify_all();
    }
}
