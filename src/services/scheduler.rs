//! Pending-gated background task.
//!
//! A [`BackgroundTask`] runs its action at most once per interval, and only
//! if [`BackgroundTask::set_pending`] was called since the last run. Idle
//! ticks do nothing.

use crate::{Error, Result};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

type Action = Arc<dyn Fn() -> Result<()> + Send + Sync>;

struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Runs an action periodically when there is pending work.
pub struct BackgroundTask {
    name: String,
    interval: Duration,
    action: Action,
    pending: Arc<Mutex<bool>>,
    worker: Mutex<Option<Worker>>,
}

impl std::fmt::Debug for BackgroundTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTask")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("pending", &self.is_pending())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl BackgroundTask {
    /// Creates a stopped task.
    pub fn new(
        name: impl Into<String>,
        interval: Duration,
        action: impl Fn() -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            interval,
            action: Arc::new(action),
            pending: Arc::new(Mutex::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Marks work as pending; the next tick runs the action.
    pub fn set_pending(&self) {
        *lock(&self.pending) = true;
    }

    /// Returns `true` if work is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        *lock(&self.pending)
    }

    /// Runs the action now if work is pending. Returns `true` if it ran successfully.
    ///
    /// A failed run leaves the work pending for the next tick.
    pub fn tick(&self) -> bool {
        run_if_pending(&self.name, &self.pending, &self.action)
    }

    /// Returns `true` while the background thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.worker).is_some()
    }

    /// Starts the background thread. Returns `false` if it was already running.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn start(&self) -> Result<bool> {
        let mut worker = lock(&self.worker);
        if worker.is_some() {
            return Ok(false);
        }

        let (stop, stopped) = mpsc::channel::<()>();
        let name = self.name.clone();
        let interval = self.interval;
        let pending = Arc::clone(&self.pending);
        let action = Arc::clone(&self.action);

        let handle = std::thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            run_if_pending(&name, &pending, &action);
                        },
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!(task = %name, "Background task stopped");
            })
            .map_err(|e| Error::failed("spawn_background_task", e))?;

        tracing::info!(task = %self.name, interval_secs = self.interval.as_secs(), "Background task started");
        *worker = Some(Worker { stop, handle });
        Ok(true)
    }

    /// Stops the background thread and waits for it to exit.
    ///
    /// Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        let Some(worker) = lock(&self.worker).take() else {
            return false;
        };
        let _ = worker.stop.send(());
        if worker.handle.join().is_err() {
            tracing::warn!(task = %self.name, "Background task panicked");
        }
        true
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Takes the pending flag and runs `action` if it was set.
fn run_if_pending(name: &str, pending: &Mutex<bool>, action: &Action) -> bool {
    {
        let mut flag = lock(pending);
        if !*flag {
            return false;
        }
        *flag = false;
    }

    match action() {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(task = %name, error = %e, "Background task failed; will retry");
            *lock(pending) = true;
            false
        },
    }
}
