// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Autosave timer.
//
// The timer never touches document state. A Tokio task ticks at the
// configured interval and sends `AutosaveSignal::SaveNow` over a bounded
// channel; the document thread receives it and performs the read-only render
// and save itself. A channel of capacity one coalesces ticks that arrive while
// a save is still pending, and `SaveGuard` keeps saves from overlapping on a
// slow sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use redactwerk_core::error::{RedactwerkError, Result};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Message from the timer task to the document thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveSignal {
    SaveNow,
}

/// Convert a configured interval in minutes, never below one minute.
pub fn interval_from_minutes(minutes: u64) -> Duration {
    Duration::from_secs(minutes.max(1).saturating_mul(60))
}

/// Handle to a running autosave task.
pub struct AutosaveTimer {
    shutdown: Arc<Notify>,
    interval_tx: watch::Sender<Duration>,
    handle: Option<JoinHandle<()>>,
}

impl AutosaveTimer {
    /// Spawn the timer task. Must be called from within a Tokio runtime.
    ///
    /// Returns the handle and the receiving end the document thread should
    /// poll for save signals.
    pub fn start(interval: Duration) -> (Self, mpsc::Receiver<AutosaveSignal>) {
        let (signal_tx, signal_rx) = mpsc::channel(1);
        let (interval_tx, interval_rx) = watch::channel(interval);
        let shutdown = Arc::new(Notify::new());

        let task_shutdown = Arc::clone(&shutdown);
        let handle = tokio::spawn(async move {
            Self::tick_loop(task_shutdown, interval_rx, signal_tx).await;
        });

        info!(interval_secs = interval.as_secs_f64(), "Autosave timer started");
        (
            Self {
                shutdown,
                interval_tx,
                handle: Some(handle),
            },
            signal_rx,
        )
    }

    /// Change the tick interval. The current wait restarts with the new value.
    pub fn set_interval(&self, interval: Duration) {
        // Only fails once the task has exited, when there is nothing to update.
        if self.interval_tx.send(interval).is_ok() {
            debug!(interval_secs = interval.as_secs_f64(), "Autosave interval changed");
        }
    }

    /// Change the interval in whole minutes, clamped to at least one.
    pub fn set_interval_minutes(&self, minutes: u64) {
        self.set_interval(interval_from_minutes(minutes));
    }

    pub fn interval(&self) -> Duration {
        *self.interval_tx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the task and wait for it to exit.
    pub async fn stop(mut self) -> Result<()> {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            handle
                .await
                .map_err(|e| RedactwerkError::Autosave(format!("task join: {e}")))?;
        }
        info!("Autosave timer stopped");
        Ok(())
    }

    async fn tick_loop(
        shutdown: Arc<Notify>,
        mut interval_rx: watch::Receiver<Duration>,
        signals: mpsc::Sender<AutosaveSignal>,
    ) {
        loop {
            let period = *interval_rx.borrow_and_update();
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("autosave loop received shutdown signal");
                    break;
                }

                changed = interval_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }

                _ = tokio::time::sleep(period) => {
                    match signals.try_send(AutosaveSignal::SaveNow) {
                        Ok(()) => debug!("autosave signal sent"),
                        Err(TrySendError::Full(_)) => debug!("autosave already pending, tick coalesced"),
                        Err(TrySendError::Closed(_)) => {
                            debug!("autosave receiver dropped");
                            break;
                        }
                    }
                }
            }
        }
    }
}

impl Drop for AutosaveTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Save-in-flight flag shared between the document thread and any worker
/// that performs the actual write.
#[derive(Debug, Clone, Default)]
pub struct SaveGuard {
    in_flight: Arc<AtomicBool>,
}

impl SaveGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flag, or `None` if a save is already running. The flag is
    /// released when the returned token is dropped.
    pub fn try_begin(&self) -> Option<SaveToken> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SaveToken {
                in_flight: Arc::clone(&self.in_flight),
            })
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Proof that the holder owns the current save slot.
#[derive(Debug)]
pub struct SaveToken {
    in_flight: Arc<AtomicBool>,
}

impl Drop for SaveToken {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}
