// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::running::RunningTests;
use crate::{
    cancel::CancellationToken,
    errors::{MonitorShutdownError, MonitorStartError},
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use debug_ignore::DebugIgnore;
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use tracing::{debug, error, warn};
use verdict_metadata::{LongRunningTest, LongRunningTestsSummary};

/// Called with the current set of long-running tests, from the monitor's thread.
pub type LongRunningCallback = Box<dyn FnMut(&LongRunningTestsSummary) + Send>;

/// How long [`LongRunningMonitor::shutdown`] waits for the monitor thread to exit.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Returns how often a monitor with the given threshold wakes up on its own.
pub fn poll_interval(threshold: Duration) -> Duration {
    (threshold / 10).max(MIN_POLL_INTERVAL)
}

/// Formats a long-running test as a human-readable diagnostic.
pub fn long_running_message(test: &LongRunningTest) -> String {
    let secs = test.elapsed.as_secs();
    format!(
        "Long running test: '{}' (elapsed: {:02}:{:02}:{:02})",
        test.display_name,
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
    )
}

#[derive(Debug)]
enum Control {
    Tick(Sender<()>),
    Stop,
}

/// A background loop that reports tests running past a threshold.
///
/// The monitor polls a shared [`RunningTests`] set on its own thread. It wakes up every
/// [`poll_interval`], or immediately on [`tick`](Self::tick) or shutdown. On every wake-up the
/// callback is invoked with every test whose elapsed time is at or above the threshold; the
/// callback is not invoked if there are none.
///
/// The monitor stops polling once the run is cancelled.
#[derive(Debug)]
pub struct LongRunningMonitor {
    threshold: Duration,
    control: Sender<Control>,
    exited: Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl LongRunningMonitor {
    /// Starts a monitor thread.
    pub fn start(
        threshold: Duration,
        running: Arc<RunningTests>,
        cancel: CancellationToken,
        callback: LongRunningCallback,
    ) -> Result<Self, MonitorStartError> {
        let (control_tx, control_rx) = crossbeam_channel::unbounded();
        let (exited_tx, exited_rx) = crossbeam_channel::bounded(1);

        let worker = MonitorLoop {
            threshold,
            interval: poll_interval(threshold),
            running,
            cancel,
            callback: DebugIgnore(callback),
            control: control_rx,
        };
        let thread = thread::Builder::new()
            .name("verdict-long-running-monitor".to_owned())
            .spawn(move || {
                worker.run();
                let _ = exited_tx.send(());
            })
            .map_err(MonitorStartError::new)?;
        debug!(?threshold, "long-running test monitor started");

        Ok(Self {
            threshold,
            control: control_tx,
            exited: exited_rx,
            thread: Some(thread),
        })
    }

    /// Returns the configured threshold.
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Wakes the monitor immediately, and blocks until it has processed the wake-up.
    ///
    /// Returns immediately if the monitor has already exited.
    pub fn tick(&self) {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if self.control.send(Control::Tick(ack_tx)).is_ok() {
            // An error means the loop exited without processing the tick.
            let _ = ack_rx.recv();
        }
    }

    /// Stops the monitor and waits for its thread to exit, up to [`DEFAULT_SHUTDOWN_TIMEOUT`].
    pub fn shutdown(self) -> Result<(), MonitorShutdownError> {
        self.shutdown_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    /// Stops the monitor and waits for its thread to exit, up to `timeout`.
    ///
    /// The callback is not invoked again once this is called.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Result<(), MonitorShutdownError> {
        self.stop(timeout)
    }

    fn stop(&mut self, timeout: Duration) -> Result<(), MonitorShutdownError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        // A send error means the loop already exited.
        let _ = self.control.send(Control::Stop);

        match self.exited.recv_timeout(timeout) {
            // Disconnected means the thread went away without signaling, e.g. a panicking
            // callback. It's still gone.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if thread.join().is_err() {
                    warn!("long-running test monitor thread panicked");
                }
                debug!("long-running test monitor stopped");
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Err(MonitorShutdownError::new(timeout)),
        }
    }
}

impl Drop for LongRunningMonitor {
    fn drop(&mut self) {
        if let Err(err) = self.stop(DEFAULT_SHUTDOWN_TIMEOUT) {
            error!("{err}");
        }
    }
}

#[derive(Debug)]
struct MonitorLoop {
    threshold: Duration,
    interval: Duration,
    running: Arc<RunningTests>,
    cancel: CancellationToken,
    callback: DebugIgnore<LongRunningCallback>,
    control: Receiver<Control>,
}

impl MonitorLoop {
    fn run(mut self) {
        loop {
            // None means the poll interval elapsed.
            let wake = crossbeam_channel::select! {
                recv(self.control) -> msg => Some(msg.unwrap_or(Control::Stop)),
                default(self.interval) => None,
            };
            let ack = match wake {
                Some(Control::Tick(ack)) => Some(ack),
                Some(Control::Stop) => break,
                None => None,
            };

            if self.cancel.is_cancelled() {
                debug!("run cancelled, long-running test monitor exiting");
                break;
            }

            let now = self.running.clock().now();
            self.report(now);

            if let Some(ack) = ack {
                let _ = ack.send(());
            }
        }
    }

    fn report(&mut self, now: Instant) {
        let tests = self.running.exceeding(now, self.threshold);
        if tests.is_empty() {
            return;
        }
        debug!(count = tests.len(), "reporting long-running tests");
        (self.callback.0)(&LongRunningTestsSummary {
            threshold: self.threshold,
            tests,
        });
    }
}
