//! # Scheduler Adapters
//!
//! Entry points the host calls. Neither one owns a frame loop.
//!
//! ```text
//! Synchronous      frame ──▶ load + unload
//! Throttled        frame ──▶ unload ──▶ (timer fired?) load
//! BackgroundLoads  frame ──▶ unload
//!                  BackgroundLoader thread ──▶ load every interval
//! ```
//!
//! Host frames never wait on chunk generation in the last two modes except
//! on the frame where the throttled timer fires.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{info, warn};

use crate::collaborators::{ChunkRenderer, PositionSource};
use crate::error::{Collaborator, StreamError, StreamResult};
use crate::streamer::{ChunkStreamer, TickReport};

/// Longest frame delta the scheduler accepts. Longer deltas (debugger
/// pauses, window drags) are clamped so one stall fires the timer once.
pub const MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

/// Shortest background interval.
pub const MIN_BACKGROUND_INTERVAL: Duration = Duration::from_millis(1);

const REPORT_CAPACITY: usize = 64;

// ============================================================================
// TIMER
// ============================================================================

/// Fires at most once per interval of accumulated frame time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntervalTimer {
    interval: Duration,
    accumulated: Duration,
}

impl IntervalTimer {
    /// Timer that fires on its first [`IntervalTimer::advance`].
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            accumulated: interval,
        }
    }

    /// Configured interval.
    #[inline]
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Adds `delta`; returns true and restarts if the interval elapsed.
    pub fn advance(&mut self, delta: Duration) -> bool {
        self.accumulated = self.accumulated.saturating_add(delta);
        if self.accumulated >= self.interval {
            self.accumulated = Duration::ZERO;
            true
        } else {
            false
        }
    }
}

// ============================================================================
// FRAME SCHEDULER
// ============================================================================

/// How [`FrameScheduler::frame`] splits work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickMode {
    /// Full tick every frame.
    Synchronous,
    /// Unload every frame, load when the interval elapses.
    Throttled(Duration),
    /// Unload every frame; a [`BackgroundLoader`] does the loading.
    BackgroundLoads,
}

/// Per-frame entry point for a host loop.
pub struct FrameScheduler<R: ChunkRenderer, P: PositionSource> {
    streamer: Arc<ChunkStreamer<R>>,
    position: P,
    mode: TickMode,
    timer: IntervalTimer,
}

impl<R: ChunkRenderer, P: PositionSource> FrameScheduler<R, P> {
    /// Scheduler in the mode the streamer's configuration selects.
    #[must_use]
    pub fn new(streamer: Arc<ChunkStreamer<R>>, position: P) -> Self {
        let mode = match streamer.config().background_interval() {
            Some(interval) => TickMode::Throttled(interval),
            None => TickMode::Synchronous,
        };
        Self::with_mode(streamer, position, mode)
    }

    /// Scheduler in an explicit mode.
    #[must_use]
    pub fn with_mode(streamer: Arc<ChunkStreamer<R>>, position: P, mode: TickMode) -> Self {
        let interval = match mode {
            TickMode::Throttled(interval) => interval,
            TickMode::Synchronous | TickMode::BackgroundLoads => Duration::ZERO,
        };
        Self {
            streamer,
            position,
            mode,
            timer: IntervalTimer::new(interval),
        }
    }

    /// Active mode.
    #[inline]
    #[must_use]
    pub const fn mode(&self) -> TickMode {
        self.mode
    }

    /// Shared streamer.
    #[inline]
    #[must_use]
    pub fn streamer(&self) -> &Arc<ChunkStreamer<R>> {
        &self.streamer
    }

    /// Runs this frame's share of streaming work.
    ///
    /// # Errors
    ///
    /// [`StreamError::MissingCollaborator`] if no position is available,
    /// otherwise whatever the streamer tick returns. A renderer outage
    /// during the load pass still returns the unload work of the frame,
    /// with [`TickReport::aborted`] set.
    pub fn frame(&mut self, delta: Duration) -> StreamResult<TickReport> {
        let delta = delta.min(MAX_FRAME_DELTA);
        let Some(position) = self.position.current_position() else {
            warn!("no observer position, tick skipped");
            return Err(StreamError::MissingCollaborator(Collaborator::Position));
        };

        match self.mode {
            TickMode::Synchronous => self.streamer.tick(position),
            TickMode::BackgroundLoads => self.streamer.unload_tick(position),
            TickMode::Throttled(_) => {
                let mut report = self.streamer.unload_tick(position)?;
                if self.timer.advance(delta) {
                    // Same position as the unload pass, so this cannot be skipped.
                    report.merge(self.streamer.load_tick(position)?);
                }
                Ok(report)
            }
        }
    }
}

// ============================================================================
// BACKGROUND LOADER
// ============================================================================

/// Runs the load phase on its own thread at a fixed interval.
///
/// Stops on [`BackgroundLoader::stop`] or drop.
pub struct BackgroundLoader {
    shutdown: Option<Sender<()>>,
    reports: Receiver<StreamResult<TickReport>>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundLoader {
    /// Starts the loader thread. The first load runs immediately.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn<R, P>(
        streamer: Arc<ChunkStreamer<R>>,
        position: P,
        interval: Duration,
    ) -> io::Result<Self>
    where
        R: ChunkRenderer + 'static,
        P: PositionSource + 'static,
    {
        let interval = interval.max(MIN_BACKGROUND_INTERVAL);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let (report_tx, report_rx) = bounded(REPORT_CAPACITY);

        let worker = thread::Builder::new()
            .name("terrastream-loader".into())
            .spawn(move || loop {
                let outcome = match position.current_position() {
                    Some(pos) => streamer.load_tick(pos),
                    None => Err(StreamError::MissingCollaborator(Collaborator::Position)),
                };
                match &outcome {
                    Err(err) => warn!(error = %err, "background load skipped"),
                    Ok(TickReport { aborted: Some(err), .. }) => {
                        warn!(error = %err, "background load aborted");
                    }
                    Ok(_) => {}
                }
                // Dropped when the host is not draining reports.
                let _ = report_tx.try_send(outcome);

                match shutdown_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        info!(interval_ms = interval.as_millis() as u64, "background loader started");
        Ok(Self {
            shutdown: Some(shutdown_tx),
            reports: report_rx,
            worker: Some(worker),
        })
    }

    /// True until the loader is stopped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Drains the reports produced since the last call.
    pub fn reports(&self) -> impl Iterator<Item = StreamResult<TickReport>> + '_ {
        self.reports.try_iter()
    }

    /// Drains pending reports, keeping only errors, aborts and per-chunk
    /// failures.
    pub fn failures(&self) -> Vec<StreamError> {
        let mut failures = Vec::new();
        for outcome in self.reports() {
            match outcome {
                Ok(report) => {
                    failures.extend(report.failures);
                    failures.extend(report.aborted);
                }
                Err(err) => failures.push(err),
            }
        }
        failures
    }

    /// Blocks until the next report arrives or `timeout` elapses.
    #[must_use]
    pub fn wait_report(&self, timeout: Duration) -> Option<StreamResult<TickReport>> {
        self.reports.recv_timeout(timeout).ok()
    }

    /// Signals the thread and waits for it to finish its current pass.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.try_send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("background loader panicked");
            }
            info!("background loader stopped");
        }
    }
}

impl Drop for BackgroundLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}
