//! Countdown: a per-episode counter plus the async ticker that drives it
//!
//! Every tick carries the generation of the episode that scheduled it. The
//! session discards ticks whose generation no longer matches, and cancelling
//! the handle stops the ticker so no further ticks are produced.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Result of one tick on a [`Countdown`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStep {
    /// Still counting, this many seconds left
    Remaining(u32),
    /// Just reached zero; produced exactly once per countdown
    ReachedZero,
    /// Already reached zero earlier
    Spent,
}

/// Visible counter for one Counting episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    generation: u64,
    remaining: u32,
    expired: bool,
}

impl Countdown {
    /// Durations below one second are raised to one
    pub fn new(generation: u64, duration_secs: u32) -> Self {
        Self {
            generation,
            remaining: duration_secs.max(1),
            expired: false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Decrement by one second
    pub fn tick(&mut self) -> CountdownStep {
        if self.expired {
            return CountdownStep::Spent;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.expired = true;
            CountdownStep::ReachedZero
        } else {
            CountdownStep::Remaining(self.remaining)
        }
    }
}

/// One elapsed second, tagged with its episode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownTick {
    pub generation: u64,
}

/// Spawns tick tasks at a fixed interval
#[derive(Debug, Clone, Copy)]
pub struct CountdownScheduler {
    interval: Duration,
}

impl CountdownScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Send `ticks` ticks for `generation` into `sink`, one per interval.
    ///
    /// The task ends early when cancelled or when the receiver is gone.
    pub fn schedule<E>(
        &self,
        generation: u64,
        ticks: u32,
        sink: mpsc::UnboundedSender<E>,
    ) -> CountdownHandle
    where
        E: From<CountdownTick> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let interval = self.interval;

        let task = tokio::spawn(async move {
            for _ in 0..ticks {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
                trace!(generation, "countdown tick");
                if sink.send(CountdownTick { generation }.into()).is_err() {
                    return;
                }
            }
        });

        CountdownHandle { cancel, task }
    }
}

/// Owner of a running ticker; dropping it cancels the ticker
#[derive(Debug)]
pub struct CountdownHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl CountdownHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
