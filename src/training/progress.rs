//! Per-epoch progress reporting and cancellation

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Emitted once after every completed epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochProgress {
    /// Zero-based index of the completed epoch
    pub epoch: usize,
    /// Total epochs requested for the run
    pub epochs: usize,
    /// Mean training MSE over the epoch
    pub loss: f64,
    /// MSE on the held-out validation examples, if there are any
    pub val_loss: Option<f64>,
}

impl EpochProgress {
    /// Completed share of the run in percent
    pub fn percent(&self) -> f64 {
        if self.epochs == 0 {
            100.0
        } else {
            (self.epoch + 1) as f64 / self.epochs as f64 * 100.0
        }
    }
}

/// Receives progress between epochs
///
/// Called sequentially from the training thread, never concurrently.
pub trait ProgressSink {
    fn on_epoch_end(&mut self, progress: &EpochProgress);

    /// Checked before every epoch, returning true stops the run
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Discards all progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_epoch_end(&mut self, _progress: &EpochProgress) {}
}

impl<F> ProgressSink for F
where
    F: FnMut(&EpochProgress),
{
    fn on_epoch_end(&mut self, progress: &EpochProgress) {
        self(progress)
    }
}

/// Forwards every event over a channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<EpochProgress>,
}

impl ChannelSink {
    pub fn new(tx: Sender<EpochProgress>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelSink {
    fn on_epoch_end(&mut self, progress: &EpochProgress) {
        // A dropped receiver only means nobody is watching
        let _ = self.tx.send(*progress);
    }
}

/// Collects every event, handy for tests and reports
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub events: Vec<EpochProgress>,
}

impl ProgressSink for RecordingSink {
    fn on_epoch_end(&mut self, progress: &EpochProgress) {
        self.events.push(*progress);
    }
}

/// Shared flag requesting that training stop at the next epoch boundary
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Wraps a sink so that a [`CancellationToken`] can stop training
pub struct Cancellable<S> {
    inner: S,
    token: CancellationToken,
}

impl<S: ProgressSink> Cancellable<S> {
    pub fn new(inner: S, token: CancellationToken) -> Self {
        Self { inner, token }
    }
}

impl<S: ProgressSink> ProgressSink for Cancellable<S> {
    fn on_epoch_end(&mut self, progress: &EpochProgress) {
        self.inner.on_epoch_end(progress);
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.inner.is_cancelled()
    }
}
