use std::fmt::{Display, Formatter, Result};

use crate::counters::Timer;

/// Counters tracking the synchronization of one soft body with its
/// bounding-volume tree.
#[derive(Copy, Clone, Debug, Default)]
pub struct SyncCounters {
    enabled: bool,
    /// Number of bounding-volume leaves owned by the body.
    pub nleaves: usize,
    /// Number of leaves removed and reinserted into the tree during the last
    /// prediction.
    pub nreinserted: usize,
    /// Time spent in the whole prediction phase.
    pub prediction_time: Timer,
    /// Time spent updating the bounding-volume tree.
    pub sync_time: Timer,
}

impl SyncCounters {
    /// Create a new set of counters initialized to zero.
    pub fn new(enabled: bool) -> Self {
        SyncCounters {
            enabled,
            nleaves: 0,
            nreinserted: 0,
            prediction_time: Timer::new(),
            sync_time: Timer::new(),
        }
    }

    /// Enable the timers.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Return `true` if the timers are enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Disable the timers.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Notify that the prediction phase has started.
    pub fn prediction_started(&mut self) {
        if self.enabled {
            self.prediction_time.start();
        }
    }

    /// Notify that the prediction phase has finished.
    pub fn prediction_completed(&mut self) {
        if self.enabled {
            self.prediction_time.pause();
        }
    }

    /// Notify that the tree synchronization has started.
    pub fn sync_started(&mut self) {
        if self.enabled {
            self.sync_time.start();
        }
    }

    /// Notify that the tree synchronization has finished.
    pub fn sync_completed(&mut self) {
        if self.enabled {
            self.sync_time.pause();
        }
    }
}

impl Display for SyncCounters {
    fn fmt(&self, f: &mut Formatter) -> Result {
        writeln!(f, "Number of leaves: {}", self.nleaves)?;
        writeln!(f, "Number of leaves reinserted: {}", self.nreinserted)?;
        writeln!(f, "Prediction time: {}", self.prediction_time)?;
        writeln!(f, "Tree synchronization time: {}", self.sync_time)
    }
}
