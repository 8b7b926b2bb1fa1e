//! Counters for benchmarking the collision bridge and its broadphase.

use std::fmt::{Display, Formatter, Result};

pub use self::collision_detection_counters::CollisionDetectionCounters;
pub use self::sync_counters::SyncCounters;
pub use self::timer::Timer;

mod collision_detection_counters;
mod sync_counters;
mod timer;

/// Aggregation of all the performance counters tracked for one world step.
pub struct Counters {
    enabled: bool,
    step_time: Timer,
    cd: CollisionDetectionCounters,
}

impl Counters {
    /// Create a new set of counters initialized to zero.
    pub fn new(enabled: bool) -> Self {
        Counters {
            enabled,
            step_time: Timer::new(),
            cd: CollisionDetectionCounters::new(),
        }
    }

    /// Enable all the counters.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Return `true` if the counters are enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Disable all the counters.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Notify that the time-step has started.
    pub fn step_started(&mut self) {
        if self.enabled {
            self.step_time.start();
        }
    }

    /// Notify that the time-step has finished.
    pub fn step_completed(&mut self) {
        if self.enabled {
            self.step_time.pause();
        }
    }

    /// Total time spent for one step of the simulation.
    pub fn step_time(&self) -> f64 {
        self.step_time.time()
    }

    /// Notify that the broadphase update has started.
    pub fn broad_phase_started(&mut self) {
        if self.enabled {
            self.cd.broad_phase_time.start();
        }
    }

    /// Notify that the broadphase update has finished.
    pub fn broad_phase_completed(&mut self) {
        if self.enabled {
            self.cd.broad_phase_time.pause();
        }
    }

    /// Time spent updating the broadphase.
    pub fn broad_phase_time(&self) -> f64 {
        self.cd.broad_phase_time.time()
    }

    /// Notify that the collision dispatch has started.
    pub fn dispatch_started(&mut self) {
        if self.enabled {
            self.cd.dispatch_time.start();
        }
    }

    /// Notify that the collision dispatch has finished.
    pub fn dispatch_completed(&mut self) {
        if self.enabled {
            self.cd.dispatch_time.pause();
        }
    }

    /// Set the number of contact pairs generated.
    pub fn set_ncontact_pairs(&mut self, n: usize) {
        self.cd.ncontact_pairs = n;
    }

    /// The number of contact pairs generated by the last broadphase update.
    pub fn ncontact_pairs(&self) -> usize {
        self.cd.ncontact_pairs
    }

    /// Set the number of pairs suppressed by exclusion sets.
    pub fn set_nignored_pairs(&mut self, n: usize) {
        self.cd.nignored_pairs = n;
    }

    /// The number of pairs suppressed by exclusion sets during the last
    /// dispatch.
    pub fn nignored_pairs(&self) -> usize {
        self.cd.nignored_pairs
    }
}

impl Display for Counters {
    fn fmt(&self, f: &mut Formatter) -> Result {
        writeln!(f, "Total timestep time: {}", self.step_time)?;
        self.cd.fmt(f)
    }
}
