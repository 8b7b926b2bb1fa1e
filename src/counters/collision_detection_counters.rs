use std::fmt::{Display, Formatter, Result};

use crate::counters::Timer;

/// Counters for the broadphase and collision dispatch stages.
#[derive(Copy, Clone, Debug, Default)]
pub struct CollisionDetectionCounters {
    /// Number of overlapping pairs currently tracked by the broadphase.
    pub ncontact_pairs: usize,
    /// Number of pairs suppressed by the exclusion sets of the bodies.
    pub nignored_pairs: usize,
    /// Time spent updating the broadphase.
    pub broad_phase_time: Timer,
    /// Time spent dispatching the collision handlers.
    pub dispatch_time: Timer,
}

impl CollisionDetectionCounters {
    /// Create a new set of counters initialized to zero.
    pub fn new() -> Self {
        CollisionDetectionCounters {
            ncontact_pairs: 0,
            nignored_pairs: 0,
            broad_phase_time: Timer::new(),
            dispatch_time: Timer::new(),
        }
    }
}

impl Display for CollisionDetectionCounters {
    fn fmt(&self, f: &mut Formatter) -> Result {
        writeln!(f, "Number of contact pairs: {}", self.ncontact_pairs)?;
        writeln!(f, "Number of ignored pairs: {}", self.nignored_pairs)?;
        writeln!(f, "Broad-phase time: {}", self.broad_phase_time)?;
        writeln!(f, "Dispatch time: {}", self.dispatch_time)
    }
}
