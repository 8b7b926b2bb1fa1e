//! Errors raised by the step protocol.

use thiserror::Error;

/// Errors raised by the two-phase step entry points and the solver
/// association of a soft body.
///
/// Passing an invalid timestep is a programmer error: it is rejected before
/// any state is mutated instead of being silently clamped.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum CordeError {
    /// A step entry point was called with a timestep that is not strictly
    /// positive.
    #[error("the timestep must be strictly positive")]
    InvalidTimestep,
    /// `set_solver` was called on a body already registered with a different
    /// solver. Reassignment must go through an explicit detach/attach
    /// sequence.
    #[error("a different solver is already attached to this body")]
    SolverAlreadyAttached,
}
