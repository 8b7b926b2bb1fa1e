//! Per-step solver parameters and solver identity.

pub use self::solver_state::SolverState;

mod solver_state;

/// Identifier of the solver responsible for a soft body.
///
/// A body registered with a world under one solver must not be silently
/// reassigned to a different one; see
/// [`CollisionRope::set_solver`](crate::object::CollisionRope::set_solver).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SolverId(pub usize);
