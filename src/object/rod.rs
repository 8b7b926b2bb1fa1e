use na::{self, RealField};

use crate::math::{Point, Vector};

/// The kinematic contract between a rod model and its collision bridge.
///
/// A rod model owns an ordered, fixed-length sequence of mass points and the
/// internal constraints between them. The bridge only reads per-point state
/// and delegates the two advance operations; the model's constitutive
/// behavior is entirely its own.
pub trait RodModel<N: RealField> {
    /// The number of mass points of the rod. Fixed after construction.
    fn num_points(&self) -> usize;

    /// The committed position of the `i`-th mass point.
    fn position(&self, i: usize) -> Point<N>;

    /// The committed velocity of the `i`-th mass point.
    fn velocity(&self, i: usize) -> Vector<N>;

    /// The speculative position of the `i`-th mass point, valid after a call
    /// to `predict`.
    fn predicted_position(&self, i: usize) -> Point<N>;

    /// Speculatively advance the internal dynamics by `dt` without
    /// committing them. Must not mutate the committed state.
    fn predict(&mut self, dt: N);

    /// Commit the advance for this tick.
    fn integrate(&mut self, dt: N);

    /// Overwrite the committed position of the `i`-th mass point.
    fn set_position(&mut self, i: usize, position: Point<N>);

    /// Overwrite the committed velocity of the `i`-th mass point.
    fn set_velocity(&mut self, i: usize, velocity: Vector<N>);
}

/// The configuration record a rod and its collision bridge are built from.
#[derive(Clone, Debug)]
pub struct RodConfig<N: RealField> {
    /// The total mass of the rod, distributed evenly over its points.
    pub mass: N,
    /// Stiffness of the stretch constraints between consecutive points.
    pub stretch_stiffness: N,
    /// Stiffness of the bend constraints between second neighbors.
    pub bend_stiffness: N,
    /// Velocity damping coefficient of the internal constraints.
    pub damping: N,
    /// The gravity applied to every mass point.
    pub gravity: Vector<N>,
    /// Number of position-projection iterations run at integration.
    pub solver_iterations: usize,
    /// Factor applied to the raw timestep to obtain the effective timestep.
    pub timescale: N,
    /// Fixed inflation applied to every bounding-volume leaf.
    pub radial_margin: N,
    /// Inflation along the motion direction, per unit of predicted
    /// displacement.
    pub velocity_margin: N,
    /// Hysteresis margin deciding when a leaf is reinserted into the tree.
    pub update_margin: N,
}

impl<N: RealField> Default for RodConfig<N> {
    fn default() -> Self {
        RodConfig {
            mass: N::one(),
            stretch_stiffness: na::convert(1.0e3),
            bend_stiffness: na::convert(1.0e2),
            damping: na::convert(0.5),
            gravity: Vector::new(N::zero(), na::convert(-9.81), N::zero()),
            solver_iterations: 4,
            timescale: N::one(),
            radial_margin: na::convert(0.05),
            velocity_margin: N::one(),
            // A quarter of the radial margin; reinsertions stay rare while
            // tree volumes remain tight.
            update_margin: na::convert(0.0125),
        }
    }
}
