#![allow(missing_docs)] // For downcast.

use downcast_rs::{impl_downcast, Downcast};

use na::RealField;
use ncollide::bounding_volume::AABB;

use crate::error::CordeError;

/// The kind tag identifying the concrete variant of a collidable.
///
/// Dispatcher callbacks receive generic collidable references; the kind tag
/// is checked before any attempt to recover the concrete type, so partners
/// originating from other parts of the simulation are handled in O(1)
/// without a speculative cast.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CollidableKind {
    /// A deformable rope-like soft body.
    SoftRope,
    /// A collision object that never moves.
    Ground,
}

/// The handle of a collidable within a world.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollidableHandle(pub usize);

/// Trait implemented by every object registered with the broadphase.
///
/// Immobile objects keep the default no-op step entry points; deformable
/// bodies override them to run their two-phase step protocol.
pub trait Collidable<N: RealField>: Downcast {
    /// The kind tag of this collidable.
    fn kind(&self) -> CollidableKind;

    /// The bound published to the broadphase, covering the whole object.
    fn aabb(&self) -> AABB<N>;

    /// The handles of the collidables this object's broadphase pair tests
    /// must ignore.
    fn collision_disabled(&self) -> &[CollidableHandle] {
        &[]
    }

    /// Collision-response callback, invoked by the dispatcher for every
    /// overlapping pair this object is part of.
    fn handle_collision(&mut self, _partner: &dyn Collidable<N>) {}

    /// Speculatively advance this object's state by `dt` and republish its
    /// bound.
    fn predict_motion(&mut self, _dt: N) -> Result<(), CordeError> {
        Ok(())
    }

    /// Commit this object's final state for the tick.
    fn integrate_motion(&mut self, _dt: N) -> Result<(), CordeError> {
        Ok(())
    }

    /// Settle anchor and contact constraints after integration.
    fn solve_constraints(&mut self) {}
}

impl_downcast!(Collidable<N> where N: RealField);
