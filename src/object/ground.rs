use na::RealField;
use ncollide::bounding_volume::AABB;
use ncollide::shape::ShapeHandle;

use crate::math::Isometry;
use crate::object::{Collidable, CollidableKind};

/// A collision object that never moves on its own.
///
/// It carries a shape and a world position and publishes the shape's bound.
/// Its step entry points are the default no-ops.
pub struct Ground<N: RealField> {
    shape: ShapeHandle<N>,
    position: Isometry<N>,
}

impl<N: RealField> Ground<N> {
    /// Creates a fixed collision object with the given shape and position.
    pub fn new(shape: ShapeHandle<N>, position: Isometry<N>) -> Self {
        Ground { shape, position }
    }

    /// The shape of this object.
    pub fn shape(&self) -> &ShapeHandle<N> {
        &self.shape
    }

    /// The world position of this object.
    pub fn position(&self) -> &Isometry<N> {
        &self.position
    }

    /// Teleports this object. The new bound is picked up at the next
    /// broadphase synchronization.
    pub fn set_position(&mut self, position: Isometry<N>) {
        self.position = position;
    }
}

impl<N: RealField> Collidable<N> for Ground<N> {
    fn kind(&self) -> CollidableKind {
        CollidableKind::Ground
    }

    fn aabb(&self) -> AABB<N> {
        self.shape.aabb(&self.position)
    }
}
