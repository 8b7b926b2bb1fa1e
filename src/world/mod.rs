//! The world: object registry, broadphase, and pair dispatch.

pub use self::collidable_world::CollidableWorld;

mod collidable_world;
