//! Objects taking part in the collision pipeline: the rod model, its
//! collision bridge, and fixed rigid partners.

pub use self::collidable::{Collidable, CollidableHandle, CollidableKind};
pub use self::collision_rope::CollisionRope;
pub use self::corde::Corde;
pub use self::ground::Ground;
pub use self::rod::{RodConfig, RodModel};

mod collidable;
mod collision_rope;
mod corde;
mod ground;
mod rod;
