/*!
corde3d
=======

**corde3d** couples a deformable, rope-like chain of mass points (a *rod
model*) to a rigid-body collision pipeline. The rod model owns the chain and
its internal constraints; this crate is responsible for advancing the rod's
kinematic state in two phases per simulation step (a speculative prediction
phase and a final integration phase) and for keeping a dynamic
bounding-volume tree synchronized with the rod's current and predicted extent
so that broadphase queries against rigid bodies remain correct.

The main types are:

* [`object::CollisionRope`]: the bridge between a rod model and the
  collision pipeline. It owns one bounding-volume leaf per mass point and a
  per-body dynamic tree over those leaves.
* [`object::Corde`]: a default rod model, a chain of mass points with
  stretch and bend constraints.
* [`world::CollidableWorld`]: the shared broadphase and collision dispatcher
  all bodies of a simulation register with.
*/

#![deny(non_camel_case_types)]
#![deny(unused_parens)]
#![warn(missing_docs)]

pub mod counters;
mod error;
pub mod math;
pub mod object;
pub mod solver;
pub mod world;

pub use crate::error::CordeError;
