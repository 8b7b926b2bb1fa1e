//! Type aliases for the 3-dimensional vocabulary used throughout the crate.

use na::{Isometry3, Point3, Translation3, Vector3, U3};

/// The dimension of the ambient space.
pub const DIM: usize = 3;

/// The dimension of the ambient space, as a type-level integer.
pub type Dim = U3;

/// The vector type.
pub type Vector<N> = Vector3<N>;

/// The point type.
pub type Point<N> = Point3<N>;

/// The transformation type.
pub type Isometry<N> = Isometry3<N>;

/// The translation type.
pub type Translation<N> = Translation3<N>;
