//! A trait for any shape which can be represented by triangles
use crate::float_types::Real;
use nalgebra::{Point3, Vector3};

/// A triangulated 3D surface.
///
/// Anything that can present itself as a bunch of triangles in 3D
/// can automatically use the triangle-based IO backends.
pub trait Triangulated3D {
    /// Call `f` for each triangle.
    ///
    /// The triangle is `[v0, v1, v2]` followed by its unit facet normal.
    fn visit_triangles<F>(&self, f: F)
    where
        F: FnMut([Point3<Real>; 3], Vector3<Real>);
}
