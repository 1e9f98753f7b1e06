//! Surface queries consumed by field sampling and weight classification.
//!
//! The surface itself is owned elsewhere; the field only ever asks for the
//! signed distance of a point, negative inside the solid.

use crate::float_types::Real;
use nalgebra::Point3;

/// Signed distance to the surface of a solid.
pub trait SurfaceQuery: Sync {
    fn signed_distance(&self, point: &Point3<Real>) -> Real;
}

impl<F> SurfaceQuery for F
where
    F: Fn(&Point3<Real>) -> Real + Sync,
{
    #[inline]
    fn signed_distance(&self, point: &Point3<Real>) -> Real {
        self(point)
    }
}

#[cfg(feature = "mesh-query")]
pub use trimesh::TriMeshSurface;

#[cfg(feature = "mesh-query")]
mod trimesh {
    use super::SurfaceQuery;
    use crate::float_types::{
        Real,
        parry3d::{
            bounding_volume::Aabb,
            query::PointQuery,
            shape::{Shape, TriMesh, TriMeshBuilderError, TriMeshFlags},
        },
    };
    use nalgebra::Point3;

    /// A closed, consistently oriented triangle mesh answering signed
    /// distance queries through parry's point projection.
    ///
    /// Inside/outside is decided with the mesh pseudo-normals, so the mesh
    /// must be watertight with outward facing triangles.
    #[derive(Clone)]
    pub struct TriMeshSurface {
        mesh: TriMesh,
    }

    impl TriMeshSurface {
        pub fn new(
            vertices: Vec<Point3<Real>>,
            indices: Vec<[u32; 3]>,
        ) -> Result<Self, TriMeshBuilderError> {
            let mesh = TriMesh::with_flags(vertices, indices, TriMeshFlags::ORIENTED)?;
            Ok(Self { mesh })
        }

        /// Bounding volume of the mesh, a natural domain for a field.
        pub fn bounds(&self) -> Aabb {
            self.mesh.compute_local_aabb()
        }

        pub const fn mesh(&self) -> &TriMesh {
            &self.mesh
        }
    }

    impl SurfaceQuery for TriMeshSurface {
        fn signed_distance(&self, point: &Point3<Real>) -> Real {
            let projection = self.mesh.project_local_point(point, false);
            let distance = (projection.point - point).norm();
            if projection.is_inside { -distance } else { distance }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_surface_queries() {
        let sphere = |p: &Point3<Real>| p.coords.norm() - 1.0;
        assert_eq!(sphere.signed_distance(&Point3::new(2.0, 0.0, 0.0)), 1.0);
        assert_eq!(sphere.signed_distance(&Point3::origin()), -1.0);
    }

    #[cfg(feature = "mesh-query")]
    #[test]
    fn trimesh_cube_distances_are_signed() {
        // unit cube [0,1]^3 with outward triangles
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ];
        let indices = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [2, 3, 7],
            [2, 7, 6],
            [1, 2, 6],
            [1, 6, 5],
            [0, 4, 7],
            [0, 7, 3],
        ];
        let surface = TriMeshSurface::new(vertices, indices).expect("valid cube mesh");

        let outside = surface.signed_distance(&Point3::new(0.5, 0.5, 2.0));
        assert!((outside - 1.0).abs() < 1e-9);
        let inside = surface.signed_distance(&Point3::new(0.5, 0.5, 0.75));
        assert!((inside + 0.25).abs() < 1e-9);

        let bounds = surface.bounds();
        assert_eq!(bounds.mins, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(bounds.maxs, Point3::new(1.0, 1.0, 1.0));
    }
}
