//! Triangle mesh of a box, used for display and fabrication export.

use crate::float_types::{FLIP_ANGLE, Real, tolerance};
use crate::triangulated::Triangulated3D;
use hashbrown::HashMap;
use nalgebra::{Matrix3, Point3, Vector3};

/// Indexed triangle mesh with outward facing triangles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoxMesh {
    pub vertices: Vec<Point3<Real>>,
    pub faces: Vec<[u32; 3]>,
}

/// The 12 outward triangles over the 8 corners returned by
/// [`FitBox::rotated_corners`](super::FitBox::rotated_corners).
pub(crate) const CORNER_FACES: [[u32; 3]; 12] = [
    [0, 1, 2],
    [0, 2, 3],
    [2, 1, 5],
    [2, 5, 6],
    [5, 1, 0],
    [5, 0, 4],
    [6, 5, 4],
    [6, 4, 7],
    [7, 4, 0],
    [7, 0, 3],
    [7, 3, 2],
    [7, 2, 6],
];

impl BoxMesh {
    pub fn new(vertices: Vec<Point3<Real>>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn triangle(&self, face: usize) -> [Point3<Real>; 3] {
        self.faces[face].map(|v| self.vertices[v as usize])
    }

    /// Unit normal of `face`, `None` for degenerate triangles.
    pub fn face_normal(&self, face: usize) -> Option<Vector3<Real>> {
        let [a, b, c] = self.triangle(face);
        (b - a).cross(&(c - a)).try_normalize(Real::EPSILON)
    }

    /// Apply `rotation` to every vertex.
    pub fn rotate(&mut self, rotation: &Matrix3<Real>) {
        for v in &mut self.vertices {
            *v = Point3::from(rotation * v.coords);
        }
    }

    /// Faces turned away from `target`: `normal·target` below
    /// [`FLIP_ANGLE`] but not pointing straight against it.
    pub fn flipped_faces(&self, target: &Vector3<Real>) -> Vec<usize> {
        let eps = tolerance();
        let Some(target) = target.try_normalize(Real::EPSILON) else {
            return Vec::new();
        };
        (0..self.faces.len())
            .filter(|&face| {
                self.face_normal(face).is_some_and(|n| {
                    let dot = n.dot(&target);
                    dot < FLIP_ANGLE - eps && dot > -1.0 + eps
                })
            })
            .collect()
    }

    /// Every face refers to an existing vertex.
    pub fn is_valid(&self) -> bool {
        let n = self.vertices.len();
        self.faces.iter().flatten().all(|&v| (v as usize) < n)
    }
}

impl Triangulated3D for BoxMesh {
    fn visit_triangles<F>(&self, mut f: F)
    where
        F: FnMut([Point3<Real>; 3], Vector3<Real>),
    {
        for face in 0..self.faces.len() {
            let normal = self.face_normal(face).unwrap_or_else(Vector3::zeros);
            f(self.triangle(face), normal);
        }
    }
}

/// Surface grid of a subdivided box, merging vertices shared by faces.
struct SurfaceGrid {
    mins: Point3<Real>,
    maxs: Point3<Real>,
    step: Vector3<Real>,
    segments: [usize; 3],
    index: HashMap<[usize; 3], u32>,
    vertices: Vec<Point3<Real>>,
}

impl SurfaceGrid {
    fn vertex(&mut self, g: [usize; 3]) -> u32 {
        if let Some(&v) = self.index.get(&g) {
            return v;
        }
        let mut p = self.maxs;
        for axis in 0..3 {
            if g[axis] < self.segments[axis] {
                p[axis] = self.mins[axis] + g[axis] as Real * self.step[axis];
            }
        }
        let v = self.vertices.len() as u32;
        self.vertices.push(p);
        self.index.insert(g, v);
        v
    }
}

/// Box surface with every face split into a grid of edges no longer than
/// `minimum_edge`, `floor(length / minimum_edge) + 1` segments per axis.
pub(crate) fn subdivided(mins: Point3<Real>, maxs: Point3<Real>, minimum_edge: Real) -> BoxMesh {
    let extents = maxs - mins;
    let segments = [0, 1, 2].map(|axis| (extents[axis] / minimum_edge).floor() as usize + 1);
    let step = Vector3::new(
        extents.x / segments[0] as Real,
        extents.y / segments[1] as Real,
        extents.z / segments[2] as Real,
    );
    let mut grid = SurfaceGrid {
        mins,
        maxs,
        step,
        segments,
        index: HashMap::new(),
        vertices: Vec::new(),
    };

    let mut faces = Vec::new();
    for axis in 0..3 {
        let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
        for side in [0, segments[axis]] {
            for iu in 0..segments[u] {
                for iv in 0..segments[v] {
                    let at = |du: usize, dv: usize| {
                        let mut g = [0; 3];
                        g[axis] = side;
                        g[u] = iu + du;
                        g[v] = iv + dv;
                        g
                    };
                    let p1 = grid.vertex(at(0, 0));
                    let p2 = grid.vertex(at(1, 0));
                    let p3 = grid.vertex(at(1, 1));
                    let p4 = grid.vertex(at(0, 1));
                    if side == 0 {
                        faces.push([p1, p3, p2]);
                        faces.push([p1, p4, p3]);
                    } else {
                        faces.push([p1, p2, p3]);
                        faces.push([p1, p3, p4]);
                    }
                }
            }
        }
    }

    BoxMesh::new(grid.vertices, faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_volume(mesh: &BoxMesh) -> Real {
        let mut volume = 0.0;
        mesh.visit_triangles(|[a, b, c], _| {
            volume += a.coords.dot(&b.coords.cross(&c.coords)) / 6.0;
        });
        volume
    }

    #[test]
    fn subdivided_box_is_closed_and_outward() {
        let mesh = subdivided(Point3::new(1.0, 0.0, 0.0), Point3::new(3.0, 1.0, 1.0), 0.6);
        assert_eq!(mesh.vertex_count(), 42);
        assert_eq!(mesh.face_count(), 80);
        assert!(mesh.is_valid());
        assert!((closed_volume(&mesh) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn flipped_faces_skip_opposite_normals() {
        let mesh = subdivided(Point3::origin(), Point3::new(1.0, 1.0, 1.0), 2.0);
        let target = Vector3::z();
        // only the -z face points straight away, the sides are at 90°
        assert!(mesh.flipped_faces(&target).is_empty());

        let tilted = Vector3::new(0.0, 1.0, 1.0);
        let flipped = mesh.flipped_faces(&tilted);
        assert_eq!(flipped.len(), 4);
        for face in flipped {
            let n = mesh.face_normal(face).unwrap();
            assert!(n.y < 0.0 || n.z < 0.0);
        }
    }

    #[test]
    fn rotation_moves_vertices() {
        let mut mesh = subdivided(Point3::origin(), Point3::new(1.0, 1.0, 1.0), 5.0);
        let quarter = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        mesh.rotate(&quarter);
        assert!(mesh.vertices.iter().all(|p| p.x <= 1e-12));
        assert!((closed_volume(&mesh) - 1.0).abs() < 1e-12);
    }
}
