//! Axis-aligned candidate boxes moved by the optimizer.

pub mod mesh;

pub use mesh::BoxMesh;

use crate::field::SignedDistanceField;
use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use nalgebra::{Matrix3, Point3, Vector3};

/// RGBA display color of a box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub const fn from_array([r, g, b, a]: [u8; 4]) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::rgb(128, 128, 128)
    }
}

/// An axis-aligned box with its display attributes.
///
/// The corners always satisfy `mins ≤ maxs` component-wise: every
/// constructor and setter reorders them per axis. The rotation, the anchors
/// and the cached mesh only matter for display and never enter the energy.
#[derive(Clone, Debug, PartialEq)]
pub struct FitBox {
    bounds: Aabb,
    anchors: [Point3<Real>; 3],
    color: Color,
    target: Vector3<Real>,
    rotation: Matrix3<Real>,
    piece: Option<BoxMesh>,
    visible: bool,
}

#[inline]
fn ordered(a: &Point3<Real>, b: &Point3<Real>) -> Aabb {
    Aabb::new(a.inf(b), a.sup(b))
}

impl FitBox {
    /// A box spanned by two opposite corners given in any order.
    pub fn new(a: Point3<Real>, b: Point3<Real>) -> Self {
        Self {
            bounds: ordered(&a, &b),
            anchors: [Point3::origin(); 3],
            color: Color::default(),
            target: Vector3::z(),
            rotation: Matrix3::identity(),
            piece: None,
            visible: true,
        }
    }

    pub fn from_aabb(aabb: Aabb) -> Self {
        Self::new(aabb.mins, aabb.maxs)
    }

    /// The box covering the whole domain of `field`.
    pub fn full_domain(field: &SignedDistanceField) -> Self {
        Self::from_aabb(*field.bounds()).with_target(*field.target())
    }

    /// A cube of half size `half_extent` around `center`.
    pub fn seed(center: Point3<Real>, half_extent: Real) -> Self {
        let half = Vector3::repeat(half_extent.abs());
        Self::new(center - half, center + half)
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_target(mut self, target: Vector3<Real>) -> Self {
        self.target = target;
        self
    }

    pub fn with_anchors(mut self, anchors: [Point3<Real>; 3]) -> Self {
        self.anchors = anchors;
        self
    }

    pub const fn aabb(&self) -> &Aabb {
        &self.bounds
    }

    pub const fn mins(&self) -> Point3<Real> {
        self.bounds.mins
    }

    pub const fn maxs(&self) -> Point3<Real> {
        self.bounds.maxs
    }

    /// Move both corners, reordering them per axis.
    pub fn set_corners(&mut self, a: Point3<Real>, b: Point3<Real>) {
        self.bounds = ordered(&a, &b);
    }

    /// `[min_x, min_y, min_z, max_x, max_y, max_z]`
    pub fn params(&self) -> [Real; 6] {
        let (lo, hi) = (self.bounds.mins, self.bounds.maxs);
        [lo.x, lo.y, lo.z, hi.x, hi.y, hi.z]
    }

    pub fn set_params(&mut self, params: [Real; 6]) {
        self.set_corners(
            Point3::new(params[0], params[1], params[2]),
            Point3::new(params[3], params[4], params[5]),
        );
    }

    pub fn extents(&self) -> Vector3<Real> {
        self.bounds.maxs - self.bounds.mins
    }

    pub fn width(&self) -> Real {
        self.extents().x
    }

    pub fn height(&self) -> Real {
        self.extents().y
    }

    pub fn depth(&self) -> Real {
        self.extents().z
    }

    fn set_length(&mut self, axis: usize, length: Real) {
        self.bounds.maxs[axis] = self.bounds.mins[axis] + length.abs();
    }

    /// Resize along x keeping the min corner.
    pub fn set_width(&mut self, width: Real) {
        self.set_length(0, width);
    }

    pub fn set_height(&mut self, height: Real) {
        self.set_length(1, height);
    }

    pub fn set_depth(&mut self, depth: Real) {
        self.set_length(2, depth);
    }

    pub fn volume(&self) -> Real {
        self.extents().product()
    }

    pub fn center(&self) -> Point3<Real> {
        self.bounds.center()
    }

    /// Whether `other` lies inside this box (boundaries included).
    pub fn contains(&self, other: &Aabb) -> bool {
        (0..3).all(|a| self.bounds.mins[a] <= other.mins[a] && other.maxs[a] <= self.bounds.maxs[a])
    }

    pub fn contains_point(&self, p: &Point3<Real>) -> bool {
        (0..3).all(|a| self.bounds.mins[a] <= p[a] && p[a] <= self.bounds.maxs[a])
    }

    pub const fn anchors(&self) -> &[Point3<Real>; 3] {
        &self.anchors
    }

    pub fn set_anchors(&mut self, anchors: [Point3<Real>; 3]) {
        self.anchors = anchors;
    }

    pub const fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub const fn target(&self) -> &Vector3<Real> {
        &self.target
    }

    pub fn set_target(&mut self, target: Vector3<Real>) {
        self.target = target;
    }

    pub const fn rotation(&self) -> &Matrix3<Real> {
        &self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Matrix3<Real>) {
        self.rotation = rotation;
    }

    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// `rotation · target`, normalized; zero for a zero target.
    pub fn rotated_target(&self) -> Vector3<Real> {
        (self.rotation * self.target)
            .try_normalize(Real::EPSILON)
            .unwrap_or_else(Vector3::zeros)
    }

    /// The 8 corners with the display rotation applied.
    ///
    /// Order: the bottom (`min_y`) ring `min, (X,y,z), (X,y,Z), (x,y,Z)`, then
    /// the top ring `(x,Y,z), (X,Y,z), max, (x,Y,Z)`.
    pub fn rotated_corners(&self) -> [Point3<Real>; 8] {
        let (lo, hi) = (self.bounds.mins, self.bounds.maxs);
        [
            Point3::new(lo.x, lo.y, lo.z),
            Point3::new(hi.x, lo.y, lo.z),
            Point3::new(hi.x, lo.y, hi.z),
            Point3::new(lo.x, lo.y, hi.z),
            Point3::new(lo.x, hi.y, lo.z),
            Point3::new(hi.x, hi.y, lo.z),
            Point3::new(hi.x, hi.y, hi.z),
            Point3::new(lo.x, hi.y, hi.z),
        ]
        .map(|p| Point3::from(self.rotation * p.coords))
    }

    /// Triangle mesh of the box surface.
    ///
    /// With `minimum_edge ≤ 0` the mesh is the 8 corners and 12 triangles,
    /// otherwise every face is subdivided so that no edge is longer than
    /// `minimum_edge`. The display rotation is applied.
    pub fn calculate_mesh(&self, minimum_edge: Real) -> BoxMesh {
        if minimum_edge <= 0.0 {
            return BoxMesh::new(self.rotated_corners().to_vec(), mesh::CORNER_FACES.to_vec());
        }
        let mut mesh = mesh::subdivided(self.bounds.mins, self.bounds.maxs, minimum_edge);
        mesh.rotate(&self.rotation);
        mesh
    }

    /// Compute and cache the display mesh.
    pub fn generate_piece(&mut self, minimum_edge: Real) {
        self.piece = Some(self.calculate_mesh(minimum_edge));
    }

    pub const fn piece(&self) -> Option<&BoxMesh> {
        self.piece.as_ref()
    }

    pub fn set_piece(&mut self, piece: Option<BoxMesh>) {
        self.piece = piece;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_are_reordered() {
        let mut fit = FitBox::new(Point3::new(2.0, 0.0, 5.0), Point3::new(1.0, 3.0, 4.0));
        assert_eq!(fit.mins(), Point3::new(1.0, 0.0, 4.0));
        assert_eq!(fit.maxs(), Point3::new(2.0, 3.0, 5.0));

        fit.set_params([0.0, 0.0, 0.0, -1.0, 2.0, -3.0]);
        assert_eq!(fit.mins(), Point3::new(-1.0, 0.0, -3.0));
        assert_eq!(fit.maxs(), Point3::new(0.0, 2.0, 0.0));
        assert_eq!(fit.volume(), 6.0);
    }

    #[test]
    fn dimension_setters_keep_the_min_corner() {
        let mut fit = FitBox::seed(Point3::new(1.0, 1.0, 1.0), 1.0);
        fit.set_width(4.0);
        fit.set_height(-0.5);
        fit.set_depth(1.0);
        assert_eq!(fit.mins(), Point3::origin());
        assert_eq!(fit.extents(), Vector3::new(4.0, 0.5, 1.0));
    }

    #[test]
    fn containment_includes_boundaries() {
        let fit = FitBox::new(Point3::origin(), Point3::new(2.0, 2.0, 2.0));
        assert!(fit.contains(&Aabb::new(Point3::origin(), Point3::new(1.0, 2.0, 1.0))));
        assert!(!fit.contains(&Aabb::new(Point3::new(-0.1, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0))));
        assert!(fit.contains_point(&Point3::new(2.0, 0.0, 1.0)));
    }

    #[test]
    fn corner_mesh_is_outward() {
        let fit = FitBox::new(Point3::origin(), Point3::new(1.0, 2.0, 3.0));
        let mesh = fit.calculate_mesh(0.0);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.face_count(), 12);
        let center = fit.center();
        for face in 0..mesh.face_count() {
            let [a, b, c] = mesh.triangle(face);
            let centroid = Point3::from((a.coords + b.coords + c.coords) / 3.0);
            let n = mesh.face_normal(face).unwrap();
            assert!(n.dot(&(centroid - center)) > 0.0);
        }
    }

    #[test]
    fn rotation_only_affects_display() {
        let mut fit = FitBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let quarter = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        fit.set_rotation(quarter);
        fit.set_target(Vector3::new(2.0, 0.0, 0.0));
        assert!((fit.rotated_target() - Vector3::y()).norm() < 1e-12);
        assert_eq!(fit.rotated_corners()[1], Point3::new(0.0, 1.0, 0.0));
        assert_eq!(fit.mins(), Point3::origin());

        assert!(fit.piece().is_none());
        fit.generate_piece(0.5);
        let piece = fit.piece().unwrap();
        assert_eq!(piece.vertex_count(), 56);
        assert!(piece.vertices.iter().all(|p| p.x <= 1e-12));
    }
}
