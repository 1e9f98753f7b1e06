//! Voxelized signed distance field with classification weights.
//!
//! The field moves through a one-way lifecycle:
//! `Unclassified → Classified → Frozen`. Weights may change until the field is
//! frozen; freezing derives the tricubic coefficient table the energy reads,
//! after which the field is shared read-only by any number of evaluations.

pub mod tricubic;
pub mod weights;

pub use tricubic::{CoefficientBlock, CoefficientTable, ZERO_BLOCK};
pub use weights::{ClassificationSummary, WeightLevel};

use crate::errors::{ConfigurationError, StateError};
use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use crate::surface::SurfaceQuery;
use nalgebra::{Point3, Vector3};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Lifecycle state of a [`SignedDistanceField`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldState {
    /// Every weight is still `STANDARD`
    Unclassified,
    /// Weights were assigned and may still change
    Classified,
    /// Weights are immutable and coefficients are available
    Frozen,
}

/// Regular grid of signed distances and weights over an axis-aligned domain.
///
/// Vertex `(i, j, k)` lives at `bounds.mins + (i·hx, j·hy, k·hz)` and is
/// stored at linear index `k + res_z·(j + res_y·i)`.
#[derive(Clone, Debug)]
pub struct SignedDistanceField {
    pub(crate) bounds: Aabb,
    pub(crate) resolution: [usize; 3],
    pub(crate) signed_distances: Vec<Real>,
    pub(crate) weights: Vec<Real>,
    pub(crate) coefficients: CoefficientTable,
    pub(crate) target: Vector3<Real>,
    pub(crate) kernel: Option<Aabb>,
    pub(crate) state: FieldState,
}

/// Reject resolutions below two vertices and domains without interior.
pub(crate) fn validate(resolution: [usize; 3], bounds: &Aabb) -> Result<(), ConfigurationError> {
    for (axis, &value) in resolution.iter().enumerate() {
        if value < 2 {
            return Err(ConfigurationError::InvalidResolution { axis, value });
        }
    }
    let finite = bounds.mins.iter().chain(bounds.maxs.iter()).all(|c| c.is_finite());
    let extents = bounds.maxs - bounds.mins;
    if !finite || extents.iter().any(|&e| e <= 0.0) {
        return Err(ConfigurationError::DegenerateBounds {
            mins: bounds.mins.coords.into(),
            maxs: bounds.maxs.coords.into(),
        });
    }
    Ok(())
}

impl SignedDistanceField {
    /// A field with zero distances and `STANDARD` weights everywhere.
    pub fn new(resolution: [usize; 3], bounds: Aabb) -> Result<Self, ConfigurationError> {
        validate(resolution, &bounds)?;
        let n = resolution[0] * resolution[1] * resolution[2];
        Ok(Self {
            bounds,
            resolution,
            signed_distances: vec![0.0; n],
            weights: vec![WeightLevel::Standard.value(); n],
            coefficients: CoefficientTable::default(),
            target: Vector3::z(),
            kernel: None,
            state: FieldState::Unclassified,
        })
    }

    /// A field over explicit, row-major sample arrays.
    pub fn from_samples(
        resolution: [usize; 3],
        bounds: Aabb,
        signed_distances: Vec<Real>,
        weights: Vec<Real>,
    ) -> Result<Self, ConfigurationError> {
        let mut field = Self::new(resolution, bounds)?;
        let expected = field.vertex_count();
        if signed_distances.len() != expected {
            return Err(ConfigurationError::SampleCount {
                what: "signed distances",
                expected,
                found: signed_distances.len(),
            });
        }
        if weights.len() != expected {
            return Err(ConfigurationError::SampleCount {
                what: "weights",
                expected,
                found: weights.len(),
            });
        }
        let standard = WeightLevel::Standard.value();
        if weights.iter().any(|&w| w != standard) {
            field.state = FieldState::Classified;
        }
        field.signed_distances = signed_distances;
        field.weights = weights;
        Ok(field)
    }

    /// Sample `surface` at every grid vertex.
    pub fn build<Q: SurfaceQuery>(
        resolution: [usize; 3],
        bounds: Aabb,
        surface: &Q,
    ) -> Result<Self, ConfigurationError> {
        let mut field = Self::new(resolution, bounds)?;
        let points: Vec<Point3<Real>> = (0..field.vertex_count())
            .map(|index| field.grid_point_of_index(index))
            .collect();

        #[cfg(feature = "parallel")]
        let distances: Vec<Real> = points.par_iter().map(|p| surface.signed_distance(p)).collect();
        #[cfg(not(feature = "parallel"))]
        let distances: Vec<Real> = points.iter().map(|p| surface.signed_distance(p)).collect();

        field.signed_distances = distances;
        log::debug!(
            "sampled signed distance field {:?} over [{}, {}]",
            resolution,
            bounds.mins,
            bounds.maxs
        );
        Ok(field)
    }

    pub const fn resolution(&self) -> [usize; 3] {
        self.resolution
    }

    pub const fn res_x(&self) -> usize {
        self.resolution[0]
    }

    pub const fn res_y(&self) -> usize {
        self.resolution[1]
    }

    pub const fn res_z(&self) -> usize {
        self.resolution[2]
    }

    pub const fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub const fn state(&self) -> FieldState {
        self.state
    }

    pub fn is_frozen(&self) -> bool {
        self.state == FieldState::Frozen
    }

    pub const fn target(&self) -> &Vector3<Real> {
        &self.target
    }

    /// Set the alignment direction. Zero vectors are ignored.
    pub fn set_target(&mut self, target: Vector3<Real>) {
        if let Some(unit) = target.try_normalize(Real::EPSILON) {
            self.target = unit;
        }
    }

    /// Kernel sub-volume committed by [`classify_and_freeze`](Self::classify_and_freeze).
    pub const fn kernel(&self) -> Option<&Aabb> {
        self.kernel.as_ref()
    }

    pub const fn coefficients(&self) -> &CoefficientTable {
        &self.coefficients
    }

    pub fn signed_distances(&self) -> &[Real] {
        &self.signed_distances
    }

    pub fn weights(&self) -> &[Real] {
        &self.weights
    }

    pub const fn vertex_count(&self) -> usize {
        self.resolution[0] * self.resolution[1] * self.resolution[2]
    }

    /// Number of cells per axis.
    pub const fn cells(&self) -> [usize; 3] {
        [
            self.resolution[0] - 1,
            self.resolution[1] - 1,
            self.resolution[2] - 1,
        ]
    }

    pub const fn cell_count(&self) -> usize {
        let [cx, cy, cz] = self.cells();
        cx * cy * cz
    }

    /// Grid spacing along each axis.
    pub fn spacing(&self) -> Vector3<Real> {
        let extents = self.bounds.maxs - self.bounds.mins;
        Vector3::new(
            extents.x / (self.resolution[0] - 1) as Real,
            extents.y / (self.resolution[1] - 1) as Real,
            extents.z / (self.resolution[2] - 1) as Real,
        )
    }

    /// Length of one voxel edge, the smallest spacing.
    pub fn unit(&self) -> Real {
        self.spacing().min()
    }

    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        debug_assert!(i < self.resolution[0] && j < self.resolution[1] && k < self.resolution[2]);
        k + self.resolution[2] * (j + self.resolution[1] * i)
    }

    #[inline]
    pub(crate) const fn vertex_of_index(&self, index: usize) -> [usize; 3] {
        let k = index % self.resolution[2];
        let ij = index / self.resolution[2];
        [ij / self.resolution[1], ij % self.resolution[1], k]
    }

    #[inline]
    pub fn cell_index(&self, i: usize, j: usize, k: usize) -> usize {
        let [_, cy, cz] = self.cells();
        debug_assert!(i < self.cells()[0] && j < cy && k < cz);
        k + cz * (j + cy * i)
    }

    #[inline]
    pub(crate) const fn cell_of_index(&self, index: usize) -> [usize; 3] {
        let [_, cy, cz] = self.cells();
        let k = index % cz;
        let ij = index / cz;
        [ij / cy, ij % cy, k]
    }

    pub fn grid_point(&self, i: usize, j: usize, k: usize) -> Point3<Real> {
        let h = self.spacing();
        Point3::new(
            self.bounds.mins.x + i as Real * h.x,
            self.bounds.mins.y + j as Real * h.y,
            self.bounds.mins.z + k as Real * h.z,
        )
    }

    fn grid_point_of_index(&self, index: usize) -> Point3<Real> {
        let [i, j, k] = self.vertex_of_index(index);
        self.grid_point(i, j, k)
    }

    pub fn signed_distance_at(&self, i: usize, j: usize, k: usize) -> Real {
        self.signed_distances[self.index(i, j, k)]
    }

    pub fn weight_at(&self, i: usize, j: usize, k: usize) -> Real {
        self.weights[self.index(i, j, k)]
    }

    /// Smallest and largest weight in the grid.
    pub fn weight_range(&self) -> (Real, Real) {
        self.weights
            .iter()
            .fold((Real::INFINITY, Real::NEG_INFINITY), |(lo, hi), &w| (lo.min(w), hi.max(w)))
    }

    /// Continuous grid coordinate of `p` along `axis`, in cell units.
    #[inline]
    pub(crate) fn grid_coordinate(&self, axis: usize, value: Real) -> Real {
        let lo = self.bounds.mins[axis];
        let hi = self.bounds.maxs[axis];
        (value - lo) / (hi - lo) * (self.resolution[axis] - 1) as Real
    }

    /// Whether `p` lies strictly inside the bounding volume.
    pub fn is_strictly_inside(&self, p: &Point3<Real>) -> bool {
        (0..3).all(|axis| p[axis] > self.bounds.mins[axis] && p[axis] < self.bounds.maxs[axis])
    }

    /// Cell containing `p` and the local coordinates of `p` inside it, or
    /// `None` when `p` is not strictly inside the domain.
    pub fn locate(&self, p: &Point3<Real>) -> Option<([usize; 3], Vector3<Real>)> {
        if !self.is_strictly_inside(p) {
            return None;
        }
        let cells = self.cells();
        let mut cell = [0usize; 3];
        let mut local = Vector3::zeros();
        for axis in 0..3 {
            let s = self.grid_coordinate(axis, p[axis]);
            let c = (s.floor() as usize).min(cells[axis] - 1);
            cell[axis] = c;
            local[axis] = s - c as Real;
        }
        Some((cell, local))
    }

    /// The grid vertex closest to `p`, clamped to the domain.
    pub fn nearest_grid_point(&self, p: &Point3<Real>) -> Point3<Real> {
        let mut ijk = [0usize; 3];
        for (axis, slot) in ijk.iter_mut().enumerate() {
            let s = self.grid_coordinate(axis, p[axis]).round();
            *slot = s.clamp(0.0, (self.resolution[axis] - 1) as Real) as usize;
        }
        self.grid_point(ijk[0], ijk[1], ijk[2])
    }

    /// Trilinear interpolation of the sampled signed distances, with `p`
    /// clamped to the domain.
    pub fn signed_distance(&self, p: &Point3<Real>) -> Real {
        let mut base = [0usize; 3];
        let mut t = [0.0; 3];
        for axis in 0..3 {
            let last = (self.resolution[axis] - 1) as Real;
            let s = self.grid_coordinate(axis, p[axis]).clamp(0.0, last);
            let c = (s.floor() as usize).min(self.resolution[axis] - 2);
            base[axis] = c;
            t[axis] = s - c as Real;
        }
        let mut value = 0.0;
        for corner in 0..8usize {
            let (dx, dy, dz) = (corner & 1, (corner >> 1) & 1, (corner >> 2) & 1);
            let wx = if dx == 1 { t[0] } else { 1.0 - t[0] };
            let wy = if dy == 1 { t[1] } else { 1.0 - t[1] };
            let wz = if dz == 1 { t[2] } else { 1.0 - t[2] };
            value += wx * wy * wz * self.signed_distance_at(base[0] + dx, base[1] + dy, base[2] + dz);
        }
        value
    }

    /// Tag a single vertex. Fails once the field is frozen.
    pub fn set_weight(
        &mut self,
        i: usize,
        j: usize,
        k: usize,
        level: WeightLevel,
    ) -> Result<(), StateError> {
        self.ensure_mutable()?;
        let index = self.index(i, j, k);
        self.weights[index] = level.value();
        self.state = FieldState::Classified;
        Ok(())
    }

    /// Commit the current weights and derive the coefficient table.
    pub fn freeze(&mut self) -> Result<(), StateError> {
        self.ensure_mutable()?;
        self.coefficients = CoefficientTable::build(self);
        self.state = FieldState::Frozen;
        log::debug!(
            "froze field {:?}: {} of {} cells carry coefficients",
            self.resolution,
            self.coefficients.len(),
            self.cell_count()
        );
        Ok(())
    }

    pub(crate) fn ensure_mutable(&self) -> Result<(), StateError> {
        if self.is_frozen() { Err(StateError::Frozen) } else { Ok(()) }
    }

    /// Coefficients of the cell containing `point`; the all-zero sentinel when
    /// `point` lies outside the domain or the cell carries no entry.
    pub fn query_coefficients(&self, point: &Point3<Real>) -> &CoefficientBlock {
        match self.locate(point) {
            Some(([i, j, k], _)) => self
                .coefficients
                .block(self.cell_index(i, j, k))
                .unwrap_or(&ZERO_BLOCK),
            None => &ZERO_BLOCK,
        }
    }

    /// Integral of the interpolated weight over the whole cell containing
    /// `point`, zero outside the domain.
    pub fn full_box_value(&self, point: &Point3<Real>) -> Real {
        match self.locate(point) {
            Some(([i, j, k], _)) => {
                let h = self.spacing();
                self.coefficients.full_box_value(self.cell_index(i, j, k)) * h.x * h.y * h.z
            },
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(res: usize, size: Real) -> SignedDistanceField {
        let bounds = Aabb::new(Point3::origin(), Point3::new(size, size, size));
        SignedDistanceField::new([res, res, res], bounds).unwrap()
    }

    #[test]
    fn rejects_small_resolution_and_flat_bounds() {
        let bounds = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        assert_eq!(
            SignedDistanceField::new([4, 1, 4], bounds).unwrap_err(),
            ConfigurationError::InvalidResolution { axis: 1, value: 1 }
        );
        let flat = Aabb::new(Point3::origin(), Point3::new(1.0, 0.0, 1.0));
        assert!(matches!(
            SignedDistanceField::new([4, 4, 4], flat),
            Err(ConfigurationError::DegenerateBounds { .. })
        ));
    }

    #[test]
    fn sample_arrays_must_match_grid() {
        let bounds = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let err = SignedDistanceField::from_samples([2, 2, 2], bounds, vec![0.0; 8], vec![0.0; 7])
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::SampleCount { what: "weights", expected: 8, found: 7 }
        );
    }

    #[test]
    fn indices_are_row_major_in_ijk() {
        let field = SignedDistanceField::new(
            [3, 4, 5],
            Aabb::new(Point3::origin(), Point3::new(2.0, 3.0, 4.0)),
        )
        .unwrap();
        assert_eq!(field.index(0, 0, 1), 1);
        assert_eq!(field.index(0, 1, 0), 5);
        assert_eq!(field.index(1, 0, 0), 20);
        assert_eq!(field.vertex_of_index(field.index(2, 3, 4)), [2, 3, 4]);
        assert_eq!(field.cell_of_index(field.cell_index(1, 2, 3)), [1, 2, 3]);
        assert_eq!(field.grid_point(2, 3, 4), Point3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn build_samples_the_surface() {
        let bounds = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let field = SignedDistanceField::build([3, 3, 3], bounds, &|p: &Point3<Real>| p.x).unwrap();
        assert_eq!(field.signed_distance_at(0, 1, 1), -1.0);
        assert_eq!(field.signed_distance_at(2, 0, 0), 1.0);
        assert!((field.signed_distance(&Point3::new(0.25, 0.3, -0.7)) - 0.25).abs() < 1e-12);
        assert_eq!(field.state(), FieldState::Unclassified);
    }

    #[test]
    fn freeze_is_one_way() {
        let mut field = cube(3, 2.0);
        field.set_weight(1, 1, 1, WeightLevel::GuaranteedInterior).unwrap();
        assert_eq!(field.state(), FieldState::Classified);
        field.freeze().unwrap();
        assert!(field.is_frozen());
        assert_eq!(field.freeze(), Err(StateError::Frozen));
        assert_eq!(
            field.set_weight(0, 0, 0, WeightLevel::Border),
            Err(StateError::Frozen)
        );
    }

    #[test]
    fn out_of_domain_queries_answer_the_sentinel() {
        let mut field = cube(3, 2.0);
        field.set_weight(1, 1, 1, WeightLevel::GuaranteedExterior).unwrap();
        field.freeze().unwrap();

        let inside = field.query_coefficients(&Point3::new(0.5, 0.5, 0.5));
        assert!(inside.iter().any(|&c| c != 0.0));
        for p in [
            Point3::new(-0.1, 0.5, 0.5),
            Point3::new(0.0, 0.5, 0.5),
            Point3::new(0.5, 2.0, 0.5),
            Point3::new(0.5, 0.5, Real::NAN),
        ] {
            assert!(std::ptr::eq(field.query_coefficients(&p), &ZERO_BLOCK));
            assert_eq!(field.full_box_value(&p), 0.0);
        }
    }

    #[test]
    fn nearest_grid_point_is_clamped() {
        let field = cube(5, 4.0);
        assert_eq!(field.nearest_grid_point(&Point3::new(1.4, 2.6, -3.0)), Point3::new(1.0, 3.0, 0.0));
        assert_eq!(field.nearest_grid_point(&Point3::new(9.0, 0.0, 0.0)), Point3::new(4.0, 0.0, 0.0));
    }
}
