//! Energy of a box over a frozen field and its closed-form gradient.
//!
//! The energy of a box `B` is `E(B) = ∫_{B ∩ D} (p(x) + c) dx` where `p` is
//! the tricubic weight interpolant, `D` the field domain and `c` the volume
//! cost. Per axis the clipped box splits into at most a partial head cell, a
//! run of whole cells and a partial tail cell; whole runs come from the
//! summed-volume table and partial cells from the exact polynomial integral.

use crate::field::SignedDistanceField;
use crate::field::tricubic::{FULL_MOMENTS, integrate_block, moments, powers};
use crate::fitbox::FitBox;
use crate::float_types::Real;
use nalgebra::Point3;
use std::ops::Range;

/// Tunables of the energy functional.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnergyConfig {
    /// Cost per unit volume added on top of the weight interpolant.
    pub volume_cost: Real,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self { volume_cost: 1.0 }
    }
}

impl EnergyConfig {
    pub const fn with_volume_cost(mut self, volume_cost: Real) -> Self {
        self.volume_cost = volume_cost;
        self
    }
}

/// Result of comparing the analytic gradient with central differences.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientCheck {
    pub analytic: [Real; 6],
    pub numeric: [Real; 6],
    pub max_error: Real,
    pub passed: bool,
}

/// Piece of a clipped box interval along one axis, in cell units.
#[derive(Clone, Debug, PartialEq)]
enum Segment {
    /// Whole cells `lo..hi`
    Cells(Range<usize>),
    /// Local interval `[t0, t1]` of one cell
    Partial { cell: usize, t0: Real, t1: Real },
}

impl Segment {
    fn cells(&self) -> Range<usize> {
        match self {
            Segment::Cells(range) => range.clone(),
            Segment::Partial { cell, .. } => *cell..*cell + 1,
        }
    }

    fn moments(&self) -> [Real; 4] {
        match self {
            Segment::Cells(_) => FULL_MOMENTS,
            Segment::Partial { t0, t1, .. } => moments(*t0, *t1),
        }
    }
}

/// Split the index-space interval `[s0, s1]` over `n` cells.
fn segments(s0: Real, s1: Real, n: usize) -> Vec<Segment> {
    let s0 = s0.max(0.0);
    let s1 = s1.min(n as Real);
    let c0 = (s0.floor() as usize).min(n - 1);
    let mut c1 = (s1.floor() as usize).min(n - 1);
    if c1 > c0 && s1 == c1 as Real {
        c1 -= 1;
    }
    let t0 = s0 - c0 as Real;
    let t1 = s1 - c1 as Real;

    if c0 == c1 {
        return if t0 <= 0.0 && t1 >= 1.0 {
            vec![Segment::Cells(c0..c0 + 1)]
        } else {
            vec![Segment::Partial { cell: c0, t0, t1 }]
        };
    }

    let mut out = Vec::with_capacity(3);
    let run_lo = if t0 <= 0.0 {
        c0
    } else {
        out.push(Segment::Partial { cell: c0, t0, t1: 1.0 });
        c0 + 1
    };
    let tail_whole = t1 >= 1.0;
    let run_hi = if tail_whole { c1 + 1 } else { c1 };
    if run_lo < run_hi {
        out.push(Segment::Cells(run_lo..run_hi));
    }
    if !tail_whole {
        out.push(Segment::Partial { cell: c1, t0: 0.0, t1 });
    }
    out
}

/// Evaluates the energy functional and its derivatives.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EnergyModel {
    config: EnergyConfig,
}

impl EnergyModel {
    pub const fn new(config: EnergyConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &EnergyConfig {
        &self.config
    }

    pub fn energy(&self, field: &SignedDistanceField, fit: &FitBox) -> Real {
        self.energy_of_corners(field, &fit.mins(), &fit.maxs())
    }

    pub fn gradient(&self, field: &SignedDistanceField, fit: &FitBox) -> [Real; 6] {
        self.gradient_of_corners(field, &fit.mins(), &fit.maxs())
    }

    /// Energy of the box spanned by `mins` and `maxs`. Zero when the box
    /// misses the domain or is empty on some axis.
    pub fn energy_of_corners(
        &self,
        field: &SignedDistanceField,
        mins: &Point3<Real>,
        maxs: &Point3<Real>,
    ) -> Real {
        let Some(axes) = self.clipped_segments(field, mins, maxs, [true; 3]) else {
            return 0.0;
        };
        let h = field.spacing();
        let table = field.coefficients();
        let cost = self.config.volume_cost;

        let mut total = 0.0;
        for sx in &axes[0] {
            for sy in &axes[1] {
                for sz in &axes[2] {
                    total += match (sx, sy, sz) {
                        (Segment::Cells(x), Segment::Cells(y), Segment::Cells(z)) => {
                            let count = (x.len() * y.len() * z.len()) as Real;
                            table.sum_full_cells([x.start, y.start, z.start], [x.end, y.end, z.end])
                                + cost * count
                        },
                        _ => self.integrate_cells(field, [sx, sy, sz]),
                    };
                }
            }
        }
        total * h.x * h.y * h.z
    }

    /// `[∂E/∂min_x, ∂E/∂min_y, ∂E/∂min_z, ∂E/∂max_x, ∂E/∂max_y, ∂E/∂max_z]`.
    ///
    /// Moving a face outward by `δ` adds the face integral of `p + c` times
    /// `δ`, so each component is a (signed) integral over one face of the
    /// clipped box. Faces outside the closed domain contribute zero.
    pub fn gradient_of_corners(
        &self,
        field: &SignedDistanceField,
        mins: &Point3<Real>,
        maxs: &Point3<Real>,
    ) -> [Real; 6] {
        let mut gradient = [0.0; 6];
        let bounds = field.bounds();
        for axis in 0..3 {
            let mut keep = [true; 3];
            keep[axis] = false;
            let Some(axes) = self.clipped_segments(field, mins, maxs, keep) else {
                continue;
            };
            for (slot, coordinate, sign) in [(axis, mins[axis], -1.0), (axis + 3, maxs[axis], 1.0)] {
                if coordinate < bounds.mins[axis] || coordinate > bounds.maxs[axis] {
                    continue;
                }
                gradient[slot] = sign * self.face_integral(field, axis, coordinate, &axes);
            }
        }
        gradient
    }

    /// Per-axis segments of the box clipped to the domain. Axes with
    /// `keep[a] == false` are not clipped and get no segments. `None` when a
    /// kept axis is empty after clipping.
    fn clipped_segments(
        &self,
        field: &SignedDistanceField,
        mins: &Point3<Real>,
        maxs: &Point3<Real>,
        keep: [bool; 3],
    ) -> Option<[Vec<Segment>; 3]> {
        let bounds = field.bounds();
        let cells = field.cells();
        let mut axes: [Vec<Segment>; 3] = Default::default();
        for axis in 0..3 {
            if !keep[axis] {
                continue;
            }
            let lo = mins[axis].max(bounds.mins[axis]);
            let hi = maxs[axis].min(bounds.maxs[axis]);
            // also rejects NaN
            if !(hi > lo) {
                return None;
            }
            let s0 = field.grid_coordinate(axis, lo);
            let s1 = field.grid_coordinate(axis, hi);
            axes[axis] = segments(s0, s1, cells[axis]);
        }
        Some(axes)
    }

    /// Local-unit integral of `p + c` over the cells of three segments.
    fn integrate_cells(&self, field: &SignedDistanceField, axes: [&Segment; 3]) -> Real {
        let table = field.coefficients();
        let cost = self.config.volume_cost;
        let (mx, my, mz) = (axes[0].moments(), axes[1].moments(), axes[2].moments());
        let volume = mx[0] * my[0] * mz[0];

        let mut total = 0.0;
        for i in axes[0].cells() {
            for j in axes[1].cells() {
                for k in axes[2].cells() {
                    if let Some(block) = table.block(field.cell_index(i, j, k)) {
                        total += integrate_block(block, &mx, &my, &mz);
                    }
                    total += cost * volume;
                }
            }
        }
        total
    }

    /// Physical integral of `p + c` over the face of the clipped box lying in
    /// the plane `x[axis] = coordinate`.
    fn face_integral(
        &self,
        field: &SignedDistanceField,
        axis: usize,
        coordinate: Real,
        axes: &[Vec<Segment>; 3],
    ) -> Real {
        let n = field.cells()[axis];
        let s = field.grid_coordinate(axis, coordinate).clamp(0.0, n as Real);
        let cell = (s.floor() as usize).min(n - 1);
        let at = powers(s - cell as Real);
        let fixed = Segment::Partial { cell, t0: 0.0, t1: 0.0 };

        let h = field.spacing();
        let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
        let table = field.coefficients();
        let cost = self.config.volume_cost;

        let mut total = 0.0;
        for su in &axes[u] {
            for sv in &axes[v] {
                let mut ranges: [Range<usize>; 3] = Default::default();
                let mut weights = [at; 3];
                ranges[axis] = fixed.cells();
                ranges[u] = su.cells();
                ranges[v] = sv.cells();
                weights[u] = su.moments();
                weights[v] = sv.moments();
                let area = weights[u][0] * weights[v][0];

                for i in ranges[0].clone() {
                    for j in ranges[1].clone() {
                        for k in ranges[2].clone() {
                            if let Some(block) = table.block(field.cell_index(i, j, k)) {
                                total += integrate_block(block, &weights[0], &weights[1], &weights[2]);
                            }
                            total += cost * area;
                        }
                    }
                }
            }
        }
        total * h[u] * h[v]
    }

    /// Central finite differences of [`energy`](Self::energy) with step `h`.
    pub fn finite_difference_gradient(&self, field: &SignedDistanceField, fit: &FitBox, h: Real) -> [Real; 6] {
        let params = fit.params();
        let mut gradient = [0.0; 6];
        for (slot, component) in gradient.iter_mut().enumerate() {
            let mut plus = params;
            let mut minus = params;
            plus[slot] += h;
            minus[slot] -= h;
            let e_plus = self.energy_of_corners(field, &corner(&plus, 0), &corner(&plus, 3));
            let e_minus = self.energy_of_corners(field, &corner(&minus, 0), &corner(&minus, 3));
            *component = (e_plus - e_minus) / (2.0 * h);
        }
        gradient
    }

    /// Compare the analytic gradient with central differences. A mismatch
    /// above `tolerance` is logged, never fatal.
    pub fn check_gradient(
        &self,
        field: &SignedDistanceField,
        fit: &FitBox,
        h: Real,
        tolerance: Real,
    ) -> GradientCheck {
        let analytic = self.gradient(field, fit);
        let numeric = self.finite_difference_gradient(field, fit, h);
        let max_error = analytic
            .iter()
            .zip(&numeric)
            .map(|(a, n)| (a - n).abs())
            .fold(0.0, Real::max);
        let passed = max_error < tolerance;
        if !passed {
            log::warn!(
                "gradient check failed for box [{}, {}]: analytic {analytic:?}, numeric {numeric:?}, error {max_error:e}",
                fit.mins(),
                fit.maxs()
            );
        }
        GradientCheck { analytic, numeric, max_error, passed }
    }
}

#[inline]
fn corner(params: &[Real; 6], offset: usize) -> Point3<Real> {
    Point3::new(params[offset], params[offset + 1], params[offset + 2])
}
