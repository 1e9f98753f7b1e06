//! Tricubic interpolation of the weight grid.
//!
//! Each cell carries a polynomial `p(t,u,v) = Σ a[i + 4j + 16k]·tⁱ·uʲ·vᵏ` in
//! local coordinates `t,u,v ∈ [0,1]`. The polynomial is the tensor product of
//! 1D cubic Hermite bases fed with eight data values per corner: the value,
//! the three first partials, the three mixed second partials and the mixed
//! third partial, all estimated with central finite differences in index
//! space (one-sided on the grid boundary). Neighbouring cells share their
//! corner data, so the interpolant is C¹ across cell faces.
//!
//! Because the polynomial is separable in its monomials, integrals over any
//! axis-aligned sub-box of a cell are closed form: see [`moments`] and
//! [`integrate_block`].

use super::SignedDistanceField;
use crate::float_types::Real;
use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// The 64 coefficients of one cell polynomial.
pub type CoefficientBlock = [Real; 64];

/// Sentinel answered for points outside the domain and for cells whose
/// polynomial is identically zero.
pub static ZERO_BLOCK: CoefficientBlock = [0.0; 64];

/// Monomial coefficients of the cubic Hermite basis on `[0,1]`, indexed by
/// `[corner][derivative order]`.
const HERMITE: [[[Real; 4]; 2]; 2] = [
    [[1.0, 0.0, -3.0, 2.0], [0.0, 1.0, -2.0, 1.0]],
    [[0.0, 0.0, 3.0, -2.0], [0.0, 0.0, -1.0, 1.0]],
];

/// Moments of a whole cell, `∫₀¹ tⁱ dt`.
pub const FULL_MOMENTS: [Real; 4] = [1.0, 0.5, 1.0 / 3.0, 0.25];

#[inline]
const fn slot(i: usize, j: usize, k: usize) -> usize {
    i + 4 * j + 16 * k
}

/// `∫_{t0}^{t1} tⁱ dt` for `i = 0..4`.
#[inline]
pub fn moments(t0: Real, t1: Real) -> [Real; 4] {
    let (a2, b2) = (t0 * t0, t1 * t1);
    let (a3, b3) = (a2 * t0, b2 * t1);
    [
        t1 - t0,
        (b2 - a2) * 0.5,
        (b3 - a3) / 3.0,
        (b3 * t1 - a3 * t0) * 0.25,
    ]
}

/// `[1, t, t², t³]`
#[inline]
pub fn powers(t: Real) -> [Real; 4] {
    [1.0, t, t * t, t * t * t]
}

/// `d/dt [1, t, t², t³]`
#[inline]
fn powers_derivative(t: Real) -> [Real; 4] {
    [0.0, 1.0, 2.0 * t, 3.0 * t * t]
}

/// `Σ a_ijk · mx[i] · my[j] · mz[k]`.
///
/// With moment vectors this is an integral over a sub-box of the cell, with
/// [`powers`] on an axis it is evaluated at that coordinate instead.
#[inline]
pub fn integrate_block(block: &CoefficientBlock, mx: &[Real; 4], my: &[Real; 4], mz: &[Real; 4]) -> Real {
    let mut total = 0.0;
    for k in 0..4 {
        let mut plane = 0.0;
        for j in 0..4 {
            let row = &block[slot(0, j, k)..slot(0, j, k) + 4];
            let line = row[0] * mx[0] + row[1] * mx[1] + row[2] * mx[2] + row[3] * mx[3];
            plane += line * my[j];
        }
        total += plane * mz[k];
    }
    total
}

/// Integral of the cell polynomial over the whole unit cell.
pub fn full_cell_integral(block: &CoefficientBlock) -> Real {
    integrate_block(block, &FULL_MOMENTS, &FULL_MOMENTS, &FULL_MOMENTS)
}

/// Sparse cell → coefficient block table of a frozen field.
///
/// Cells map to an explicit optional slot; a cell without entry has an
/// identically zero polynomial. The whole-cell integrals of all cells are
/// kept in a summed-volume table so that runs of fully covered cells
/// integrate in O(1).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoefficientTable {
    cells: [usize; 3],
    slots: HashMap<usize, usize>,
    entries: Vec<(usize, CoefficientBlock)>,
    full_values: Vec<Real>,
    summed: Vec<Real>,
}

impl CoefficientTable {
    /// Derive the blocks of every cell of `field` from its current weights.
    pub fn build(field: &SignedDistanceField) -> Self {
        let cell_count = field.cell_count();

        #[cfg(feature = "parallel")]
        let derived: Vec<(usize, CoefficientBlock)> = (0..cell_count)
            .into_par_iter()
            .filter_map(|cell| derive_nonzero(field, cell))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let derived: Vec<(usize, CoefficientBlock)> =
            (0..cell_count).filter_map(|cell| derive_nonzero(field, cell)).collect();

        Self::from_entries(field.cells(), derived)
    }

    /// Rebuild a table from `(cell, block)` entries in ascending cell order.
    pub(crate) fn from_entries(cells: [usize; 3], entries: Vec<(usize, CoefficientBlock)>) -> Self {
        let slots = entries
            .iter()
            .enumerate()
            .map(|(slot, (cell, _))| (*cell, slot))
            .collect();
        let full_values = entries.iter().map(|(_, block)| full_cell_integral(block)).collect();
        let mut table = Self {
            cells,
            slots,
            entries,
            full_values,
            summed: Vec::new(),
        };
        table.summed = table.summed_volume();
        table
    }

    fn summed_volume(&self) -> Vec<Real> {
        let [cx, cy, cz] = self.cells;
        let (sy, sz) = (cy + 1, cz + 1);
        let at = |i: usize, j: usize, k: usize| k + sz * (j + sy * i);
        let mut summed = vec![0.0; (cx + 1) * sy * sz];
        for i in 0..cx {
            for j in 0..cy {
                for k in 0..cz {
                    let own = self.full_box_value(k + cz * (j + cy * i));
                    summed[at(i + 1, j + 1, k + 1)] = own
                        + summed[at(i, j + 1, k + 1)]
                        + summed[at(i + 1, j, k + 1)]
                        + summed[at(i + 1, j + 1, k)]
                        - summed[at(i, j, k + 1)]
                        - summed[at(i, j + 1, k)]
                        - summed[at(i + 1, j, k)]
                        + summed[at(i, j, k)];
                }
            }
        }
        summed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Slot of `cell` in the entry list, `None` when the cell has no block.
    pub fn slot(&self, cell: usize) -> Option<usize> {
        self.slots.get(&cell).copied()
    }

    pub fn block(&self, cell: usize) -> Option<&CoefficientBlock> {
        self.slot(cell).map(|slot| &self.entries[slot].1)
    }

    /// Whole-cell integral in local units (multiply by the cell volume).
    pub fn full_box_value(&self, cell: usize) -> Real {
        self.slot(cell).map_or(0.0, |slot| self.full_values[slot])
    }

    /// Entries in ascending cell order.
    pub fn entries(&self) -> &[(usize, CoefficientBlock)] {
        &self.entries
    }

    /// Sum of whole-cell integrals over the cell ranges `[lo, hi)` per axis.
    pub fn sum_full_cells(&self, lo: [usize; 3], hi: [usize; 3]) -> Real {
        if self.summed.is_empty() || (0..3).any(|a| lo[a] >= hi[a]) {
            return 0.0;
        }
        let [_, cy, cz] = self.cells;
        let (sy, sz) = (cy + 1, cz + 1);
        let at = |i: usize, j: usize, k: usize| self.summed[k + sz * (j + sy * i)];
        at(hi[0], hi[1], hi[2]) - at(lo[0], hi[1], hi[2]) - at(hi[0], lo[1], hi[2])
            - at(hi[0], hi[1], lo[2])
            + at(lo[0], lo[1], hi[2])
            + at(lo[0], hi[1], lo[2])
            + at(hi[0], lo[1], lo[2])
            - at(lo[0], lo[1], lo[2])
    }
}

fn derive_nonzero(field: &SignedDistanceField, cell: usize) -> Option<(usize, CoefficientBlock)> {
    let [i, j, k] = field.cell_of_index(cell);
    let block = field.derive_block(i, j, k);
    block.iter().any(|&c| c != 0.0).then_some((cell, block))
}

impl SignedDistanceField {
    /// Finite-difference partial of the weight grid at vertex `(i, j, k)`.
    ///
    /// `orders[a]` is 0 or 1: differentiate along axis `a` or not. Central
    /// differences in index units, one-sided on the boundary.
    pub fn weight_derivative(&self, i: usize, j: usize, k: usize, orders: [usize; 3]) -> Real {
        let base = [i, j, k];
        let mut lo = base;
        let mut hi = base;
        let mut span = 1.0;
        for axis in 0..3 {
            if orders[axis] == 1 {
                lo[axis] = base[axis].saturating_sub(1);
                hi[axis] = (base[axis] + 1).min(self.resolution[axis] - 1);
                span *= (hi[axis] - lo[axis]) as Real;
            }
        }

        let mut sum = 0.0;
        'corners: for corner in 0..8usize {
            let mut sign = 1.0;
            let mut at = base;
            for axis in 0..3 {
                let upper = (corner >> axis) & 1 == 1;
                if orders[axis] == 0 {
                    if upper {
                        continue 'corners;
                    }
                } else if upper {
                    at[axis] = hi[axis];
                } else {
                    at[axis] = lo[axis];
                    sign = -sign;
                }
            }
            sum += sign * self.weight_at(at[0], at[1], at[2]);
        }
        sum / span
    }

    /// Coefficients of cell `(i, j, k)` from the current weights.
    pub fn derive_block(&self, i: usize, j: usize, k: usize) -> CoefficientBlock {
        let mut block = [0.0; 64];
        for corner in 0..8usize {
            let c = [corner & 1, (corner >> 1) & 1, (corner >> 2) & 1];
            let vertex = [i + c[0], j + c[1], k + c[2]];
            for order in 0..8usize {
                let d = [order & 1, (order >> 1) & 1, (order >> 2) & 1];
                let data = self.weight_derivative(vertex[0], vertex[1], vertex[2], d);
                if data == 0.0 {
                    continue;
                }
                let (hx, hy, hz) = (&HERMITE[c[0]][d[0]], &HERMITE[c[1]][d[1]], &HERMITE[c[2]][d[2]]);
                for (pk, &bz) in hz.iter().enumerate() {
                    if bz == 0.0 {
                        continue;
                    }
                    for (pj, &by) in hy.iter().enumerate() {
                        if by == 0.0 {
                            continue;
                        }
                        for (pi, &bx) in hx.iter().enumerate() {
                            block[slot(pi, pj, pk)] += data * bx * by * bz;
                        }
                    }
                }
            }
        }
        block
    }

    /// Interpolated weight at `p`; zero outside the domain.
    pub fn value(&self, p: &Point3<Real>) -> Real {
        self.value_and_gradient(p).0
    }

    /// Interpolated weight at `p` and its spatial gradient; zeros outside the
    /// domain.
    pub fn value_and_gradient(&self, p: &Point3<Real>) -> (Real, Vector3<Real>) {
        let Some(([i, j, k], local)) = self.locate(p) else {
            return (0.0, Vector3::zeros());
        };
        let Some(block) = self.coefficients.block(self.cell_index(i, j, k)) else {
            return (0.0, Vector3::zeros());
        };
        let (px, py, pz) = (powers(local.x), powers(local.y), powers(local.z));
        let (dx, dy, dz) = (
            powers_derivative(local.x),
            powers_derivative(local.y),
            powers_derivative(local.z),
        );
        let h = self.spacing();
        let value = integrate_block(block, &px, &py, &pz);
        let gradient = Vector3::new(
            integrate_block(block, &dx, &py, &pz) / h.x,
            integrate_block(block, &px, &dy, &pz) / h.y,
            integrate_block(block, &px, &py, &dz) / h.z,
        );
        (value, gradient)
    }
}
