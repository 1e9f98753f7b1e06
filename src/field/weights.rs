//! Classification of grid vertices against the input surface.

use super::{FieldState, SignedDistanceField};
use crate::errors::StateError;
use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use crate::surface::SurfaceQuery;
use nalgebra::Point3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Penalty for a box face landing on the surface.
pub const BORDER_PAY: Real = 5.0;
/// Neutral weight.
pub const STD_PAY: Real = 0.0;
/// Reward for covering the deep interior.
pub const MIN_PAY: Real = -10.0;
/// Penalty for reaching far outside the solid.
pub const MAX_PAY: Real = 500.0;

/// The four weight levels a grid vertex can take.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WeightLevel {
    Border,
    Standard,
    GuaranteedInterior,
    GuaranteedExterior,
}

impl WeightLevel {
    pub const fn value(self) -> Real {
        match self {
            WeightLevel::Border => BORDER_PAY,
            WeightLevel::Standard => STD_PAY,
            WeightLevel::GuaranteedInterior => MIN_PAY,
            WeightLevel::GuaranteedExterior => MAX_PAY,
        }
    }

    /// The level stored as `value`, if any.
    pub fn from_value(value: Real) -> Option<Self> {
        [
            WeightLevel::Border,
            WeightLevel::Standard,
            WeightLevel::GuaranteedInterior,
            WeightLevel::GuaranteedExterior,
        ]
        .into_iter()
        .find(|level| level.value() == value)
    }

    /// Level of a vertex at signed distance `distance`.
    ///
    /// `|d| ≤ tolerance` is border, `d < -interior` interior and
    /// `d > exterior` exterior; everything else is standard.
    pub fn classify(distance: Real, tolerance: Real, interior: Real, exterior: Real) -> Self {
        if distance.abs() <= tolerance {
            WeightLevel::Border
        } else if distance < -interior {
            WeightLevel::GuaranteedInterior
        } else if distance > exterior {
            WeightLevel::GuaranteedExterior
        } else {
            WeightLevel::Standard
        }
    }
}

/// Vertex counts per level after a classification pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClassificationSummary {
    pub border: usize,
    pub standard: usize,
    pub interior: usize,
    pub exterior: usize,
}

impl ClassificationSummary {
    fn count(levels: &[WeightLevel]) -> Self {
        levels.iter().fold(Self::default(), |mut summary, level| {
            match level {
                WeightLevel::Border => summary.border += 1,
                WeightLevel::Standard => summary.standard += 1,
                WeightLevel::GuaranteedInterior => summary.interior += 1,
                WeightLevel::GuaranteedExterior => summary.exterior += 1,
            }
            summary
        })
    }
}

impl SignedDistanceField {
    /// Label every vertex from its distance to `surface`.
    ///
    /// Vertices within `tolerance` of the surface become `BORDER`; vertices
    /// more than one voxel beyond that band become `GUARANTEED_INTERIOR`
    /// inside and `GUARANTEED_EXTERIOR` outside. Re-running with the same
    /// inputs reproduces the same weights.
    pub fn classify_border_weights<Q: SurfaceQuery>(
        &mut self,
        surface: &Q,
        tolerance: Real,
    ) -> Result<ClassificationSummary, StateError> {
        self.ensure_mutable()?;
        let guard = tolerance + self.unit();
        let levels = self.classify_vertices(surface, tolerance, guard);
        let summary = self.apply_levels(&levels);
        log::debug!("classified border weights: {summary:?}");
        Ok(summary)
    }

    /// Classify like [`classify_border_weights`](Self::classify_border_weights)
    /// with the interior threshold at `guard_distance`, commit the interior
    /// vertices as the kernel and freeze the field.
    pub fn classify_and_freeze<Q: SurfaceQuery>(
        &mut self,
        surface: &Q,
        guard_distance: Real,
        tolerance: Real,
    ) -> Result<ClassificationSummary, StateError> {
        self.ensure_mutable()?;
        let exterior = tolerance + self.unit();
        let interior = guard_distance.max(tolerance);
        let levels = self.classify_vertices_split(surface, tolerance, interior, exterior);
        let summary = self.apply_levels(&levels);

        self.kernel = levels
            .iter()
            .enumerate()
            .filter(|(_, level)| **level == WeightLevel::GuaranteedInterior)
            .map(|(index, _)| {
                let [i, j, k] = self.vertex_of_index(index);
                self.grid_point(i, j, k)
            })
            .fold(None, |kernel: Option<Aabb>, p: Point3<Real>| match kernel {
                Some(aabb) => Some(Aabb::new(aabb.mins.inf(&p), aabb.maxs.sup(&p))),
                None => Some(Aabb::new(p, p)),
            });
        log::debug!(
            "classified weights with guard distance {guard_distance}: {summary:?}, kernel {:?}",
            self.kernel
        );

        self.freeze()?;
        Ok(summary)
    }

    fn classify_vertices<Q: SurfaceQuery>(&self, surface: &Q, tolerance: Real, guard: Real) -> Vec<WeightLevel> {
        self.classify_vertices_split(surface, tolerance, guard, guard)
    }

    fn classify_vertices_split<Q: SurfaceQuery>(
        &self,
        surface: &Q,
        tolerance: Real,
        interior: Real,
        exterior: Real,
    ) -> Vec<WeightLevel> {
        let level_of = |index: usize| {
            let [i, j, k] = self.vertex_of_index(index);
            let distance = surface.signed_distance(&self.grid_point(i, j, k));
            WeightLevel::classify(distance, tolerance, interior, exterior)
        };

        #[cfg(feature = "parallel")]
        let levels = (0..self.vertex_count()).into_par_iter().map(level_of).collect();
        #[cfg(not(feature = "parallel"))]
        let levels = (0..self.vertex_count()).map(level_of).collect();

        levels
    }

    fn apply_levels(&mut self, levels: &[WeightLevel]) -> ClassificationSummary {
        for (weight, level) in self.weights.iter_mut().zip(levels) {
            *weight = level.value();
        }
        self.state = FieldState::Classified;
        ClassificationSummary::count(levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere_field() -> SignedDistanceField {
        let bounds = Aabb::new(Point3::new(-2.0, -2.0, -2.0), Point3::new(2.0, 2.0, 2.0));
        SignedDistanceField::build([9, 9, 9], bounds, &sphere).unwrap()
    }

    fn sphere(p: &Point3<Real>) -> Real {
        p.coords.norm() - 1.2
    }

    #[test]
    fn levels_round_trip_through_values() {
        for level in [
            WeightLevel::Border,
            WeightLevel::Standard,
            WeightLevel::GuaranteedInterior,
            WeightLevel::GuaranteedExterior,
        ] {
            assert_eq!(WeightLevel::from_value(level.value()), Some(level));
        }
        assert_eq!(WeightLevel::from_value(1.5), None);
    }

    #[test]
    fn classification_bands() {
        assert_eq!(WeightLevel::classify(0.1, 0.2, 1.0, 1.0), WeightLevel::Border);
        assert_eq!(WeightLevel::classify(-0.5, 0.2, 1.0, 1.0), WeightLevel::Standard);
        assert_eq!(WeightLevel::classify(-1.5, 0.2, 1.0, 1.0), WeightLevel::GuaranteedInterior);
        assert_eq!(WeightLevel::classify(1.5, 0.2, 1.0, 1.0), WeightLevel::GuaranteedExterior);
    }

    #[test]
    fn classify_border_weights_is_idempotent() {
        let mut field = sphere_field();
        let first = field.classify_border_weights(&sphere, 0.25).unwrap();
        let weights = field.weights().to_vec();
        let second = field.classify_border_weights(&sphere, 0.25).unwrap();
        assert_eq!(first, second);
        assert_eq!(weights, field.weights());
        assert_eq!(field.state(), FieldState::Classified);

        // centre is deep inside, corners are far outside
        assert_eq!(field.weight_at(4, 4, 4), MIN_PAY);
        assert_eq!(field.weight_at(0, 0, 0), MAX_PAY);
        assert!(first.border > 0);
    }

    #[test]
    fn classify_and_freeze_commits_a_kernel() {
        let mut field = sphere_field();
        let summary = field.classify_and_freeze(&sphere, 0.6, 0.25).unwrap();
        assert!(field.is_frozen());
        assert!(summary.interior > 0);

        // the centre and its six axis neighbours sit deeper than the guard
        assert_eq!(summary.interior, 7);
        let kernel = field.kernel().expect("sphere has a kernel");
        assert!((kernel.mins - Point3::new(-0.5, -0.5, -0.5)).norm() < 1e-12);
        assert!((kernel.maxs - Point3::new(0.5, 0.5, 0.5)).norm() < 1e-12);

        assert_eq!(field.classify_border_weights(&sphere, 0.25), Err(StateError::Frozen));
        assert_eq!(field.classify_and_freeze(&sphere, 0.6, 0.25), Err(StateError::Frozen));
    }
}
