//! Backtracking gradient descent of a single box.
//!
//! The six corner coordinates of a box are moved against the energy gradient.
//! A proposal is accepted only when it is feasible and strictly lowers the
//! energy, so the recorded energies form a strictly decreasing sequence.

use crate::energy::EnergyModel;
use crate::errors::StateError;
use crate::field::SignedDistanceField;
use crate::fitbox::FitBox;
use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use nalgebra::Point3;

/// Step control and termination thresholds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OptimizerConfig {
    pub initial_step: Real,
    pub max_step: Real,
    pub min_step: Real,
    /// Step multiplier after an accepted proposal
    pub grow_factor: Real,
    /// Step multiplier after a rejected proposal
    pub shrink_factor: Real,
    /// Hard cap on proposals, accepted or not
    pub max_iterations: usize,
    pub gradient_tolerance: Real,
    /// Relative energy improvement below which the descent has converged
    pub energy_tolerance: Real,
    /// Smallest allowed box extent along any axis
    pub min_extent: Real,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            initial_step: 1e-2,
            max_step: 1.0,
            min_step: 1e-10,
            grow_factor: 1.5,
            shrink_factor: 0.5,
            max_iterations: 10_000,
            gradient_tolerance: 1e-6,
            energy_tolerance: 1e-10,
            min_extent: 1e-3,
        }
    }
}

impl OptimizerConfig {
    pub fn builder() -> OptimizerConfigBuilder {
        OptimizerConfigBuilder::default()
    }
}

/// Builder for [`OptimizerConfig`], starting from the defaults.
#[derive(Clone, Copy, Debug, Default)]
pub struct OptimizerConfigBuilder {
    config: OptimizerConfig,
}

impl OptimizerConfigBuilder {
    pub const fn initial_step(mut self, step: Real) -> Self {
        self.config.initial_step = step;
        self
    }

    pub const fn max_step(mut self, step: Real) -> Self {
        self.config.max_step = step;
        self
    }

    pub const fn min_step(mut self, step: Real) -> Self {
        self.config.min_step = step;
        self
    }

    pub const fn grow_factor(mut self, factor: Real) -> Self {
        self.config.grow_factor = factor;
        self
    }

    pub const fn shrink_factor(mut self, factor: Real) -> Self {
        self.config.shrink_factor = factor;
        self
    }

    pub const fn max_iterations(mut self, iterations: usize) -> Self {
        self.config.max_iterations = iterations;
        self
    }

    pub const fn gradient_tolerance(mut self, tolerance: Real) -> Self {
        self.config.gradient_tolerance = tolerance;
        self
    }

    pub const fn energy_tolerance(mut self, tolerance: Real) -> Self {
        self.config.energy_tolerance = tolerance;
        self
    }

    pub const fn min_extent(mut self, extent: Real) -> Self {
        self.config.min_extent = extent;
        self
    }

    pub const fn build(self) -> OptimizerConfig {
        self.config
    }
}

/// Why a descent stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// Gradient or energy improvement fell below its tolerance
    Converged,
    /// Every proposal was rejected until the step became negligible
    StepUnderflow,
    /// The iteration cap was reached first
    IterationCap,
}

/// Outcome of optimizing one box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Minimization {
    pub initial_energy: Real,
    pub energy: Real,
    pub status: Status,
    /// Proposals evaluated
    pub iterations: usize,
    /// Proposals accepted
    pub accepted: usize,
}

impl Minimization {
    pub fn converged(&self) -> bool {
        self.status == Status::Converged
    }
}

/// Append-only record of the boxes visited by a descent.
///
/// The initial box comes first, followed by every accepted box.
#[derive(Clone, Debug, Default)]
pub struct IterationTrace {
    boxes: Vec<FitBox>,
    energies: Vec<Real>,
}

impl IterationTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, fit: &FitBox, energy: Real) {
        self.boxes.push(fit.clone());
        self.energies.push(energy);
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn boxes(&self) -> &[FitBox] {
        &self.boxes
    }

    pub fn energies(&self) -> &[Real] {
        &self.energies
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FitBox, Real)> {
        self.boxes.iter().zip(self.energies.iter().copied())
    }

    pub fn last(&self) -> Option<&FitBox> {
        self.boxes.last()
    }
}

/// Gradient descent driver for boxes over a frozen field.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Optimizer {
    config: OptimizerConfig,
    energy: EnergyModel,
}

impl Optimizer {
    pub const fn new(config: OptimizerConfig, energy: EnergyModel) -> Self {
        Self { config, energy }
    }

    pub const fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub const fn energy_model(&self) -> &EnergyModel {
        &self.energy
    }

    /// Move `fit` to a local energy minimum.
    ///
    /// The part of the field kernel covered by `fit` when the descent starts
    /// stays covered. Every accepted box is appended to `trace` when given.
    /// Fails with [`StateError::NotFrozen`] unless the field is frozen.
    pub fn gradient_descent(
        &self,
        field: &SignedDistanceField,
        fit: &mut FitBox,
        trace: Option<&mut IterationTrace>,
    ) -> Result<Minimization, StateError> {
        if !field.is_frozen() {
            return Err(StateError::NotFrozen);
        }
        let locked = field.kernel().and_then(|kernel| kernel.intersection(fit.aabb()));
        Ok(self.descend(field, fit, locked, trace))
    }

    /// The descent loop; the field is known to be frozen.
    pub(crate) fn descend(
        &self,
        field: &SignedDistanceField,
        fit: &mut FitBox,
        locked: Option<Aabb>,
        mut trace: Option<&mut IterationTrace>,
    ) -> Minimization {
        let config = &self.config;
        let mut params = fit.params();
        let mut energy = self.energy_at(field, &params);
        let mut gradient = self.gradient_at(field, &params);
        let initial_energy = energy;
        if let Some(trace) = trace.as_deref_mut() {
            trace.record(fit, energy);
        }

        let mut step = config.initial_step;
        let mut iterations = 0;
        let mut accepted = 0;
        let status = loop {
            let norm = gradient.iter().map(|g| g * g).sum::<Real>().sqrt();
            if norm < config.gradient_tolerance {
                break Status::Converged;
            }
            if step < config.min_step {
                break Status::StepUnderflow;
            }
            if iterations >= config.max_iterations {
                break Status::IterationCap;
            }
            iterations += 1;

            let trial: [Real; 6] = std::array::from_fn(|i| params[i] - step * gradient[i]);
            if self.feasible(&trial, locked.as_ref()) {
                let trial_energy = self.energy_at(field, &trial);
                if trial_energy < energy {
                    let improvement = energy - trial_energy;
                    params = trial;
                    energy = trial_energy;
                    gradient = self.gradient_at(field, &params);
                    accepted += 1;
                    fit.set_params(params);
                    if let Some(trace) = trace.as_deref_mut() {
                        trace.record(fit, energy);
                    }
                    log::trace!("iteration {iterations}: step {step:e}, energy {energy}, |g| {norm:e}");

                    step = (step * config.grow_factor).min(config.max_step);
                    if improvement < config.energy_tolerance * energy.abs().max(1.0) {
                        break Status::Converged;
                    }
                    continue;
                }
            }
            step *= config.shrink_factor;
        };

        if status == Status::IterationCap {
            log::warn!(
                "descent stopped at the iteration cap ({iterations}) with energy {energy}"
            );
        }
        log::debug!(
            "descent {status:?} after {iterations} iterations ({accepted} accepted): {initial_energy} -> {energy}"
        );
        Minimization {
            initial_energy,
            energy,
            status,
            iterations,
            accepted,
        }
    }

    /// Extents of at least `min_extent` and the locked region still covered.
    fn feasible(&self, params: &[Real; 6], locked: Option<&Aabb>) -> bool {
        let extents_ok = (0..3).all(|a| params[a + 3] - params[a] >= self.config.min_extent);
        let covers = locked.is_none_or(|locked| {
            (0..3).all(|a| params[a] <= locked.mins[a] && locked.maxs[a] <= params[a + 3])
        });
        extents_ok && covers
    }

    fn energy_at(&self, field: &SignedDistanceField, params: &[Real; 6]) -> Real {
        let (lo, hi) = corners(params);
        self.energy.energy_of_corners(field, &lo, &hi)
    }

    fn gradient_at(&self, field: &SignedDistanceField, params: &[Real; 6]) -> [Real; 6] {
        let (lo, hi) = corners(params);
        self.energy.gradient_of_corners(field, &lo, &hi)
    }
}

#[inline]
fn corners(params: &[Real; 6]) -> (Point3<Real>, Point3<Real>) {
    (
        Point3::new(params[0], params[1], params[2]),
        Point3::new(params[3], params[4], params[5]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::WeightLevel;

    fn centre_field() -> SignedDistanceField {
        let bounds = Aabb::new(Point3::origin(), Point3::new(4.0, 4.0, 4.0));
        let mut field = SignedDistanceField::new([5, 5, 5], bounds).unwrap();
        field.set_weight(2, 2, 2, WeightLevel::GuaranteedInterior).unwrap();
        field.freeze().unwrap();
        field
    }

    #[test]
    fn unfrozen_field_is_rejected() {
        let bounds = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let field = SignedDistanceField::new([2, 2, 2], bounds).unwrap();
        let mut fit = FitBox::from_aabb(bounds);
        assert_eq!(
            Optimizer::default().gradient_descent(&field, &mut fit, None),
            Err(StateError::NotFrozen)
        );
    }

    #[test]
    fn trace_energies_decrease() {
        let field = centre_field();
        let mut fit = FitBox::full_domain(&field);
        let mut trace = IterationTrace::new();
        let result = Optimizer::default()
            .gradient_descent(&field, &mut fit, Some(&mut trace))
            .unwrap();

        assert_eq!(trace.len(), result.accepted + 1);
        assert!(trace.energies().windows(2).all(|w| w[1] < w[0]));
        assert_eq!(trace.last(), Some(&fit));
        assert_eq!(trace.energies().last().copied(), Some(result.energy));
    }

    #[test]
    fn iteration_cap_counts_every_proposal() {
        let field = centre_field();
        let mut fit = FitBox::full_domain(&field);
        let config = OptimizerConfig::builder().max_iterations(3).build();
        let result = Optimizer::new(config, EnergyModel::default())
            .gradient_descent(&field, &mut fit, None)
            .unwrap();
        assert_eq!(result.status, Status::IterationCap);
        assert_eq!(result.iterations, 3);
    }

    #[test]
    fn kernel_part_stays_covered() {
        let bounds = Aabb::new(Point3::new(-2.0, -2.0, -2.0), Point3::new(2.0, 2.0, 2.0));
        let sphere = |p: &Point3<Real>| p.coords.norm() - 1.2;
        let mut field = SignedDistanceField::build([9, 9, 9], bounds, &sphere).unwrap();
        field.classify_and_freeze(&sphere, 0.6, 0.25).unwrap();
        let kernel = *field.kernel().unwrap();

        let mut fit = FitBox::new(Point3::new(-0.5, -0.5, -0.5), Point3::new(1.5, 1.5, 1.5));
        let locked = kernel.intersection(fit.aabb()).unwrap();
        let result = Optimizer::default().gradient_descent(&field, &mut fit, None).unwrap();
        assert!(fit.contains(&locked));
        assert!(result.energy <= result.initial_energy);
    }
}
