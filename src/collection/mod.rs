//! Ordered sets of independent boxes and their batch optimization.
//!
//! Batches above [`PARALLEL_THRESHOLD`] boxes run on a fixed-size worker pool
//! when the `parallel` feature is enabled, smaller ones run serially. Both
//! paths call the same per-box routine.

pub mod serial;
pub mod traits;

#[cfg(feature = "parallel")]
pub mod parallel;

pub use serial::SerialMinimizeOps;
pub use traits::MinimizeOps;

#[cfg(feature = "parallel")]
pub use parallel::ParallelMinimizeOps;

use crate::errors::{Error, StateError};
use crate::field::SignedDistanceField;
use crate::fitbox::FitBox;
use crate::optimizer::{Minimization, Optimizer};
use crate::triangulated::Triangulated3D;
use crate::float_types::Real;
use nalgebra::{Point3, Vector3};

/// Batches larger than this run on the worker pool.
pub const PARALLEL_THRESHOLD: usize = 10;

/// The per-box routine shared by the serial and parallel paths.
pub(crate) fn minimize_one(
    field: &SignedDistanceField,
    optimizer: &Optimizer,
    fit: &mut FitBox,
) -> Minimization {
    let locked = field
        .kernel()
        .and_then(|kernel| kernel.intersection(fit.aabb()));
    optimizer.descend(field, fit, locked, None)
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// Ordered collection of boxes. Holds no reference to any field.
///
/// The worker pool is built by the first batch that needs it and reused
/// until the pool size changes.
#[derive(Clone, Debug, Default)]
pub struct BoxCollection {
    boxes: Vec<FitBox>,
    worker_threads: Option<usize>,
    #[cfg(feature = "parallel")]
    pool: Option<ParallelMinimizeOps>,
}

impl PartialEq for BoxCollection {
    fn eq(&self, other: &Self) -> bool {
        self.boxes == other.boxes && self.worker_threads == other.worker_threads
    }
}

impl BoxCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the worker pool used for large batches.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads.max(1));
        #[cfg(feature = "parallel")]
        let _ = self.pool.take();
        self
    }

    /// Configured pool size, the available parallelism by default.
    pub fn worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(default_worker_threads)
    }

    pub fn push(&mut self, fit: FitBox) {
        self.boxes.push(fit);
    }

    pub fn insert(&mut self, index: usize, fit: FitBox) {
        self.boxes.insert(index, fit);
    }

    pub fn remove(&mut self, index: usize) -> FitBox {
        self.boxes.remove(index)
    }

    pub fn clear(&mut self) {
        self.boxes.clear();
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FitBox> {
        self.boxes.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut FitBox> {
        self.boxes.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FitBox> {
        self.boxes.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, FitBox> {
        self.boxes.iter_mut()
    }

    pub fn boxes(&self) -> &[FitBox] {
        &self.boxes
    }

    pub fn into_boxes(self) -> Vec<FitBox> {
        self.boxes
    }

    /// Optimize every box independently against `field`.
    ///
    /// Synchronous; returns one [`Minimization`] per box in box order. The
    /// field must be frozen.
    pub fn minimize_all(
        &mut self,
        field: &SignedDistanceField,
        optimizer: &Optimizer,
    ) -> Result<Vec<Minimization>, Error> {
        if !field.is_frozen() {
            return Err(StateError::NotFrozen.into());
        }

        let results = if self.boxes.len() > PARALLEL_THRESHOLD {
            self.minimize_on_pool(field, optimizer)?
        } else {
            SerialMinimizeOps::new().minimize(field, optimizer, &mut self.boxes)?
        };

        let converged = results.iter().filter(|r| r.converged()).count();
        log::info!(
            "minimized {} boxes, {converged} converged",
            results.len()
        );
        Ok(results)
    }

    #[cfg(feature = "parallel")]
    fn minimize_on_pool(
        &mut self,
        field: &SignedDistanceField,
        optimizer: &Optimizer,
    ) -> Result<Vec<Minimization>, Error> {
        let ops = match self.pool.take() {
            Some(ops) => ops,
            None => ParallelMinimizeOps::new(self.worker_threads())?,
        };
        let results = ops.minimize(field, optimizer, &mut self.boxes);
        self.pool = Some(ops);
        results
    }

    #[cfg(not(feature = "parallel"))]
    fn minimize_on_pool(
        &mut self,
        field: &SignedDistanceField,
        optimizer: &Optimizer,
    ) -> Result<Vec<Minimization>, Error> {
        SerialMinimizeOps::new().minimize(field, optimizer, &mut self.boxes)
    }

    /// Cache the display mesh of every box.
    pub fn generate_pieces(&mut self, minimum_edge: Real) {
        for fit in &mut self.boxes {
            fit.generate_piece(minimum_edge);
        }
    }
}

impl From<Vec<FitBox>> for BoxCollection {
    fn from(boxes: Vec<FitBox>) -> Self {
        Self {
            boxes,
            ..Self::default()
        }
    }
}

impl FromIterator<FitBox> for BoxCollection {
    fn from_iter<I: IntoIterator<Item = FitBox>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<'a> IntoIterator for &'a BoxCollection {
    type Item = &'a FitBox;
    type IntoIter = std::slice::Iter<'a, FitBox>;

    fn into_iter(self) -> Self::IntoIter {
        self.boxes.iter()
    }
}

impl std::ops::Index<usize> for BoxCollection {
    type Output = FitBox;

    fn index(&self, index: usize) -> &FitBox {
        &self.boxes[index]
    }
}

impl Triangulated3D for FitBox {
    /// The cached piece when present, the plain corner mesh otherwise.
    fn visit_triangles<F>(&self, f: F)
    where
        F: FnMut([Point3<Real>; 3], Vector3<Real>),
    {
        match self.piece() {
            Some(piece) => piece.visit_triangles(f),
            None => self.calculate_mesh(0.0).visit_triangles(f),
        }
    }
}

impl Triangulated3D for BoxCollection {
    fn visit_triangles<F>(&self, mut f: F)
    where
        F: FnMut([Point3<Real>; 3], Vector3<Real>),
    {
        for fit in self.boxes.iter().filter(|fit| fit.is_visible()) {
            fit.visit_triangles(&mut f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::WeightLevel;
    use crate::float_types::parry3d::bounding_volume::Aabb;

    fn centre_field() -> SignedDistanceField {
        let bounds = Aabb::new(Point3::origin(), Point3::new(4.0, 4.0, 4.0));
        let mut field = SignedDistanceField::new([5, 5, 5], bounds).unwrap();
        field.set_weight(2, 2, 2, WeightLevel::GuaranteedInterior).unwrap();
        field.freeze().unwrap();
        field
    }

    #[test]
    fn requires_a_frozen_field() {
        let bounds = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let field = SignedDistanceField::new([2, 2, 2], bounds).unwrap();
        let mut boxes = BoxCollection::from(vec![FitBox::from_aabb(bounds)]);
        let err = boxes.minimize_all(&field, &Optimizer::default()).unwrap_err();
        assert!(matches!(err, Error::State(StateError::NotFrozen)));
    }

    #[test]
    fn serial_and_pool_paths_agree() {
        let field = centre_field();
        let optimizer = Optimizer::default();
        let seeds: Vec<FitBox> = (0..12)
            .map(|i| FitBox::seed(Point3::new(2.0, 2.0, 1.2 + 0.1 * i as Real), 1.0))
            .collect();

        let mut serial = seeds.clone();
        let expected = SerialMinimizeOps::new()
            .minimize(&field, &optimizer, &mut serial)
            .unwrap();

        let mut batch = BoxCollection::from(seeds).with_worker_threads(3);
        let results = batch.minimize_all(&field, &optimizer).unwrap();
        assert_eq!(results, expected);
        assert_eq!(batch.boxes(), serial.as_slice());

        // the pool built by the first batch is reused by the next one
        let again = batch.minimize_all(&field, &optimizer).unwrap();
        assert_eq!(again.len(), 12);
        #[cfg(feature = "parallel")]
        assert_eq!(batch.pool.as_ref().map(ParallelMinimizeOps::threads), Some(3));
    }

    #[test]
    fn batch_ops_reject_an_unfrozen_field() {
        let bounds = Aabb::new(Point3::origin(), Point3::new(4.0, 4.0, 4.0));
        let field = SignedDistanceField::new([5, 5, 5], bounds).unwrap();
        let mut boxes = vec![FitBox::from_aabb(bounds)];
        let err = SerialMinimizeOps::new()
            .minimize(&field, &Optimizer::default(), &mut boxes)
            .unwrap_err();
        assert!(matches!(err, Error::State(StateError::NotFrozen)));
        assert_eq!(boxes[0].aabb(), &bounds);
    }

    #[test]
    fn changing_the_pool_size_drops_the_pool() {
        let field = centre_field();
        let seeds: Vec<FitBox> = (0..11)
            .map(|i| FitBox::seed(Point3::new(2.0, 2.0, 1.5 + 0.1 * i as Real), 0.5))
            .collect();
        let mut batch = BoxCollection::from(seeds).with_worker_threads(2);
        batch.minimize_all(&field, &Optimizer::default()).unwrap();
        let batch = batch.with_worker_threads(4);
        assert_eq!(batch.worker_threads(), 4);
        #[cfg(feature = "parallel")]
        assert!(batch.pool.is_none());
    }

    #[test]
    fn triangles_cover_visible_boxes() {
        let mut boxes: BoxCollection = (0..3)
            .map(|i| FitBox::seed(Point3::new(i as Real * 3.0, 0.0, 0.0), 1.0))
            .collect();
        boxes.get_mut(1).unwrap().set_visible(false);
        let mut count = 0;
        boxes.visit_triangles(|_, _| count += 1);
        assert_eq!(count, 24);
    }
}
