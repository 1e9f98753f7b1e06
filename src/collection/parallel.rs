//! Parallel batch optimization on a fixed-size rayon pool.

use super::minimize_one;
use super::traits::MinimizeOps;
use crate::errors::{ConfigurationError, Error, StateError};
use crate::field::SignedDistanceField;
use crate::fitbox::FitBox;
use crate::optimizer::{Minimization, Optimizer};
use rayon::prelude::*;
use std::sync::Arc;

/// Parallel implementation of `MinimizeOps`.
///
/// Each box is owned by exactly one worker while the frozen field is shared
/// read-only, so the results match the serial path box for box. The pool is
/// built once and shared by clones.
#[derive(Clone, Debug)]
pub struct ParallelMinimizeOps {
    pool: Arc<rayon::ThreadPool>,
}

impl ParallelMinimizeOps {
    /// Build a pool of `threads` workers (at least one).
    pub fn new(threads: usize) -> Result<Self, ConfigurationError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .build()
            .map_err(|err| ConfigurationError::WorkerPool(err.to_string()))?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl MinimizeOps for ParallelMinimizeOps {
    fn minimize(
        &self,
        field: &SignedDistanceField,
        optimizer: &Optimizer,
        boxes: &mut [FitBox],
    ) -> Result<Vec<Minimization>, Error> {
        if !field.is_frozen() {
            return Err(StateError::NotFrozen.into());
        }
        Ok(self.pool.install(|| {
            boxes
                .par_iter_mut()
                .map(|fit| minimize_one(field, optimizer, fit))
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::float_types::parry3d::bounding_volume::Aabb;
    use nalgebra::Point3;

    #[test]
    fn pool_size_is_at_least_one() {
        assert_eq!(ParallelMinimizeOps::new(0).unwrap().threads(), 1);
        assert_eq!(ParallelMinimizeOps::new(3).unwrap().threads(), 3);
    }

    #[test]
    fn unfrozen_field_is_rejected_before_any_work() {
        let bounds = Aabb::new(Point3::origin(), Point3::new(4.0, 4.0, 4.0));
        let field = SignedDistanceField::new([5, 5, 5], bounds).unwrap();
        let mut boxes = vec![FitBox::from_aabb(bounds); 12];
        let err = ParallelMinimizeOps::new(2)
            .unwrap()
            .minimize(&field, &Optimizer::default(), &mut boxes)
            .unwrap_err();
        assert!(matches!(err, Error::State(StateError::NotFrozen)));
        assert!(boxes.iter().all(|fit| fit.aabb() == &bounds));
    }
}
