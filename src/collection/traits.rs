//! Traits for batch box optimization.

use crate::errors::Error;
use crate::field::SignedDistanceField;
use crate::fitbox::FitBox;
use crate::optimizer::{Minimization, Optimizer};

/// Runs the optimizer over a slice of independent boxes.
pub trait MinimizeOps {
    /// Optimize every box in place and return the results in box order.
    ///
    /// Fails with [`StateError::NotFrozen`](crate::errors::StateError::NotFrozen)
    /// unless `field` is frozen; the boxes are left untouched then.
    fn minimize(
        &self,
        field: &SignedDistanceField,
        optimizer: &Optimizer,
        boxes: &mut [FitBox],
    ) -> Result<Vec<Minimization>, Error>;
}
