//! Serial batch optimization.

use super::minimize_one;
use super::traits::MinimizeOps;
use crate::errors::{Error, StateError};
use crate::field::SignedDistanceField;
use crate::fitbox::FitBox;
use crate::optimizer::{Minimization, Optimizer};

/// Serial implementation of `MinimizeOps`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialMinimizeOps;

impl SerialMinimizeOps {
    pub const fn new() -> Self {
        Self
    }
}

impl MinimizeOps for SerialMinimizeOps {
    fn minimize(
        &self,
        field: &SignedDistanceField,
        optimizer: &Optimizer,
        boxes: &mut [FitBox],
    ) -> Result<Vec<Minimization>, Error> {
        if !field.is_frozen() {
            return Err(StateError::NotFrozen.into());
        }
        Ok(boxes
            .iter_mut()
            .map(|fit| minimize_one(field, optimizer, fit))
            .collect())
    }
}
