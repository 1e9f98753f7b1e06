//! A fitting session: the frozen field, the box being edited and the solutions
//! found so far, persisted as one record.

use crate::collection::BoxCollection;
use crate::errors::{Error, SerializationError};
use crate::field::SignedDistanceField;
use crate::fitbox::FitBox;
use crate::io::Persist;
use crate::io::binary::{read_bool, write_bool};
use crate::optimizer::{IterationTrace, Minimization, Optimizer};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

#[derive(Clone, Debug)]
pub struct FittingSession {
    pub field: SignedDistanceField,
    pub active: FitBox,
    pub solutions: Option<BoxCollection>,
}

impl FittingSession {
    /// A session whose active box covers the whole domain.
    pub fn new(field: SignedDistanceField) -> Self {
        let active = FitBox::full_domain(&field);
        Self {
            field,
            active,
            solutions: None,
        }
    }

    /// Optimize the active box.
    pub fn minimize_active(
        &mut self,
        optimizer: &Optimizer,
        trace: Option<&mut IterationTrace>,
    ) -> Result<Minimization, Error> {
        Ok(optimizer.gradient_descent(&self.field, &mut self.active, trace)?)
    }

    /// Optimize every stored solution; an empty result without solutions.
    pub fn minimize_solutions(&mut self, optimizer: &Optimizer) -> Result<Vec<Minimization>, Error> {
        match self.solutions.as_mut() {
            Some(solutions) => solutions.minimize_all(&self.field, optimizer),
            None => Ok(Vec::new()),
        }
    }

    /// Append a copy of the active box to the solutions.
    pub fn commit_active(&mut self) {
        self.solutions
            .get_or_insert_with(BoxCollection::new)
            .push(self.active.clone());
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SerializationError> {
        let mut sink = BufWriter::new(File::create(path)?);
        self.write(&mut sink)?;
        sink.flush()?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SerializationError> {
        Self::read(&mut BufReader::new(File::open(path)?))
    }
}

impl Persist for FittingSession {
    fn write<W: Write>(&self, sink: &mut W) -> Result<(), SerializationError> {
        self.field.write(sink)?;
        self.active.write(sink)?;
        write_bool(sink, self.solutions.is_some())?;
        if let Some(solutions) = &self.solutions {
            solutions.write(sink)?;
        }
        Ok(())
    }

    fn read<R: Read>(source: &mut R) -> Result<Self, SerializationError> {
        let field = SignedDistanceField::read(source)?;
        let active = FitBox::read(source)?;
        let solutions = if read_bool(source, "solutions flag")? {
            Some(BoxCollection::read(source)?)
        } else {
            None
        };
        Ok(Self {
            field,
            active,
            solutions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::WeightLevel;
    use crate::float_types::parry3d::bounding_volume::Aabb;
    use nalgebra::Point3;

    fn session() -> FittingSession {
        let bounds = Aabb::new(Point3::origin(), Point3::new(4.0, 4.0, 4.0));
        let mut field = SignedDistanceField::new([5, 5, 5], bounds).unwrap();
        field.set_weight(2, 2, 2, WeightLevel::GuaranteedInterior).unwrap();
        field.freeze().unwrap();
        FittingSession::new(field)
    }

    #[test]
    fn session_round_trip_keeps_solutions() {
        let mut session = session();
        session.minimize_active(&Optimizer::default(), None).unwrap();
        session.commit_active();

        let bytes = session.to_bytes().unwrap();
        let restored = FittingSession::from_bytes(&bytes).unwrap();
        assert_eq!(restored.active, session.active);
        assert_eq!(restored.solutions, session.solutions);
        assert_eq!(restored.field.weights(), session.field.weights());
        assert!(restored.field.is_frozen());
    }

    #[test]
    fn session_without_solutions_ends_with_a_zero_flag() {
        let session = session();
        let bytes = session.to_bytes().unwrap();
        assert_eq!(bytes.last(), Some(&0));
        assert!(FittingSession::from_bytes(&bytes).unwrap().solutions.is_none());
    }

    #[test]
    fn truncated_session_is_rejected() {
        let bytes = session().to_bytes().unwrap();
        let mut restored = session();
        restored.commit_active();
        let before = restored.solutions.clone();
        assert!(restored.read_into(&mut &bytes[..bytes.len() - 1]).is_err());
        assert_eq!(restored.solutions, before);
    }
}
