//! Binary persistence and mesh export.
//!
//! Records are little-endian and written in a fixed order without a version
//! tag:
//!
//! | record | layout |
//! |---|---|
//! | field | resolution `3 × u32`, bounds `6 × f64`, distances, weights, coefficient table |
//! | coefficient table | `u64` count, then per entry `u64` cell index and `64 × f64`, ascending cells |
//! | box | min, max, three anchors, color `4 × u8`, target, rotation `9 × f64` row-major, cached mesh |
//! | mesh | `u8` flag, then `u64` vertex count, `3 × f64` each, `u64` face count, `3 × u32` each |
//! | collection | `u64` count followed by box records |
//!
//! Reading is transactional: a record is decoded completely into temporaries
//! before anything is handed out, so a failed [`Persist::read_into`] leaves
//! the destination untouched.

pub(crate) mod binary;

#[cfg(feature = "stl-io")]
mod stl;

use crate::collection::BoxCollection;
use crate::errors::SerializationError;
use crate::field::{self, CoefficientTable, FieldState, SignedDistanceField, WeightLevel};
use crate::fitbox::{BoxMesh, Color, FitBox};
use crate::float_types::parry3d::bounding_volume::Aabb;
use binary::*;
use nalgebra::Vector3;
use std::io::{Cursor, Read, Write};

/// A value with a binary representation.
pub trait Persist: Sized {
    fn write<W: Write>(&self, sink: &mut W) -> Result<(), SerializationError>;

    fn read<R: Read>(source: &mut R) -> Result<Self, SerializationError>;

    /// Replace `self` with the record read from `source`; on error `self` is
    /// left as it was.
    fn read_into<R: Read>(&mut self, source: &mut R) -> Result<(), SerializationError> {
        *self = Self::read(source)?;
        Ok(())
    }

    fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        let mut bytes = Vec::new();
        self.write(&mut bytes)?;
        Ok(bytes)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
        Self::read(&mut Cursor::new(bytes))
    }
}

impl Persist for SignedDistanceField {
    fn write<W: Write>(&self, sink: &mut W) -> Result<(), SerializationError> {
        for &r in &self.resolution {
            let r = u32::try_from(r).map_err(|_| {
                SerializationError::InvalidData(format!("resolution {r} exceeds the u32 range"))
            })?;
            write_u32(sink, r)?;
        }
        write_point(sink, &self.bounds.mins)?;
        write_point(sink, &self.bounds.maxs)?;
        write_f64s(sink, &self.signed_distances)?;
        write_f64s(sink, &self.weights)?;

        let entries = self.coefficients.entries();
        write_len(sink, entries.len())?;
        for (cell, block) in entries {
            write_len(sink, *cell)?;
            write_f64s(sink, block)?;
        }
        Ok(())
    }

    /// A record with coefficients is restored frozen with exactly the stored
    /// table; otherwise the state follows from the weights. The record carries
    /// no state, so a frozen field whose weights are all `STANDARD` (and whose
    /// table is therefore empty) comes back `Unclassified` and has to be
    /// frozen again before it can be optimized against. The target and the
    /// kernel are not part of the record.
    fn read<R: Read>(source: &mut R) -> Result<Self, SerializationError> {
        let mut resolution = [0usize; 3];
        for r in &mut resolution {
            *r = read_u32(source, "field resolution")? as usize;
        }
        let bounds = Aabb::new(
            read_point(source, "field bounds")?,
            read_point(source, "field bounds")?,
        );
        field::validate(resolution, &bounds)
            .map_err(|err| SerializationError::InvalidData(err.to_string()))?;

        let count = resolution
            .iter()
            .try_fold(1usize, |acc, &r| acc.checked_mul(r))
            .ok_or_else(|| SerializationError::InvalidData(format!("resolution {resolution:?} overflows")))?;
        let signed_distances = read_f64s(source, count, "signed distances")?;
        let weights = read_f64s(source, count, "weights")?;

        let cells = [resolution[0] - 1, resolution[1] - 1, resolution[2] - 1];
        let cell_count = cells[0] * cells[1] * cells[2];
        let entry_count = read_len(source, "coefficient count")?;
        if entry_count > cell_count {
            return Err(SerializationError::InvalidData(format!(
                "{entry_count} coefficient blocks for {cell_count} cells"
            )));
        }
        let mut entries = Vec::with_capacity(capacity_hint(entry_count));
        for _ in 0..entry_count {
            let cell = read_len(source, "coefficient cell")?;
            if cell >= cell_count || entries.last().is_some_and(|(last, _)| *last >= cell) {
                return Err(SerializationError::InvalidData(format!(
                    "coefficient cell {cell} is out of range or out of order"
                )));
            }
            let mut block = [0.0; 64];
            for c in &mut block {
                *c = read_f64(source, "coefficient block")?;
            }
            entries.push((cell, block));
        }

        let standard = WeightLevel::Standard.value();
        let state = if entry_count > 0 {
            FieldState::Frozen
        } else if weights.iter().any(|&w| w != standard) {
            FieldState::Classified
        } else {
            FieldState::Unclassified
        };

        Ok(SignedDistanceField {
            bounds,
            resolution,
            signed_distances,
            weights,
            coefficients: if entry_count > 0 {
                CoefficientTable::from_entries(cells, entries)
            } else {
                CoefficientTable::default()
            },
            target: Vector3::z(),
            kernel: None,
            state,
        })
    }
}

impl Persist for BoxMesh {
    fn write<W: Write>(&self, sink: &mut W) -> Result<(), SerializationError> {
        write_len(sink, self.vertices.len())?;
        for v in &self.vertices {
            write_point(sink, v)?;
        }
        write_len(sink, self.faces.len())?;
        for face in &self.faces {
            for &v in face {
                write_u32(sink, v)?;
            }
        }
        Ok(())
    }

    fn read<R: Read>(source: &mut R) -> Result<Self, SerializationError> {
        let vertex_count = read_len(source, "mesh vertex count")?;
        let mut vertices = Vec::with_capacity(capacity_hint(vertex_count));
        for _ in 0..vertex_count {
            vertices.push(read_point(source, "mesh vertex")?);
        }
        let face_count = read_len(source, "mesh face count")?;
        let mut faces = Vec::with_capacity(capacity_hint(face_count));
        for _ in 0..face_count {
            faces.push([
                read_u32(source, "mesh face")?,
                read_u32(source, "mesh face")?,
                read_u32(source, "mesh face")?,
            ]);
        }
        let mesh = BoxMesh::new(vertices, faces);
        if !mesh.is_valid() {
            return Err(SerializationError::InvalidData(
                "mesh face refers to a missing vertex".to_string(),
            ));
        }
        Ok(mesh)
    }
}

impl Persist for FitBox {
    fn write<W: Write>(&self, sink: &mut W) -> Result<(), SerializationError> {
        write_point(sink, &self.mins())?;
        write_point(sink, &self.maxs())?;
        for anchor in self.anchors() {
            write_point(sink, anchor)?;
        }
        for channel in self.color().to_array() {
            write_u8(sink, channel)?;
        }
        write_vector(sink, self.target())?;
        write_matrix(sink, self.rotation())?;
        write_bool(sink, self.piece().is_some())?;
        if let Some(piece) = self.piece() {
            piece.write(sink)?;
        }
        Ok(())
    }

    fn read<R: Read>(source: &mut R) -> Result<Self, SerializationError> {
        let mins = read_point(source, "box min")?;
        let maxs = read_point(source, "box max")?;
        let anchors = [
            read_point(source, "box anchor")?,
            read_point(source, "box anchor")?,
            read_point(source, "box anchor")?,
        ];
        let mut color = [0u8; 4];
        for channel in &mut color {
            *channel = read_u8(source, "box color")?;
        }
        let target = read_vector(source, "box target")?;
        let rotation = read_matrix(source, "box rotation")?;
        let piece = if read_bool(source, "box mesh flag")? {
            Some(BoxMesh::read(source)?)
        } else {
            None
        };

        let mut fit = FitBox::new(mins, maxs)
            .with_anchors(anchors)
            .with_color(Color::from_array(color))
            .with_target(target);
        fit.set_rotation(rotation);
        fit.set_piece(piece);
        Ok(fit)
    }
}

impl Persist for BoxCollection {
    fn write<W: Write>(&self, sink: &mut W) -> Result<(), SerializationError> {
        write_len(sink, self.len())?;
        for fit in self {
            fit.write(sink)?;
        }
        Ok(())
    }

    fn read<R: Read>(source: &mut R) -> Result<Self, SerializationError> {
        let count = read_len(source, "collection count")?;
        let mut boxes = Vec::with_capacity(capacity_hint(count));
        for _ in 0..count {
            boxes.push(FitBox::read(source)?);
        }
        Ok(BoxCollection::from(boxes))
    }
}
