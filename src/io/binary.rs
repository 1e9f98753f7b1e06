//! Little-endian primitives of the binary layout.

use crate::errors::SerializationError;
use crate::float_types::Real;
use nalgebra::{Matrix3, Point3, Vector3};
use std::io::{ErrorKind, Read, Write};

/// Upper bound on speculative preallocation while reading counted arrays.
const PREALLOCATION_LIMIT: usize = 1 << 16;

pub(crate) const fn capacity_hint(count: usize) -> usize {
    if count < PREALLOCATION_LIMIT { count } else { PREALLOCATION_LIMIT }
}

fn read_exact<R: Read>(source: &mut R, buf: &mut [u8], what: &'static str) -> Result<(), SerializationError> {
    source.read_exact(buf).map_err(|err| match err.kind() {
        ErrorKind::UnexpectedEof => SerializationError::Truncated(what),
        _ => SerializationError::Io(err),
    })
}

pub(crate) fn write_u8<W: Write>(sink: &mut W, value: u8) -> Result<(), SerializationError> {
    sink.write_all(&[value])?;
    Ok(())
}

pub(crate) fn write_bool<W: Write>(sink: &mut W, value: bool) -> Result<(), SerializationError> {
    write_u8(sink, u8::from(value))
}

pub(crate) fn write_u32<W: Write>(sink: &mut W, value: u32) -> Result<(), SerializationError> {
    sink.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_u64<W: Write>(sink: &mut W, value: u64) -> Result<(), SerializationError> {
    sink.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_len<W: Write>(sink: &mut W, len: usize) -> Result<(), SerializationError> {
    write_u64(sink, len as u64)
}

pub(crate) fn write_f64<W: Write>(sink: &mut W, value: Real) -> Result<(), SerializationError> {
    sink.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_f64s<W: Write>(sink: &mut W, values: &[Real]) -> Result<(), SerializationError> {
    for &value in values {
        write_f64(sink, value)?;
    }
    Ok(())
}

pub(crate) fn write_point<W: Write>(sink: &mut W, p: &Point3<Real>) -> Result<(), SerializationError> {
    write_f64s(sink, p.coords.as_slice())
}

pub(crate) fn write_vector<W: Write>(sink: &mut W, v: &Vector3<Real>) -> Result<(), SerializationError> {
    write_f64s(sink, v.as_slice())
}

/// Row-major.
pub(crate) fn write_matrix<W: Write>(sink: &mut W, m: &Matrix3<Real>) -> Result<(), SerializationError> {
    for r in 0..3 {
        for c in 0..3 {
            write_f64(sink, m[(r, c)])?;
        }
    }
    Ok(())
}

pub(crate) fn read_u8<R: Read>(source: &mut R, what: &'static str) -> Result<u8, SerializationError> {
    let mut buf = [0u8; 1];
    read_exact(source, &mut buf, what)?;
    Ok(buf[0])
}

pub(crate) fn read_bool<R: Read>(source: &mut R, what: &'static str) -> Result<bool, SerializationError> {
    match read_u8(source, what)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(SerializationError::InvalidData(format!(
            "{what}: flag byte {other} is neither 0 nor 1"
        ))),
    }
}

pub(crate) fn read_u32<R: Read>(source: &mut R, what: &'static str) -> Result<u32, SerializationError> {
    let mut buf = [0u8; 4];
    read_exact(source, &mut buf, what)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_u64<R: Read>(source: &mut R, what: &'static str) -> Result<u64, SerializationError> {
    let mut buf = [0u8; 8];
    read_exact(source, &mut buf, what)?;
    Ok(u64::from_le_bytes(buf))
}

pub(crate) fn read_len<R: Read>(source: &mut R, what: &'static str) -> Result<usize, SerializationError> {
    let len = read_u64(source, what)?;
    usize::try_from(len)
        .map_err(|_| SerializationError::InvalidData(format!("{what}: count {len} does not fit in memory")))
}

pub(crate) fn read_f64<R: Read>(source: &mut R, what: &'static str) -> Result<Real, SerializationError> {
    let mut buf = [0u8; 8];
    read_exact(source, &mut buf, what)?;
    Ok(Real::from_le_bytes(buf))
}

pub(crate) fn read_f64s<R: Read>(
    source: &mut R,
    count: usize,
    what: &'static str,
) -> Result<Vec<Real>, SerializationError> {
    let mut values = Vec::with_capacity(capacity_hint(count));
    for _ in 0..count {
        values.push(read_f64(source, what)?);
    }
    Ok(values)
}

pub(crate) fn read_point<R: Read>(source: &mut R, what: &'static str) -> Result<Point3<Real>, SerializationError> {
    Ok(Point3::new(
        read_f64(source, what)?,
        read_f64(source, what)?,
        read_f64(source, what)?,
    ))
}

pub(crate) fn read_vector<R: Read>(source: &mut R, what: &'static str) -> Result<Vector3<Real>, SerializationError> {
    Ok(read_point(source, what)?.coords)
}

pub(crate) fn read_matrix<R: Read>(source: &mut R, what: &'static str) -> Result<Matrix3<Real>, SerializationError> {
    let mut m = Matrix3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            m[(r, c)] = read_f64(source, what)?;
        }
    }
    Ok(m)
}
