// Re-export parry for the f64 scalar the field math runs on
pub use parry3d_f64 as parry3d;

// Our Real scalar type. The tricubic finite differences and the gradient
// oracle need double precision, so there is no f32 build.
pub type Real = f64;

use core::str::FromStr;
use std::sync::OnceLock;

/// Lazily-initialized tolerance used across the crate.
/// Can be overridden:
///  1) **Build-time**: set env var `BOXFIT_TOLERANCE` (e.g. `BOXFIT_TOLERANCE=1e-8 cargo build`)
///  2) **Runtime**: call [`set_tolerance`] once before using the library
static TOLERANCE_CELL: OnceLock<Real> = OnceLock::new();

#[inline]
const fn default_tolerance() -> Real {
    1e-6
}

/// Returns the current tolerance.
/// If not set yet, it tries `BOXFIT_TOLERANCE` (parsed as `Real`) and
/// falls back to a sensible default.
pub fn tolerance() -> Real {
    *TOLERANCE_CELL.get_or_init(|| {
        // Compile-time env if provided, inherited by dependencies
        if let Some(environment_variable) = option_env!("BOXFIT_TOLERANCE") {
            if let Ok(value) = Real::from_str(environment_variable) {
                return value.max(Real::EPSILON);
            }
        }
        default_tolerance()
    })
}

/// Set the tolerance programmatically once (subsequent calls are ignored).
/// Call near program start: `boxfit::float_types::set_tolerance(1e-8);`
pub fn set_tolerance(value: Real) {
    let _ = TOLERANCE_CELL.set(value.max(Real::EPSILON));
}

/// Dot product below which a patch face counts as flipped against its
/// target direction.
pub const FLIP_ANGLE: Real = 0.0;
