//! Test support library
//! Provides field factories and comparison helpers shared by the integration tests.

use boxfit::{
    FitBox, SignedDistanceField,
    field::WeightLevel,
    float_types::{Real, parry3d::bounding_volume::Aabb},
};
use nalgebra::Point3;
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Quick helper to compare floating-point results with an acceptable tolerance.
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

pub fn cube_bounds(size: Real) -> Aabb {
    Aabb::new(Point3::origin(), Point3::new(size, size, size))
}

/// (5,5,5) over [0,4]³, `STANDARD` everywhere except the centre vertex.
pub fn centre_field() -> SignedDistanceField {
    let mut field = SignedDistanceField::new([5, 5, 5], cube_bounds(4.0)).unwrap();
    field
        .set_weight(2, 2, 2, WeightLevel::GuaranteedInterior)
        .unwrap();
    field.freeze().unwrap();
    field
}

pub fn sphere(p: &Point3<Real>) -> Real {
    (p - Point3::new(2.0, 2.0, 2.0)).norm() - 1.3
}

/// A sphere of radius 1.3 centred in [0,4]³, classified and frozen.
pub fn sphere_field(res: usize) -> SignedDistanceField {
    let mut field = SignedDistanceField::build([res, res, res], cube_bounds(4.0), &sphere).unwrap();
    let unit = field.unit();
    field.classify_border_weights(&sphere, 0.5 * unit).unwrap();
    field.freeze().unwrap();
    field
}

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// A random box strictly inside `bounds`, at least `margin` away from its
/// faces and with extents of at least `margin`.
pub fn random_inner_box(rng: &mut StdRng, bounds: &Aabb, margin: Real) -> FitBox {
    let mut lo = Point3::origin();
    let mut hi = Point3::origin();
    for axis in 0..3 {
        let min = bounds.mins[axis] + margin;
        let max = bounds.maxs[axis] - margin;
        let a = rng.gen_range(min..max - margin);
        let b = rng.gen_range(a + margin..max);
        lo[axis] = a;
        hi[axis] = b;
    }
    FitBox::new(lo, hi)
}
