// main.rs
//
// Fit a handful of boxes to a rounded solid and write them out as STL.

use boxfit::{
    BoxCollection, FitBox, FittingSession, Optimizer, Persist, SignedDistanceField,
    float_types::{Real, parry3d::bounding_volume::Aabb},
    optimizer::IterationTrace,
};
use nalgebra::{Point3, Vector3};
use std::fs;

// A capsule along z, radius 1, half length 1.5
fn capsule(p: &Point3<Real>) -> Real {
    let z = p.z.clamp(-1.5, 1.5);
    (p - Point3::new(0.0, 0.0, z)).norm() - 1.0
}

fn main() -> Result<(), boxfit::Error> {
    // Ensure the /stl folder exists
    let _ = fs::create_dir_all("stl");

    let bounds = Aabb::new(Point3::new(-1.5, -1.5, -3.0), Point3::new(1.5, 1.5, 3.0));
    let mut field = SignedDistanceField::build([13, 13, 25], bounds, &capsule)?;
    field.set_target(Vector3::z());
    let summary = field.classify_and_freeze(&capsule, 0.5, 0.125)?;
    println!("classified vertices: {summary:?}");

    // 1) the whole domain shrinks onto the solid
    let optimizer = Optimizer::default();
    let mut fit = FitBox::full_domain(&field);
    let mut trace = IterationTrace::new();
    let result = optimizer.gradient_descent(&field, &mut fit, Some(&mut trace))?;
    println!(
        "full box: {:?} after {} iterations, energy {:.4} -> {:.4}, {} boxes traced",
        result.status,
        result.iterations,
        result.initial_energy,
        result.energy,
        trace.len()
    );
    fit.generate_piece(0.25);
    #[cfg(feature = "stl-io")]
    let _ = fs::write("stl/full_box.stl", fit.to_stl_ascii("full_box"));

    // 2) seeds along the axis, optimized as one batch
    let mut boxes: BoxCollection = (0..12)
        .map(|i| FitBox::seed(Point3::new(0.0, 0.0, -2.2 + 0.4 * i as Real), 0.3))
        .collect();
    let results = boxes.minimize_all(&field, &optimizer)?;
    for (i, (fit, result)) in boxes.iter().zip(&results).enumerate() {
        println!(
            "seed {i}: {:?}, extents {:.3?}",
            result.status,
            fit.extents().as_slice()
        );
    }
    boxes.generate_pieces(0.0);
    #[cfg(feature = "stl-io")]
    let _ = boxes
        .to_stl_binary("seeds")
        .and_then(|bytes| fs::write("stl/seeds.stl", bytes));

    // 3) keep everything in one session file
    let mut session = FittingSession::new(field);
    session.active = fit;
    session.solutions = Some(boxes);
    let bytes = session.to_bytes()?;
    let restored = FittingSession::from_bytes(&bytes)?;
    println!(
        "session: {} bytes, {} solutions restored",
        bytes.len(),
        restored.solutions.as_ref().map_or(0, BoxCollection::len)
    );

    Ok(())
}
