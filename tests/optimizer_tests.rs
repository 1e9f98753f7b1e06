mod support;

use boxfit::{
    BoxCollection, EnergyModel, FitBox, Optimizer, OptimizerConfig,
    float_types::Real,
    optimizer::{IterationTrace, Status},
};
use nalgebra::Point3;

use crate::support::{centre_field, sphere_field};

#[test]
fn full_box_shrinks_around_the_centre() {
    let field = centre_field();
    let mut fit = FitBox::full_domain(&field);
    let initial_volume = fit.volume();

    let result = Optimizer::default()
        .gradient_descent(&field, &mut fit, None)
        .unwrap();

    assert!(result.energy < result.initial_energy);
    assert!(result.accepted > 0);
    assert!(fit.volume() < initial_volume);
    assert!(fit.contains_point(&Point3::new(2.0, 2.0, 2.0)));
    for axis in 0..3 {
        assert!(fit.mins()[axis] > 0.0 && fit.maxs()[axis] < 4.0);
    }
}

#[test]
fn recorded_trace_is_monotone() {
    let field = sphere_field(9);
    let optimizer = Optimizer::default();
    let seeds = [
        FitBox::full_domain(&field),
        FitBox::seed(Point3::new(2.0, 2.0, 2.0), 0.4),
        FitBox::new(Point3::new(0.5, 1.0, 1.5), Point3::new(3.0, 2.5, 3.5)),
    ];
    for mut fit in seeds {
        let start = fit.clone();
        let mut trace = IterationTrace::new();
        let result = optimizer
            .gradient_descent(&field, &mut fit, Some(&mut trace))
            .unwrap();

        assert_eq!(trace.boxes()[0], start);
        assert_eq!(trace.len(), result.accepted + 1);
        for pair in trace.energies().windows(2) {
            assert!(pair[1] < pair[0], "energy rose from {} to {}", pair[0], pair[1]);
        }
        assert_eq!(trace.last(), Some(&fit));
    }
}

#[test]
fn iteration_cap_is_a_status() {
    let field = sphere_field(9);
    let config = OptimizerConfig::builder().max_iterations(5).build();
    let optimizer = Optimizer::new(config, EnergyModel::default());
    let mut fit = FitBox::full_domain(&field);
    let result = optimizer.gradient_descent(&field, &mut fit, None).unwrap();
    assert_eq!(result.status, Status::IterationCap);
    assert_eq!(result.iterations, 5);
}

#[test]
fn boxes_keep_a_minimum_extent() {
    let field = sphere_field(9);
    let config = OptimizerConfig::builder().min_extent(0.25).build();
    let optimizer = Optimizer::new(config, EnergyModel::default());
    // a box out in the exterior collapses as far as it may
    let mut fit = FitBox::new(Point3::new(0.0, 0.0, 0.0), Point3::new(0.5, 0.5, 0.5));
    optimizer.gradient_descent(&field, &mut fit, None).unwrap();
    for e in fit.extents().iter() {
        assert!(*e >= 0.25);
    }
}

#[test]
fn batch_results_match_sequential_runs() {
    let field = sphere_field(9);
    let optimizer = Optimizer::default();
    let seeds: Vec<FitBox> = (0..16)
        .map(|i| {
            let t = i as Real / 15.0;
            FitBox::seed(Point3::new(1.2 + 1.6 * t, 2.0, 2.8 - 1.6 * t), 0.3 + 0.1 * t)
        })
        .collect();

    let mut sequential = seeds.clone();
    let expected: Vec<_> = sequential
        .iter_mut()
        .map(|fit| optimizer.gradient_descent(&field, fit, None).unwrap())
        .collect();

    let mut batch = BoxCollection::from(seeds.clone()).with_worker_threads(4);
    let results = batch.minimize_all(&field, &optimizer).unwrap();
    assert_eq!(results, expected);
    assert_eq!(batch.boxes(), sequential.as_slice());

    // order of the batch does not change any individual result
    let mut reversed: BoxCollection = seeds.into_iter().rev().collect();
    let mut reversed_results = reversed.minimize_all(&field, &optimizer).unwrap();
    reversed_results.reverse();
    assert_eq!(reversed_results, expected);
    let reversed_boxes: Vec<FitBox> = reversed.into_boxes().into_iter().rev().collect();
    assert_eq!(reversed_boxes, sequential);
}

#[test]
fn small_batches_run_serially_with_the_same_results() {
    let field = centre_field();
    let optimizer = Optimizer::default();
    let seeds = vec![
        FitBox::seed(Point3::new(2.0, 2.0, 2.0), 1.0),
        FitBox::seed(Point3::new(1.5, 2.5, 2.0), 0.5),
    ];
    let mut batch = BoxCollection::from(seeds.clone());
    let results = batch.minimize_all(&field, &optimizer).unwrap();
    for ((seed, fit), result) in seeds.into_iter().zip(batch.iter()).zip(&results) {
        let mut single = seed;
        let expected = optimizer.gradient_descent(&field, &mut single, None).unwrap();
        assert_eq!(*result, expected);
        assert_eq!(&single, fit);
    }
}
