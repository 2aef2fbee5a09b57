//! Tests for the Fit state machine

use crate::test_helpers::{single_pixel, CountingSolver, FailingSolver, UnavailableSolver};
use approx::assert_relative_eq;
use ndarray::{Array1, Array2, Array4, Axis};
use odmrfit_rs::{FitState, ModelKind, OdmrFitError};
use odmrfit_rs::{ConstraintKind, Fit};
use std::sync::atomic::Ordering;

/// `[1, n_range, n_pixel, 60]` dataset whose dips move with the pixel index.
fn shifted_dips(n_range: usize, n_pixel: usize) -> (Array4<f64>, Array2<f64>) {
    let freqs = Array2::from_shape_fn((n_range, 60), |(r, j)| 2.84 + 0.05 * r as f64 + j as f64 * 0.01 / 59.0);
    let mut data = Array4::zeros((1, n_range, n_pixel, 60));

    for r in 0..n_range {
        let axis = freqs.row(r);
        for pixel in 0..n_pixel {
            let center = axis[10] + 0.0012 * pixel as f64;
            let spectrum = ModelKind::EsrSingle
                .evaluate(axis, &[center, 0.0003, 0.02, 0.0])
                .unwrap();
            data.slice_mut(ndarray::s![0, r, pixel, ..]).assign(&spectrum);
        }
    }
    (data, freqs)
}

#[test]
fn test_unknown_model() {
    let (data, freqs) = single_pixel(ModelKind::EsrSingle, &[2.845, 0.0001, 0.01, 0.0], 50);
    match Fit::new(data, freqs, "FOO") {
        Err(OdmrFitError::Configuration(msg)) => assert!(msg.contains("FOO")),
        other => panic!("Expected Configuration error, got {:?}", other),
    }
}

#[test]
fn test_shape_validation() {
    let (data, _) = single_pixel(ModelKind::EsrSingle, &[2.845, 0.0001, 0.01, 0.0], 50);
    let short = Array1::linspace(2.84, 2.85, 49).insert_axis(Axis(0));
    assert!(matches!(
        Fit::new(data.clone(), short, "ESRSINGLE"),
        Err(OdmrFitError::InvalidInput(_))
    ));

    let freqs = Array1::linspace(2.84, 2.85, 50).insert_axis(Axis(0));
    let fit = Fit::new(data, freqs, "ESRSINGLE").unwrap();
    assert!(matches!(fit.with_scan_dimensions(2, 2), Err(OdmrFitError::InvalidInput(_))));
}

#[test]
fn test_results_before_fit() {
    let (data, freqs) = single_pixel(ModelKind::EsrSingle, &[2.845, 0.0001, 0.01, 0.0], 50);
    let fit = Fit::new(data, freqs, "ESRSINGLE").unwrap();

    assert!(!fit.fitted());
    assert!(fit.result().is_none());
    assert!(matches!(fit.chi_squares(), Err(OdmrFitError::ParameterLookup(_))));
    assert!(matches!(fit.param("center"), Err(OdmrFitError::ParameterLookup(_))));
    assert!(matches!(fit.param("chi2"), Err(OdmrFitError::ParameterLookup(_))));
    assert!(fit.parameters().is_err());
}

#[test]
fn test_second_fit_is_a_no_op() {
    let (data, freqs) = shifted_dips(2, 3);
    let (solver, calls) = CountingSolver::new();
    let mut fit = Fit::new(data.clone(), freqs, "ESRSINGLE")
        .unwrap()
        .with_solver(Box::new(solver))
        .unwrap();

    fit.fit().unwrap();
    assert!(fit.fitted());
    // One batched call per frequency range.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let first = fit.result().unwrap().clone();

    fit.fit().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(fit.result().unwrap(), &first);

    // Equal data keeps the results.
    fit.set_data(data.clone()).unwrap();
    assert!(fit.fitted());

    let mut changed = data;
    changed[[0, 0, 0, 0]] -= 0.001;
    fit.set_data(changed).unwrap();
    assert!(!fit.fitted());

    fit.fit().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn test_mutations_invalidate_results() {
    let (data, freqs) = shifted_dips(1, 2);
    let mut fit = Fit::new(data, freqs.clone(), "ESRSINGLE").unwrap();

    fit.fit().unwrap();
    fit.set_constraints("width", 0.0, 0.01, "LOWER_UPPER").unwrap();
    assert!(!fit.fitted());

    fit.fit().unwrap();
    fit.set_free_constraints();
    assert!(!fit.fitted());
    assert!(fit.constraints().get_constraint_types().iter().all(|&k| k == 0));

    fit.fit().unwrap();
    fit.set_frequencies(&freqs + 0.0001).unwrap();
    assert!(!fit.fitted());

    fit.fit().unwrap();
    fit.set_model("ESR15N").unwrap();
    assert!(!fit.fitted());
    assert_eq!(fit.model(), ModelKind::Esr15n);
}

#[test]
fn test_invalid_constraint_keeps_results() {
    let (data, freqs) = shifted_dips(1, 2);
    let mut fit = Fit::new(data, freqs, "ESRSINGLE").unwrap();
    fit.fit().unwrap();

    assert!(matches!(
        fit.set_constraints("width", 0.0, 0.01, "SOMETIMES"),
        Err(OdmrFitError::Configuration(_))
    ));
    assert!(matches!(
        fit.set_constraints("height", 0.0, 0.01, 3usize),
        Err(OdmrFitError::ParameterLookup(_))
    ));
    assert!(fit.fitted());
}

#[test]
fn test_set_model_carries_shared_constraints() {
    let (data, freqs) = shifted_dips(1, 1);
    let mut fit = Fit::new(data, freqs, "ESRSINGLE")
        .unwrap()
        .with_constraints([
            ("center", 2.84, 2.85, ConstraintKind::LowerUpper),
            ("offset", -0.01, 0.01, ConstraintKind::LowerUpper),
        ])
        .unwrap();

    fit.set_model("esr14n").unwrap();
    assert_eq!(
        fit.slot_names(),
        ["center", "width", "contrast_0", "contrast_1", "contrast_2", "offset"]
    );
    let center = fit.constraints().get("center").unwrap();
    assert_eq!((center.min, center.max, center.kind), (2.84, 2.85, ConstraintKind::LowerUpper));
    assert_eq!(fit.constraints().get("offset").unwrap().min, -0.01);
    assert_eq!(fit.constraints().get("contrast_2").unwrap().max, 1.0);

    assert!(fit.set_model("ESR13C").is_err());
    assert_eq!(fit.model(), ModelKind::Esr14n);
}

#[test]
fn test_failed_backend_leaves_instance_unfitted() {
    let (data, freqs) = shifted_dips(2, 2);
    let mut fit = Fit::new(data, freqs, "ESRSINGLE")
        .unwrap()
        .with_solver(Box::new(FailingSolver::new(1)))
        .unwrap();

    // The first range succeeds and the second fails.
    assert!(matches!(fit.fit(), Err(OdmrFitError::FittingBackend(_))));
    assert!(!fit.fitted());
    assert!(fit.states().is_err());
}

#[test]
fn test_unavailable_backend() {
    let (data, freqs) = shifted_dips(1, 1);
    let fit = Fit::new(data, freqs, "ESRSINGLE").unwrap();
    assert!(matches!(
        fit.with_solver(Box::new(UnavailableSolver)),
        Err(OdmrFitError::FittingBackend(_))
    ));
}

#[test]
fn test_rows_return_to_their_pixels() {
    let (data, freqs) = shifted_dips(2, 6);
    let mut fit = Fit::new(data, freqs, "ESRSINGLE")
        .unwrap()
        .with_scan_dimensions(2, 3)
        .unwrap()
        .with_solver(Box::new(FailingSolver::new(usize::MAX)))
        .unwrap();

    let seeds = fit.initial_parameters().unwrap().clone();
    fit.fit().unwrap();

    let parameters = fit.parameters().unwrap();
    assert_eq!(parameters.shape(), &[1, 2, 2, 3, 4]);
    for r in 0..2 {
        for pixel in 0..6 {
            for slot in 0..4 {
                assert_eq!(
                    parameters[[0, r, pixel / 3, pixel % 3, slot]],
                    seeds[[0, r, pixel, slot]]
                );
            }
        }
    }

    // Centers increase along the row-major pixel order.
    let centers = fit.param("resonance").unwrap();
    assert_eq!(centers.shape(), &[1, 2, 2, 3]);
    assert!(centers[[0, 0, 1, 0]] > centers[[0, 0, 0, 2]]);

    let result = fit.result().unwrap();
    assert_eq!(result.count_state(FitState::MaxIteration), 12);
    assert_eq!(result.count_state(FitState::Converged), 0);
    assert_eq!(result.execution_times.len(), 2);
}

#[test]
fn test_param_names_for_multiplets() {
    let (data, freqs) = shifted_dips(1, 2);
    let mut fit = Fit::new(data, freqs, "ESR15N")
        .unwrap()
        .with_solver(Box::new(FailingSolver::new(usize::MAX)))
        .unwrap();
    fit.fit().unwrap();

    let c0 = fit.param("contrast_0").unwrap();
    let c1 = fit.param("contrast_1").unwrap();
    let mean = fit.param("mean_contrast").unwrap();
    for ((a, b), m) in c0.iter().zip(c1.iter()).zip(mean.iter()) {
        assert_relative_eq!(*m, (a + b) / 2.0, epsilon = 1e-7);
    }

    assert!(matches!(fit.param("contrast"), Err(OdmrFitError::ParameterLookup(_))));
    assert!(matches!(fit.param("contrast_2"), Err(OdmrFitError::ParameterLookup(_))));
    assert_eq!(&fit.param("chi_squared").unwrap(), fit.chi_squares().unwrap());

    assert_eq!(fit.unit("center").unwrap(), "GHz");
    assert_eq!(fit.unit("mean_contrast").unwrap(), "a.u.");
    assert_eq!(fit.unit("chi2").unwrap(), "a.u.");
}

#[test]
fn test_squeezed_parameters_and_summary() {
    let (data, freqs) = single_pixel(ModelKind::EsrSingle, &[2.845, 0.0003, 0.02, 0.0], 60);
    let mut fit = Fit::new(data, freqs, "ESRSINGLE").unwrap();
    fit.fit().unwrap();

    assert_eq!(fit.result().unwrap().squeezed_parameters().shape(), &[4]);

    let summary = fit.to_string();
    assert!(summary.contains("ESRSINGLE"));
    assert!(summary.contains("fitted: true"));
    assert!(summary.contains("LOWER_UPPER"));
}
