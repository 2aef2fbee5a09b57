//! Tests for the model registry and model detection

use approx::assert_relative_eq;
use ndarray::{concatenate, s, Array1, Axis};
use odmrfit_rs::models::{find_dips, AHYP_14N};
use odmrfit_rs::synthetic::make_dummy_data;
use odmrfit_rs::{full_model, guess_model, ModelKind, OdmrFitError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[test]
fn test_unknown_model_is_configuration_error() {
    match "FOO".parse::<ModelKind>() {
        Err(OdmrFitError::Configuration(msg)) => assert!(msg.contains("ESRSINGLE")),
        other => panic!("Expected Configuration error, got {:?}", other),
    }
    assert_eq!("esrsingle".parse::<ModelKind>().unwrap(), ModelKind::EsrSingle);
}

#[test]
fn test_triplet_minimum_at_each_line() {
    let x = Array1::from_vec(vec![2.87 - AHYP_14N, 2.87, 2.87 + AHYP_14N, 2.95]);
    let y = ModelKind::Esr14n
        .evaluate(x.view(), &[2.87, 0.0001, 0.01, 0.02, 0.03, 0.0])
        .unwrap();

    // Lines are far apart compared to the width, so each dip is almost pure.
    assert_relative_eq!(y[0], 1.0 - 0.03, epsilon = 1e-4);
    assert_relative_eq!(y[1], 1.0 - 0.02, epsilon = 1e-4);
    assert_relative_eq!(y[2], 1.0 - 0.01, epsilon = 1e-4);
    assert_relative_eq!(y[3], 1.0, epsilon = 1e-4);
}

#[test]
fn test_wrong_parameter_count() {
    let x = Array1::linspace(2.84, 2.85, 5);
    assert!(matches!(
        ModelKind::Esr15n.evaluate(x.view(), &[2.845, 0.0001, 0.01, 0.0]),
        Err(OdmrFitError::InvalidInput(_))
    ));
}

#[test]
fn test_full_model_evaluates_each_window() {
    let low = Array1::linspace(2.84, 2.85, 40);
    let high = Array1::linspace(2.89, 2.90, 40);
    let freqs = concatenate(Axis(0), &[low.view(), high.view()]).unwrap();
    let params = [2.845, 0.0002, 0.01, 0.0];

    let y = full_model("ESRSINGLE", freqs.view(), &params).unwrap();
    assert_eq!(y.len(), 80);

    let expected_low = ModelKind::EsrSingle.evaluate(low.view(), &params).unwrap();
    let expected_high = ModelKind::EsrSingle.evaluate(high.view(), &params).unwrap();
    assert_eq!(y.slice(s![..40]), expected_low);
    assert_eq!(y.slice(s![40..]), expected_high);

    assert!(full_model("FOO", freqs.view(), &params).is_err());
}

#[test]
fn test_guess_model_on_synthetic_data() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    for (model, n_peaks) in [(ModelKind::Esr14n, 3), (ModelKind::Esr15n, 2)] {
        let dummy = make_dummy_data(model, 201, (2, 2), 0.0, &mut rng).unwrap();
        let guess = guess_model(dummy.data.view().into_dyn(), 0.002).unwrap();

        assert_eq!(guess.n_peaks, n_peaks);
        assert!(!guess.doubt);
        assert_eq!(guess.model, Some(model));
    }
}

#[test]
fn test_guess_model_flags_disagreement() {
    let x = Array1::linspace(2.84, 2.85, 201);
    let single = ModelKind::EsrSingle
        .evaluate(x.view(), &[2.845, 0.0001, 0.01, 0.0])
        .unwrap();
    let doublet = ModelKind::Esr15n
        .evaluate(x.view(), &[2.845, 0.0001, 0.01, 0.01, 0.0])
        .unwrap();
    let spectra = ndarray::stack(Axis(0), &[single.view(), doublet.view(), doublet.view()]).unwrap();

    let guess = guess_model(spectra.view().into_dyn(), 0.002).unwrap();
    assert!(guess.doubt);
    // mean of (1, 2, 2) rounds to 2
    assert_eq!(guess.n_peaks, 2);

    assert_eq!(find_dips(single.view(), 0.002).len(), 1);
    assert!(find_dips(single.view(), 0.05).is_empty());
}
