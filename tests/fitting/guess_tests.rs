//! Tests for the InitialGuessEngine

use crate::test_helpers::single_pixel;
use approx::assert_relative_eq;
use ndarray::{s, Array2, Array4, ArrayView1};
use odmrfit_rs::config::DegeneratePolicy;
use odmrfit_rs::synthetic::make_dummy_data;
use odmrfit_rs::models::{AHYP_14N, AHYP_15N};
use odmrfit_rs::{InitialGuessEngine, ModelKind, OdmrFitError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[test]
fn test_center_and_width_on_clean_dip() {
    let width = 0.0002;
    let (data, freqs) = single_pixel(ModelKind::EsrSingle, &[2.84512, width, 0.02, 0.0], 201);
    let bin = 0.01 / 200.0;

    let engine = InitialGuessEngine::new(ModelKind::EsrSingle, DegeneratePolicy::Error);
    let seeds = engine.guess(data.view(), freqs.view()).unwrap();
    let seed: ArrayView1<f32> = seeds.slice(s![0, 0, 0, ..]);

    assert!((f64::from(seed[0]) - 2.84512).abs() <= bin, "center {}", seed[0]);
    assert_relative_eq!(3.0 * f64::from(seed[1]), width, max_relative = 0.2);
    assert_relative_eq!(f64::from(seed[2]), 0.9 * 0.02, max_relative = 0.05);
    assert_eq!(seed[3], 0.0);
}

/// Interquartile span of the cumulative deficit of each model's line shape.
///
/// Multiplet quartiles sit on the outer lines, so their span follows the
/// hyperfine splitting rather than the linewidth.
fn reference_span(model: ModelKind, width: f64) -> f64 {
    match model {
        ModelKind::EsrSingle => 2.0 * width,
        ModelKind::Gauss1d => 1.349 * width,
        ModelKind::Esr15n => 2.0 * AHYP_15N,
        ModelKind::Esr14n => 2.0 * AHYP_14N,
    }
}

#[test]
fn test_seeds_of_every_model() {
    let bin = 0.01 / 200.0;
    let cases = [(2.845, 0.0002), (2.84512, 0.0002), (2.845, 0.0003), (2.8447, 0.0003)];

    for model in ModelKind::ALL {
        let engine = InitialGuessEngine::new(model, DegeneratePolicy::Error);

        for (center, width) in cases {
            let mut params = vec![center, width];
            params.extend(std::iter::repeat(0.01).take(model.n_peaks()));
            params.push(0.0);
            let (data, freqs) = single_pixel(model, &params, 201);

            let seeds = engine.guess(data.view(), freqs.view()).unwrap();
            let seed: ArrayView1<f32> = seeds.slice(s![0, 0, 0, ..]);

            assert!(
                (f64::from(seed[0]) - center).abs() <= bin,
                "{} center {} vs {}",
                model,
                seed[0],
                center
            );
            assert_relative_eq!(
                6.0 * f64::from(seed[1]),
                reference_span(model, width),
                max_relative = 0.2
            );
        }
    }
}

#[test]
fn test_every_contrast_slot_gets_the_same_seed() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let dummy = make_dummy_data(ModelKind::Esr14n, 101, (1, 3), 0.0, &mut rng).unwrap();

    let engine = InitialGuessEngine::new(ModelKind::Esr14n, DegeneratePolicy::Error);
    let seeds = engine.guess(dummy.data.view(), dummy.frequencies.view()).unwrap();

    assert_eq!(seeds.dim(), (2, 2, 3, 6));
    for seed in seeds.lanes(ndarray::Axis(3)) {
        assert_eq!(seed[2], seed[3]);
        assert_eq!(seed[3], seed[4]);
        assert!(seed[2] > 0.0);
    }
    // The high window is seeded from its own axis.
    assert!(seeds[[0, 1, 0, 0]] > 2.89);
    assert!(seeds[[0, 0, 0, 0]] < 2.85);
}

#[test]
fn test_flat_spectrum_policies() {
    let freqs = Array2::from_shape_fn((1, 30), |(_, j)| 2.84 + 0.0005 * j as f64);
    let mut data = Array4::<f64>::ones((1, 1, 4, 30));
    data[[0, 0, 0, 10]] = 0.98;
    data[[0, 0, 1, 12]] = 0.97;
    data[[0, 0, 3, 14]] = 0.99;

    let strict = InitialGuessEngine::new(ModelKind::EsrSingle, DegeneratePolicy::Error);
    match strict.guess(data.view(), freqs.view()) {
        Err(OdmrFitError::NumericalGuess {
            polarization,
            frequency_range,
            pixel,
            ..
        }) => assert_eq!((polarization, frequency_range, pixel), (0, 0, 2)),
        other => panic!("Expected NumericalGuess error, got {:?}", other),
    }

    let lenient = InitialGuessEngine::new(ModelKind::EsrSingle, DegeneratePolicy::Fallback);
    let seeds = lenient.guess(data.view(), freqs.view()).unwrap();
    assert!(seeds.iter().all(|v| v.is_finite()));
    assert_relative_eq!(seeds[[0, 0, 2, 0]], (2.84 + 2.84 + 0.0145) as f32 / 2.0, epsilon = 1e-6);
    assert_relative_eq!(seeds[[0, 0, 2, 1]], 0.0005f32, epsilon = 1e-9);
}

#[test]
fn test_non_finite_spectrum() {
    let (mut data, freqs) = single_pixel(ModelKind::EsrSingle, &[2.845, 0.0005, 0.02, 0.0], 40);
    data[[0, 0, 0, 5]] = f64::NAN;

    let engine = InitialGuessEngine::new(ModelKind::EsrSingle, DegeneratePolicy::Error);
    assert!(matches!(
        engine.guess(data.view(), freqs.view()),
        Err(OdmrFitError::NumericalGuess { .. })
    ));
}
