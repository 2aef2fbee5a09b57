//! Fits of noisy synthetic imaging datasets

use ndarray::Axis;
use odmrfit_rs::synthetic::make_dummy_data;
use odmrfit_rs::{Fit, FitState, ModelKind};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const NOISE: f64 = 0.0002;

/// Fit a noisy 2x2 dataset and compare the center map against the truth.
fn fit_and_compare(model: ModelKind, seed: u64) -> Fit {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let dummy = make_dummy_data(model, 101, (2, 2), NOISE, &mut rng).unwrap();

    let mut fit = Fit::new(dummy.data, dummy.frequencies, model.name())
        .unwrap()
        .with_scan_dimensions(2, 2)
        .unwrap();
    fit.fit().unwrap();

    let centers = fit.param("center").unwrap();
    assert_eq!(centers.shape(), &[2, 2, 2, 2]);

    let truth = dummy.parameters.index_axis(Axis(3), 0);
    for p in 0..2 {
        for r in 0..2 {
            for pixel in 0..4 {
                let fitted = f64::from(centers[[p, r, pixel / 2, pixel % 2]]);
                let expected = truth[[p, r, pixel]];
                assert!(
                    (fitted - expected).abs() < 5e-5,
                    "{} pol {} range {} pixel {}: {} vs {}",
                    model,
                    p,
                    r,
                    pixel,
                    fitted,
                    expected
                );
            }
        }
    }

    let states = fit.states().unwrap();
    assert!(states.iter().all(|&s| s != FitState::SingularHessian.code()));
    fit
}

#[test]
fn test_esr14n_grid() {
    let fit = fit_and_compare(ModelKind::Esr14n, 42);
    assert_eq!(fit.parameters().unwrap().shape(), &[2, 2, 2, 2, 6]);
}

#[test]
fn test_esr15n_grid() {
    let fit = fit_and_compare(ModelKind::Esr15n, 7);

    let mean = fit.param("mean_contrast").unwrap();
    assert!(mean.iter().all(|&c| (c - 0.01).abs() < 0.002), "{:?}", mean);
}

#[test]
fn test_polarizations_split_in_opposite_directions() {
    let fit = fit_and_compare(ModelKind::EsrSingle, 5);
    let centers = fit.param("resonance").unwrap();

    for r in 0..2 {
        let low = centers[[0, r, 0, 0]];
        let high = centers[[1, r, 0, 0]];
        assert!(high > low, "range {}: {} <= {}", r, high, low);
    }
}

#[test]
fn test_detected_model_matches_generator() {
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let dummy = make_dummy_data(ModelKind::Esr14n, 201, (1, 2), NOISE, &mut rng).unwrap();

    let fit = Fit::new(dummy.data, dummy.frequencies, "ESRSINGLE").unwrap();
    let guess = fit.detect_model().unwrap();

    assert_eq!(guess.n_peaks, 3);
    assert_eq!(guess.model, Some(ModelKind::Esr14n));
}
