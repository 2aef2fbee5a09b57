//! Synthetic ODMR datasets with known parameters.
//!
//! Both polarizations share a model and line shape; their centers sit 0.1 MHz
//! below and above the middle of each frequency window, as a bias field of
//! opposite sign would shift them.

use crate::error::{OdmrFitError, Result};
use crate::models::ModelKind;
use crate::parameters::ParameterKind;
use ndarray::{Array1, Array2, Array4};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Low and high frequency windows in GHz.
pub const FREQUENCY_WINDOWS: [(f64, f64); 2] = [(2.84, 2.85), (2.89, 2.90)];

/// Center shift applied per polarization, in GHz.
pub const POLARIZATION_SPLIT: f64 = 0.0001;

pub const TRUE_WIDTH: f64 = 0.0001;
pub const TRUE_CONTRAST: f64 = 0.01;
pub const TRUE_OFFSET: f64 = 0.0;

/// A synthetic dataset and the parameters it was generated from.
#[derive(Debug, Clone)]
pub struct DummyData {
    /// `[polarization, frequency_range, pixel, freq_bin]`
    pub data: Array4<f64>,
    /// `[frequency_range, freq_bin]`
    pub frequencies: Array2<f64>,
    /// `[polarization, frequency_range, pixel, slot]`
    pub parameters: Array4<f64>,
}

/// Parameter vector of `model` with the given center and the default line shape.
pub fn true_parameters(model: ModelKind, center: f64) -> Vec<f64> {
    model
        .template()
        .iter()
        .map(|kind| match kind {
            ParameterKind::Center => center,
            ParameterKind::Width => TRUE_WIDTH,
            ParameterKind::Contrast => TRUE_CONTRAST,
            ParameterKind::Offset => TRUE_OFFSET,
        })
        .collect()
}

/// Generate `[2, 2, rows * cols, n_freq]` spectra of `model`.
///
/// `noise` is the standard deviation of additive Gaussian noise; zero gives
/// exact model values.
///
/// # Examples
///
/// ```
/// use odmrfit_rs::models::ModelKind;
/// use odmrfit_rs::synthetic::make_dummy_data;
///
/// let dummy = make_dummy_data(ModelKind::Esr15n, 40, (3, 4), 0.0, &mut rand::thread_rng()).unwrap();
/// assert_eq!(dummy.data.shape(), &[2, 2, 12, 40]);
/// assert_eq!(dummy.parameters.shape(), &[2, 2, 12, 5]);
/// ```
pub fn make_dummy_data<R: Rng + ?Sized>(
    model: ModelKind,
    n_freq: usize,
    scan_dimensions: (usize, usize),
    noise: f64,
    rng: &mut R,
) -> Result<DummyData> {
    let n_pixel = scan_dimensions.0 * scan_dimensions.1;
    if n_freq == 0 || n_pixel == 0 {
        return Err(OdmrFitError::InvalidInput(format!(
            "Cannot generate {} bins for {}x{} pixels",
            n_freq, scan_dimensions.0, scan_dimensions.1
        )));
    }
    let normal = Normal::new(0.0, noise).map_err(|e| {
        OdmrFitError::InvalidInput(format!("Invalid noise level {}: {}", noise, e))
    })?;

    let n_params = model.n_parameters();
    let mut data = Array4::zeros((2, 2, n_pixel, n_freq));
    let mut parameters = Array4::zeros((2, 2, n_pixel, n_params));
    let mut frequencies = Array2::zeros((2, n_freq));

    for (r, &(low, high)) in FREQUENCY_WINDOWS.iter().enumerate() {
        let axis = Array1::linspace(low, high, n_freq);
        let middle = axis.mean().unwrap_or(low);
        frequencies.row_mut(r).assign(&axis);

        for (p, sign) in [-1.0, 1.0].into_iter().enumerate() {
            let truth = true_parameters(model, middle + sign * POLARIZATION_SPLIT);
            let spectrum = model.evaluate(axis.view(), &truth)?;

            for pixel in 0..n_pixel {
                let mut row = data.slice_mut(ndarray::s![p, r, pixel, ..]);
                row.assign(&spectrum);
                if noise > 0.0 {
                    row.mapv_inplace(|v| v + normal.sample(rng));
                }
                parameters
                    .slice_mut(ndarray::s![p, r, pixel, ..])
                    .assign(&Array1::from_vec(truth.clone()));
            }
        }
    }

    Ok(DummyData {
        data,
        frequencies,
        parameters,
    })
}
