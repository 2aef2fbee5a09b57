//! Automatic model detection from raw spectra.

use super::ModelKind;
use crate::error::{OdmrFitError, Result};
use ndarray::{ArrayView1, ArrayViewD, Axis};

/// Outcome of [`guess_model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelGuess {
    /// Mean number of dips per spectrum, rounded.
    pub n_peaks: usize,
    /// Set when spectra disagree on their dip count.
    pub doubt: bool,
    /// Registered model for `n_peaks`, if any.
    pub model: Option<ModelKind>,
}

/// Indices of the dips of `spectrum` whose prominence is at least `prominence`.
///
/// Dips are local maxima of the negated spectrum. A flat-bottomed dip is
/// reported at the middle of its plateau. The prominence of a dip is its depth
/// below the higher of the two lowest points that separate it from deeper
/// dips (or from the ends of the spectrum).
pub fn find_dips(spectrum: ArrayView1<'_, f64>, prominence: f64) -> Vec<usize> {
    let y: Vec<f64> = spectrum.iter().map(|v| -v).collect();
    let n = y.len();
    let mut dips = Vec::new();

    let mut i = 1;
    while i + 1 < n {
        if y[i] > y[i - 1] {
            let mut end = i;
            while end + 1 < n && y[end + 1] == y[i] {
                end += 1;
            }
            if end + 1 < n && y[end + 1] < y[i] {
                let peak = (i + end) / 2;
                if peak_prominence(&y, peak) >= prominence {
                    dips.push(peak);
                }
            }
            i = end + 1;
        } else {
            i += 1;
        }
    }

    dips
}

fn peak_prominence(y: &[f64], peak: usize) -> f64 {
    let height = y[peak];

    let left_base = y[..peak]
        .iter()
        .rev()
        .take_while(|&&v| v <= height)
        .fold(height, |base, &v| base.min(v));
    let right_base = y[peak + 1..]
        .iter()
        .take_while(|&&v| v <= height)
        .fold(height, |base, &v| base.min(v));

    height - left_base.max(right_base)
}

/// Guess the diamond type from the number of dips per spectrum.
///
/// `spectra` may have any leading shape; the last axis is frequency. Every
/// spectrum is searched for dips of at least `prominence`, and the rounded
/// mean count selects the model.
pub fn guess_model(spectra: ArrayViewD<'_, f64>, prominence: f64) -> Result<ModelGuess> {
    let ndim = spectra.ndim();
    if ndim == 0 || spectra.is_empty() {
        return Err(OdmrFitError::InvalidInput(
            "Cannot guess a model from empty spectra".to_string(),
        ));
    }

    let counts: Vec<usize> = spectra
        .lanes(Axis(ndim - 1))
        .into_iter()
        .map(|spectrum| find_dips(spectrum, prominence).len())
        .collect();

    let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
    let n_peaks = mean.round() as usize;
    let doubt = counts.iter().any(|&c| c != counts[0]);

    if doubt {
        log::warn!(
            "Spectra disagree on their dip count ({:?}), model guess needs confirmation",
            counts
        );
    }

    Ok(ModelGuess {
        n_peaks,
        doubt,
        model: ModelKind::from_peak_count(n_peaks),
    })
}
