//! Resonance line shapes.
//!
//! Every ODMR model is a baseline of `1 + offset` minus a sum of dips sharing
//! one width. The dips are either Lorentzian,
//! `contrast * width² / ((f - center)² + width²)` (so `width` is the half width
//! at half maximum), or Gaussian, `contrast * exp(-(f - center)² / (2 width²))`.

use ndarray::{Array1, ArrayView1};

/// Hyperfine splitting of the 14N triplet in GHz.
pub const AHYP_14N: f64 = 0.002158;

/// Hyperfine splitting of the 15N doublet in GHz.
pub const AHYP_15N: f64 = 0.0015;

/// Lorentzian dip evaluated at a single frequency.
#[inline]
pub fn lorentzian_peak(f: f64, center: f64, width: f64, contrast: f64) -> f64 {
    let sq_width = width * width;
    let delta = f - center;
    contrast * sq_width / (delta * delta + sq_width)
}

/// Gaussian dip evaluated at a single frequency.
#[inline]
pub fn gauss_peak(f: f64, center: f64, width: f64, contrast: f64) -> f64 {
    let delta = f - center;
    contrast * (-delta * delta / (2.0 * width * width)).exp()
}

/// `1 + offset - Σ dips`, each dip given as `(center, contrast)` with a shared width.
pub fn dip_spectrum<F>(
    x: ArrayView1<'_, f64>,
    dips: &[(f64, f64)],
    width: f64,
    offset: f64,
    shape: F,
) -> Array1<f64>
where
    F: Fn(f64, f64, f64, f64) -> f64,
{
    x.mapv(|f| {
        let depth: f64 = dips
            .iter()
            .map(|&(center, contrast)| shape(f, center, width, contrast))
            .sum();
        1.0 + offset - depth
    })
}
