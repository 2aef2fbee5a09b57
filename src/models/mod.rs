//! Registry of the supported ODMR peak models.
//!
//! Each [`ModelKind`] knows its peak count, its ordered parameter-kind
//! template, the numeric identifier the batched solver uses for it, and how to
//! evaluate it on a frequency axis.

use crate::error::{OdmrFitError, Result};
use crate::parameters::ParameterKind::{self, Center, Contrast, Offset, Width};
use ndarray::{concatenate, Array1, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

mod detect;
pub mod peak;

pub use detect::{find_dips, guess_model, ModelGuess};
pub use peak::{gauss_peak, lorentzian_peak, AHYP_14N, AHYP_15N};

/// Supported resonance models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModelKind {
    /// Single Gaussian dip
    Gauss1d,
    /// 14N hyperfine triplet of Lorentzian dips
    Esr14n,
    /// 15N hyperfine doublet of Lorentzian dips
    Esr15n,
    /// Single Lorentzian dip
    EsrSingle,
}

impl ModelKind {
    /// All registered models.
    pub const ALL: [ModelKind; 4] = [
        ModelKind::Gauss1d,
        ModelKind::Esr14n,
        ModelKind::Esr15n,
        ModelKind::EsrSingle,
    ];

    /// Registry name.
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Gauss1d => "GAUSS1D",
            ModelKind::Esr14n => "ESR14N",
            ModelKind::Esr15n => "ESR15N",
            ModelKind::EsrSingle => "ESRSINGLE",
        }
    }

    /// Human readable description.
    pub fn description(&self) -> &'static str {
        match self {
            ModelKind::Gauss1d => "GAUSS_1D",
            ModelKind::Esr14n => "N14",
            ModelKind::Esr15n => "N15",
            ModelKind::EsrSingle => "SINGLE_MISC.",
        }
    }

    /// Number of resonance dips.
    pub fn n_peaks(&self) -> usize {
        match self {
            ModelKind::Gauss1d | ModelKind::EsrSingle => 1,
            ModelKind::Esr15n => 2,
            ModelKind::Esr14n => 3,
        }
    }

    /// Ordered parameter-kind template, as the solver lays out a parameter vector.
    pub fn template(&self) -> &'static [ParameterKind] {
        match self {
            ModelKind::Gauss1d | ModelKind::EsrSingle => &[Center, Width, Contrast, Offset],
            ModelKind::Esr15n => &[Center, Width, Contrast, Contrast, Offset],
            ModelKind::Esr14n => &[Center, Width, Contrast, Contrast, Contrast, Offset],
        }
    }

    /// Number of parameters in the template.
    pub fn n_parameters(&self) -> usize {
        self.template().len()
    }

    /// Identifier of the model in the batched solver.
    pub fn model_id(&self) -> i32 {
        match self {
            ModelKind::Gauss1d => 0,
            ModelKind::Esr14n => 13,
            ModelKind::Esr15n => 14,
            ModelKind::EsrSingle => 15,
        }
    }

    /// Resolve a solver model identifier.
    pub fn from_model_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.model_id() == id)
    }

    /// Model conventionally used for a given number of resolved dips.
    pub fn from_peak_count(n_peaks: usize) -> Option<Self> {
        match n_peaks {
            1 => Some(ModelKind::Gauss1d),
            2 => Some(ModelKind::Esr15n),
            3 => Some(ModelKind::Esr14n),
            _ => None,
        }
    }

    /// Evaluate the model on a frequency axis (GHz).
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use odmrfit_rs::models::ModelKind;
    ///
    /// let f = array![2.87, 3.87];
    /// let y = ModelKind::EsrSingle.evaluate(f.view(), &[2.87, 0.001, 0.02, 0.0]).unwrap();
    /// assert!((y[0] - 0.98).abs() < 1e-12);
    /// assert!((y[1] - 1.0).abs() < 1e-6);
    /// ```
    pub fn evaluate(&self, x: ArrayView1<'_, f64>, parameters: &[f64]) -> Result<Array1<f64>> {
        if parameters.len() != self.n_parameters() {
            return Err(OdmrFitError::InvalidInput(format!(
                "{} expects {} parameters, got {}",
                self.name(),
                self.n_parameters(),
                parameters.len()
            )));
        }

        Ok(self.evaluate_unchecked(x, parameters))
    }

    /// Evaluate without checking the parameter count.
    pub(crate) fn evaluate_unchecked(&self, x: ArrayView1<'_, f64>, p: &[f64]) -> Array1<f64> {
        match self {
            ModelKind::Gauss1d => peak::dip_spectrum(x, &[(p[0], p[2])], p[1], p[3], gauss_peak),
            ModelKind::EsrSingle => {
                peak::dip_spectrum(x, &[(p[0], p[2])], p[1], p[3], lorentzian_peak)
            }
            ModelKind::Esr15n => peak::dip_spectrum(
                x,
                &[(p[0] + AHYP_15N, p[2]), (p[0] - AHYP_15N, p[3])],
                p[1],
                p[4],
                lorentzian_peak,
            ),
            ModelKind::Esr14n => peak::dip_spectrum(
                x,
                &[
                    (p[0] + AHYP_14N, p[2]),
                    (p[0], p[3]),
                    (p[0] - AHYP_14N, p[4]),
                ],
                p[1],
                p[5],
                lorentzian_peak,
            ),
        }
    }

    fn names() -> String {
        Self::ALL.iter().map(|m| m.name()).collect::<Vec<_>>().join(", ")
    }
}

impl FromStr for ModelKind {
    type Err = OdmrFitError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                OdmrFitError::Configuration(format!(
                    "Unknown model: {}, choose from {{{}}}",
                    s,
                    Self::names()
                ))
            })
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Evaluate a model over a frequency axis spanning two resonance windows.
///
/// The axis is split into its low and high halves (at `len / 2`), the model is
/// evaluated on each half with the same parameter vector, and the halves are
/// concatenated.
pub fn full_model(name: &str, freqs: ArrayView1<'_, f64>, parameters: &[f64]) -> Result<Array1<f64>> {
    let model: ModelKind = name.parse()?;
    let mid = freqs.len() / 2;

    let low = model.evaluate(freqs.slice(ndarray::s![..mid]), parameters)?;
    let high = model.evaluate(freqs.slice(ndarray::s![mid..]), parameters)?;

    Ok(concatenate(Axis(0), &[low.view(), high.view()])?)
}
