//! Configuration for a fit.
//!
//! [`FitConfig`] carries everything that would otherwise be process-wide
//! settings: default constraint bounds per parameter kind, the objective
//! estimator, solver iteration cap and tolerance, the peak prominence used for
//! model auto-detection, and the policy for degenerate spectra. It is passed
//! explicitly to every [`Fit`](crate::fit::Fit) and can be loaded from JSON.

use crate::error::Result;
use crate::parameters::{ConstraintKind, ParameterKind};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Objective minimized by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Estimator {
    /// Least-squares estimation
    #[default]
    #[serde(rename = "LSE")]
    LeastSquares,

    /// Poisson maximum-likelihood estimation
    #[serde(rename = "MLE")]
    MaximumLikelihood,
}

impl Estimator {
    /// Integer identifier passed to the solver.
    pub fn id(&self) -> i32 {
        match self {
            Estimator::LeastSquares => 0,
            Estimator::MaximumLikelihood => 1,
        }
    }
}

/// What to do with a spectrum whose cumulative curve has no variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DegeneratePolicy {
    /// Signal a numerical guess error naming the pixel
    #[default]
    Error,

    /// Seed the pixel from the frequency axis and log a warning
    Fallback,
}

/// Default constraint of one parameter kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KindDefaults {
    pub min: f64,
    pub max: f64,
    #[serde(rename = "type")]
    pub kind: ConstraintKind,
}

impl KindDefaults {
    pub fn new(min: f64, max: f64, kind: ConstraintKind) -> Self {
        Self { min, max, kind }
    }
}

/// Default constraints seeded into every new constraint manager.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintDefaults {
    /// Center frequency in GHz. Default: FREE [0, 10]
    pub center: KindDefaults,

    /// Line width in GHz. Default: LOWER_UPPER [0, 0.1]
    pub width: KindDefaults,

    /// Dip contrast. Default: LOWER_UPPER [0, 1]
    pub contrast: KindDefaults,

    /// Baseline offset. Default: FREE [-0.1, 0.1]
    pub offset: KindDefaults,
}

impl Default for ConstraintDefaults {
    fn default() -> Self {
        Self {
            center: KindDefaults::new(0.0, 10.0, ConstraintKind::Free),
            width: KindDefaults::new(0.0, 0.1, ConstraintKind::LowerUpper),
            contrast: KindDefaults::new(0.0, 1.0, ConstraintKind::LowerUpper),
            offset: KindDefaults::new(-0.1, 0.1, ConstraintKind::Free),
        }
    }
}

impl ConstraintDefaults {
    /// Defaults of a parameter kind.
    pub fn for_kind(&self, kind: ParameterKind) -> KindDefaults {
        match kind {
            ParameterKind::Center => self.center,
            ParameterKind::Width => self.width,
            ParameterKind::Contrast => self.contrast,
            ParameterKind::Offset => self.offset,
        }
    }
}

/// Configuration options for fitting ODMR spectra.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Default constraint bounds per parameter kind
    pub constraints: ConstraintDefaults,

    /// Objective estimator. Default: LSE
    pub estimator: Estimator,

    /// Maximum number of solver iterations per pixel. Default: 100
    pub max_iterations: u32,

    /// Relative chi-square decrease below which a pixel counts as converged. Default: 1e-6
    pub tolerance: f32,

    /// Minimum prominence of a dip counted during model detection. Default: 0.002
    pub find_peaks_prominence: f64,

    /// Handling of spectra without usable variance. Default: ERROR
    pub degenerate_spectra: DegeneratePolicy,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            constraints: ConstraintDefaults::default(),
            estimator: Estimator::default(),
            max_iterations: 100,
            tolerance: 1e-6,
            find_peaks_prominence: 0.002,
            degenerate_spectra: DegeneratePolicy::default(),
        }
    }
}

impl FitConfig {
    /// Parse a (possibly partial) JSON document; missing keys keep their defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use odmrfit_rs::config::{Estimator, FitConfig};
    ///
    /// let config = FitConfig::from_json(r#"{"estimator": "MLE", "max_iterations": 25}"#).unwrap();
    /// assert_eq!(config.estimator, Estimator::MaximumLikelihood);
    /// assert_eq!(config.max_iterations, 25);
    /// assert_eq!(config.tolerance, FitConfig::default().tolerance);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Set the objective estimator.
    pub fn with_estimator(mut self, estimator: Estimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the prominence threshold used by model detection.
    pub fn with_find_peaks_prominence(mut self, prominence: f64) -> Self {
        self.find_peaks_prominence = prominence;
        self
    }

    /// Set the policy for degenerate spectra.
    pub fn with_degenerate_policy(mut self, policy: DegeneratePolicy) -> Self {
        self.degenerate_spectra = policy;
        self
    }

    /// Set the default constraints of one parameter kind.
    pub fn with_default_constraint(mut self, kind: ParameterKind, defaults: KindDefaults) -> Self {
        match kind {
            ParameterKind::Center => self.constraints.center = defaults,
            ParameterKind::Width => self.constraints.width = defaults,
            ParameterKind::Contrast => self.constraints.contrast = defaults,
            ParameterKind::Offset => self.constraints.offset = defaults,
        }
        self
    }
}
