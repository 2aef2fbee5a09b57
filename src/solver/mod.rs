//! Batched constrained solver interface.
//!
//! The fit driver hands every frequency range to a [`BatchSolver`] as one
//! [`SolverRequest`] of single-precision rows and receives one
//! [`SolverOutput`]. Any conforming backend may sit behind the trait; the
//! crate ships [`CpuSolver`].

use crate::error::{OdmrFitError, Result};
use crate::models::ModelKind;
use crate::parameters::ConstraintKind;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;

mod cpu;

pub use cpu::CpuSolver;

/// Per-row outcome reported by a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FitState {
    Converged = 0,
    MaxIteration = 1,
    SingularHessian = 2,
    NegCurvatureMle = 3,
    GpuNotReady = 4,
}

impl FitState {
    pub const ALL: [FitState; 5] = [
        FitState::Converged,
        FitState::MaxIteration,
        FitState::SingularHessian,
        FitState::NegCurvatureMle,
        FitState::GpuNotReady,
    ];

    /// Integer state code.
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// Resolve a state code.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.code() == code)
    }
}

impl fmt::Display for FitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FitState::Converged => "CONVERGED",
            FitState::MaxIteration => "MAX_ITERATION",
            FitState::SingularHessian => "SINGULAR_HESSIAN",
            FitState::NegCurvatureMle => "NEG_CURVATURE_MLE",
            FitState::GpuNotReady => "GPU_NOT_READY",
        };
        f.write_str(name)
    }
}

/// One batched call: `n` rows of one frequency range.
#[derive(Debug, Clone)]
pub struct SolverRequest<'a> {
    /// `(n, n_freq)` spectra
    pub data: ArrayView2<'a, f32>,
    /// `(n_freq,)` frequency axis shared by every row
    pub frequency_axis: ArrayView1<'a, f32>,
    /// `(n, 2 * n_parameters)` interleaved `(min, max)` pairs
    pub constraints: ArrayView2<'a, f32>,
    /// `(n_parameters,)` constraint kind codes
    pub constraint_kinds: ArrayView1<'a, i32>,
    /// `(n, n_parameters)` seeds
    pub initial_parameters: ArrayView2<'a, f32>,
    /// Optional `(n, n_freq)` least-squares weights
    pub weights: Option<ArrayView2<'a, f32>>,
    pub model_id: i32,
    /// 0 for least squares, 1 for Poisson maximum likelihood
    pub estimator_id: i32,
    pub max_iterations: u32,
    pub tolerance: f32,
}

impl<'a> SolverRequest<'a> {
    /// Number of rows in the batch.
    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of parameters per row.
    pub fn n_parameters(&self) -> usize {
        self.initial_parameters.ncols()
    }

    /// Check the call contract and resolve the model.
    pub fn validate(&self) -> Result<ModelKind> {
        let model = ModelKind::from_model_id(self.model_id).ok_or_else(|| {
            OdmrFitError::FittingBackend(format!("Invalid model id {}", self.model_id))
        })?;

        let (n, n_freq) = self.data.dim();
        let n_params = model.n_parameters();

        let mismatch = |what: &str, expected: String, got: String| {
            Err(OdmrFitError::FittingBackend(format!(
                "{} has shape {}, expected {}",
                what, got, expected
            )))
        };

        if n == 0 || n_freq == 0 {
            return mismatch("data", "(n > 0, n_freq > 0)".into(), format!("{:?}", (n, n_freq)));
        }
        if self.frequency_axis.len() != n_freq {
            return mismatch(
                "frequency_axis",
                format!("({},)", n_freq),
                format!("({},)", self.frequency_axis.len()),
            );
        }
        if self.initial_parameters.dim() != (n, n_params) {
            return mismatch(
                "initial_parameters",
                format!("{:?}", (n, n_params)),
                format!("{:?}", self.initial_parameters.dim()),
            );
        }
        if self.constraints.dim() != (n, 2 * n_params) {
            return mismatch(
                "constraints",
                format!("{:?}", (n, 2 * n_params)),
                format!("{:?}", self.constraints.dim()),
            );
        }
        if self.constraint_kinds.len() != n_params {
            return mismatch(
                "constraint_kinds",
                format!("({},)", n_params),
                format!("({},)", self.constraint_kinds.len()),
            );
        }
        if let Some(weights) = &self.weights {
            if weights.dim() != (n, n_freq) {
                return mismatch("weights", format!("{:?}", (n, n_freq)), format!("{:?}", weights.dim()));
            }
        }
        if let Some(code) = self
            .constraint_kinds
            .iter()
            .find(|&&code| ConstraintKind::from_code(i64::from(code)).is_err())
        {
            return Err(OdmrFitError::FittingBackend(format!("Invalid constraint kind {}", code)));
        }
        if !matches!(self.estimator_id, 0 | 1) {
            return Err(OdmrFitError::FittingBackend(format!(
                "Invalid estimator id {}",
                self.estimator_id
            )));
        }

        Ok(model)
    }
}

/// Per-row results of one batched call.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    /// `(n, n_parameters)` fitted parameters
    pub parameters: Array2<f32>,
    /// `(n,)` [`FitState`] codes
    pub states: Array1<i32>,
    /// `(n,)` final chi-square
    pub chi_squares: Array1<f32>,
    /// `(n,)` iterations used
    pub iterations: Array1<i32>,
    /// Wall time of the whole call in seconds
    pub wall_time: f64,
}

impl SolverOutput {
    /// Check that every output matches the request's row and parameter counts.
    pub fn validate(&self, n_rows: usize, n_parameters: usize) -> Result<()> {
        let ok = self.parameters.dim() == (n_rows, n_parameters)
            && self.states.len() == n_rows
            && self.chi_squares.len() == n_rows
            && self.iterations.len() == n_rows;

        if ok {
            Ok(())
        } else {
            Err(OdmrFitError::FittingBackend(format!(
                "Solver returned parameters {:?}, states {}, chi_squares {}, iterations {} for {} rows of {} parameters",
                self.parameters.dim(),
                self.states.len(),
                self.chi_squares.len(),
                self.iterations.len(),
                n_rows,
                n_parameters
            )))
        }
    }
}

/// A batched constrained least-squares / maximum-likelihood solver.
pub trait BatchSolver: Send + Sync {
    /// Backend name for logs and summaries.
    fn name(&self) -> &str;

    /// Fail with [`OdmrFitError::FittingBackend`] when the backend cannot run.
    fn check_available(&self) -> Result<()> {
        Ok(())
    }

    /// Fit every row of `request`.
    fn fit_constrained(&self, request: &SolverRequest<'_>) -> Result<SolverOutput>;
}
