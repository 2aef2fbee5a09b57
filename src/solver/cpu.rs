//! CPU reference backend.
//!
//! Every row is fitted independently with [`LevenbergMarquardt`] on rayon's
//! thread pool. Constraints become the minimiser's [`Bounds`]: seeds are
//! clamped into them, steps are projected back onto them, and a slot pinned by
//! `LOWER_UPPER` with `min == max` never moves.

use super::{BatchSolver, FitState, SolverOutput, SolverRequest};
use crate::error::{OdmrFitError, Result};
use crate::lm::{LevenbergMarquardt, LmConfig, LmStatus};
use crate::models::ModelKind;
use crate::parameters::{Bounds, ConstraintKind};
use crate::problem::Problem;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use std::time::Instant;

/// Objective of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Objective {
    LeastSquares,
    PoissonDeviance,
}

/// A single spectrum and the constraints of its row.
struct SpectrumProblem {
    model: ModelKind,
    x: Array1<f64>,
    y: Array1<f64>,
    sqrt_weights: Option<Array1<f64>>,
    bounds: Vec<Bounds>,
    objective: Objective,
}

impl SpectrumProblem {
    fn predict(&self, params: &Array1<f64>) -> Array1<f64> {
        self.model.evaluate_unchecked(self.x.view(), &params.to_vec())
    }
}

impl Problem for SpectrumProblem {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let predicted = self.predict(params);

        let residuals = match self.objective {
            Objective::LeastSquares => {
                let diff = &predicted - &self.y;
                match &self.sqrt_weights {
                    Some(w) => diff * w,
                    None => diff,
                }
            }
            // Signed deviance residuals: their squares sum to 2Σ(f - y - y ln(f/y)).
            Objective::PoissonDeviance => predicted
                .iter()
                .zip(self.y.iter())
                .map(|(&f, &y)| {
                    if f <= 0.0 {
                        f64::INFINITY
                    } else {
                        let deviance = if y > 0.0 { f - y - y * (f / y).ln() } else { f };
                        (f - y).signum() * (2.0 * deviance.max(0.0)).sqrt()
                    }
                })
                .collect(),
        };

        Ok(residuals)
    }

    fn parameter_count(&self) -> usize {
        self.bounds.len()
    }

    fn residual_count(&self) -> usize {
        self.x.len()
    }

    fn bounds(&self) -> Vec<Bounds> {
        self.bounds.clone()
    }
}

/// Outcome of one row.
struct RowFit {
    parameters: Vec<f64>,
    state: FitState,
    chi_square: f64,
    iterations: usize,
}

/// Levenberg-Marquardt batched solver running on the CPU.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuSolver;

impl CpuSolver {
    pub fn new() -> Self {
        Self
    }

    fn row_bounds(request: &SolverRequest<'_>, row: usize) -> Result<Vec<Bounds>> {
        let limits = request.constraints.row(row);

        request
            .constraint_kinds
            .iter()
            .enumerate()
            .map(|(j, &code)| {
                let kind = ConstraintKind::from_code(i64::from(code))
                    .map_err(|e| OdmrFitError::FittingBackend(e.to_string()))?;
                Bounds::for_kind(kind, f64::from(limits[2 * j]), f64::from(limits[2 * j + 1]))
                    .map_err(|e| OdmrFitError::FittingBackend(format!("row {}: {}", row, e)))
            })
            .collect()
    }

    fn fit_row(&self, request: &SolverRequest<'_>, model: ModelKind, row: usize) -> Result<RowFit> {
        let objective = match request.estimator_id {
            1 => Objective::PoissonDeviance,
            _ => Objective::LeastSquares,
        };

        let problem = SpectrumProblem {
            model,
            x: request.frequency_axis.mapv(f64::from),
            y: request.data.row(row).mapv(f64::from),
            sqrt_weights: match (&request.weights, objective) {
                (Some(w), Objective::LeastSquares) => {
                    Some(w.row(row).mapv(|w| f64::from(w).max(0.0).sqrt()))
                }
                _ => None,
            },
            bounds: Self::row_bounds(request, row)?,
            objective,
        };

        let initial: Array1<f64> = request
            .initial_parameters
            .row(row)
            .iter()
            .zip(&problem.bounds)
            .map(|(&p, b)| b.clamp(f64::from(p)))
            .collect();

        if objective == Objective::PoissonDeviance && problem.predict(&initial).iter().any(|&f| f <= 0.0) {
            return Ok(RowFit {
                parameters: initial.to_vec(),
                state: FitState::NegCurvatureMle,
                chi_square: f64::INFINITY,
                iterations: 0,
            });
        }

        let lm = LevenbergMarquardt::with_config(LmConfig {
            max_iterations: request.max_iterations as usize,
            tolerance: f64::from(request.tolerance),
            ..LmConfig::default()
        });
        let result = lm.minimize(&problem, initial)?;
        log::trace!(
            "row {}: {:?} after {} iterations and {} evaluations ({})",
            row,
            result.status,
            result.iterations,
            result.func_evals,
            result.message
        );

        Ok(RowFit {
            parameters: result.params.to_vec(),
            state: match result.status {
                LmStatus::Converged => FitState::Converged,
                LmStatus::MaxIterations => FitState::MaxIteration,
                LmStatus::Singular => FitState::SingularHessian,
            },
            chi_square: result.cost,
            iterations: result.iterations,
        })
    }
}

impl BatchSolver for CpuSolver {
    fn name(&self) -> &str {
        "cpu-lm"
    }

    fn fit_constrained(&self, request: &SolverRequest<'_>) -> Result<SolverOutput> {
        let start = Instant::now();
        let model = request.validate()?;
        let n_rows = request.n_rows();
        let n_params = model.n_parameters();

        let rows = (0..n_rows)
            .into_par_iter()
            .map(|row| self.fit_row(request, model, row))
            .collect::<Result<Vec<RowFit>>>()?;

        let mut parameters = Array2::zeros((n_rows, n_params));
        for (mut out, fit) in parameters.axis_iter_mut(Axis(0)).zip(&rows) {
            for (dst, &value) in out.iter_mut().zip(&fit.parameters) {
                *dst = value as f32;
            }
        }

        let output = SolverOutput {
            parameters,
            states: rows.iter().map(|fit| fit.state.code()).collect(),
            chi_squares: rows.iter().map(|fit| fit.chi_square as f32).collect(),
            iterations: rows
                .iter()
                .map(|fit| i32::try_from(fit.iterations).unwrap_or(i32::MAX))
                .collect(),
            wall_time: start.elapsed().as_secs_f64(),
        };

        let converged = output.states.iter().filter(|&&s| s == 0).count();
        log::debug!(
            "{} fitted {} rows of {} in {:.3} s ({} converged)",
            self.name(),
            n_rows,
            model,
            output.wall_time,
            converged
        );

        Ok(output)
    }
}
