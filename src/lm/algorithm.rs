//! Implementation of the Levenberg-Marquardt algorithm.
//!
//! This module contains the core implementation of the Levenberg-Marquardt
//! algorithm used to fit a single spectrum. Damping is applied to the diagonal
//! of `JᵀJ` (Marquardt scaling) so that parameters of very different magnitude
//! (GHz centers next to sub-percent contrasts) are damped consistently.
//!
//! Parameter bounds are a box: the seed is clamped into it, every trial point
//! is projected back onto it, and a parameter sitting on a bound that the
//! gradient pushes outward is held for that step.

use ndarray::{Array1, Array2};

use crate::error::{OdmrFitError, Result};
use crate::problem::Problem;

use super::config::LmConfig;

/// How a minimisation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LmStatus {
    /// The relative cost change fell below the tolerance
    Converged,

    /// The iteration cap was reached first
    MaxIterations,

    /// The damped normal equations could not be solved
    Singular,
}

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Sum of squared residuals
    pub cost: f64,

    /// Number of iterations performed, rejected steps included
    pub iterations: usize,

    /// Number of function evaluations
    pub func_evals: usize,

    /// How the optimization ended
    pub status: LmStatus,

    /// A message describing the result
    pub message: String,
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    /// Configuration options
    config: LmConfig,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    /// Minimize the sum of squared residuals for the given problem.
    ///
    /// A start with a non-finite cost cannot produce a usable step and is
    /// reported as [`LmStatus::Singular`] without iterating. Pinned parameters,
    /// parameters with a zero Jacobian column and parameters blocked by a
    /// bound keep their value for a step while the others move.
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem to solve
    /// * `initial_params` - Initial guess for the parameter values
    pub fn minimize<P: Problem>(&self, problem: &P, initial_params: Array1<f64>) -> Result<LmResult> {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(OdmrFitError::InvalidInput(format!(
                "Expected {} parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }

        let bounds = problem.bounds();
        if bounds.len() != n_params {
            return Err(OdmrFitError::InvalidInput(format!(
                "Expected {} bounds, got {}",
                n_params,
                bounds.len()
            )));
        }

        let mut params: Array1<f64> = initial_params
            .iter()
            .zip(&bounds)
            .map(|(&p, b)| b.clamp(p))
            .collect();
        let mut lambda = self.config.initial_lambda;
        let mut residuals = problem.eval(&params)?;
        let mut cost = sum_of_squares(&residuals);
        let mut func_evals = 1;
        let mut iterations = 0;

        let finish = |params: Array1<f64>,
                      cost: f64,
                      iterations: usize,
                      func_evals: usize,
                      status: LmStatus,
                      message: String| LmResult {
            params,
            cost,
            iterations,
            func_evals,
            status,
            message,
        };

        if !cost.is_finite() {
            return Ok(finish(
                params,
                cost,
                0,
                func_evals,
                LmStatus::Singular,
                "Non-finite cost at the initial parameters".to_string(),
            ));
        }

        // Normal equations at the current parameters; refreshed after every accepted step.
        let mut normal: Option<(Array2<f64>, Array1<f64>)> = None;

        while iterations < self.config.max_iterations {
            if cost == 0.0 {
                return Ok(finish(
                    params,
                    cost,
                    iterations,
                    func_evals,
                    LmStatus::Converged,
                    "Exact fit".to_string(),
                ));
            }

            let (jtj, jtr) = match normal.take() {
                Some(system) => system,
                None => {
                    let jacobian = problem.jacobian(&params)?;
                    func_evals += n_params;
                    let jt = jacobian.t();
                    (jt.dot(&jacobian), jt.dot(&residuals))
                }
            };

            if jtj.diag().iter().any(|d| !d.is_finite()) {
                return Ok(finish(
                    params,
                    cost,
                    iterations,
                    func_evals,
                    LmStatus::Singular,
                    "Non-finite Jacobian".to_string(),
                ));
            }

            let held: Vec<bool> = (0..n_params)
                .map(|i| {
                    bounds[i].is_pinned()
                        || jtj[[i, i]] <= 0.0
                        || bounds[i].blocks(params[i], jtr[i])
                })
                .collect();

            if (0..n_params).all(|i| held[i] || jtr[i] == 0.0) {
                return Ok(finish(
                    params,
                    cost,
                    iterations,
                    func_evals,
                    LmStatus::Converged,
                    "Gradient vanished".to_string(),
                ));
            }

            iterations += 1;

            // (JᵀJ + λ diag(JᵀJ)) δ = -Jᵀr over the moving parameters; held ones get a zero step.
            let mut damped = jtj.clone();
            let mut rhs = jtr.mapv(|g| -g);
            for i in 0..n_params {
                if held[i] {
                    damped.row_mut(i).fill(0.0);
                    damped.column_mut(i).fill(0.0);
                    damped[[i, i]] = 1.0;
                    rhs[i] = 0.0;
                } else {
                    damped[[i, i]] *= 1.0 + lambda;
                }
            }

            let step = match cholesky_solve(&damped, &rhs) {
                Some(step) => step,
                None => {
                    lambda *= self.config.lambda_up_factor;
                    if lambda > self.config.max_lambda {
                        return Ok(finish(
                            params,
                            cost,
                            iterations,
                            func_evals,
                            LmStatus::Singular,
                            "Failed to factorize the damped normal equations".to_string(),
                        ));
                    }
                    normal = Some((jtj, jtr));
                    continue;
                }
            };

            let new_params: Array1<f64> = (&params + &step)
                .iter()
                .zip(&bounds)
                .map(|(&p, b)| b.clamp(p))
                .collect();
            let new_residuals = problem.eval(&new_params)?;
            func_evals += 1;
            let new_cost = sum_of_squares(&new_residuals);

            if new_cost.is_finite() && new_cost < cost {
                let converged = cost - new_cost <= self.config.tolerance * cost;

                params = new_params;
                residuals = new_residuals;
                cost = new_cost;
                lambda = (lambda * self.config.lambda_down_factor).max(self.config.min_lambda);

                if converged {
                    return Ok(finish(
                        params,
                        cost,
                        iterations,
                        func_evals,
                        LmStatus::Converged,
                        format!(
                            "Cost convergence: relative change below {:.2e}",
                            self.config.tolerance
                        ),
                    ));
                }
            } else {
                if new_cost.is_finite() && new_cost - cost <= self.config.tolerance * cost {
                    return Ok(finish(
                        params,
                        cost,
                        iterations,
                        func_evals,
                        LmStatus::Converged,
                        "Cost stalled at a minimum".to_string(),
                    ));
                }

                lambda *= self.config.lambda_up_factor;
                if lambda > self.config.max_lambda {
                    return Ok(finish(
                        params,
                        cost,
                        iterations,
                        func_evals,
                        LmStatus::Converged,
                        "Failed to decrease cost, and lambda reached maximum".to_string(),
                    ));
                }
                normal = Some((jtj, jtr));
            }
        }

        Ok(finish(
            params,
            cost,
            iterations,
            func_evals,
            LmStatus::MaxIterations,
            format!("Maximum iterations ({}) reached", self.config.max_iterations),
        ))
    }
}

fn sum_of_squares(residuals: &Array1<f64>) -> f64 {
    residuals.iter().map(|r| r.powi(2)).sum()
}

/// Solve `a x = b` for symmetric positive definite `a`.
///
/// Returns `None` when the Cholesky factorization breaks down.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = a.clone();

    for k in 0..n {
        for j in 0..k {
            l[[k, k]] -= l[[k, j]] * l[[k, j]];
        }

        if !(l[[k, k]] > 0.0) {
            return None;
        }

        let lkk = l[[k, k]].sqrt();
        l[[k, k]] = lkk;

        for i in k + 1..n {
            for j in 0..k {
                l[[i, k]] -= l[[i, j]] * l[[k, j]];
            }
            l[[i, k]] /= lkk;
        }
    }

    // Forward substitution (L * y = b)
    let mut y = b.clone();
    for i in 0..n {
        for j in 0..i {
            y[i] -= l[[i, j]] * y[j];
        }
        y[i] /= l[[i, i]];
    }

    // Backward substitution (L^T * x = y)
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        x[i] = y[i];
        for j in (i + 1)..n {
            x[i] -= l[[j, i]] * x[j];
        }
        x[i] /= l[[i, i]];
    }

    if x.iter().all(|v: &f64| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}
