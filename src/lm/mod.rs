//! Levenberg-Marquardt algorithm implementation.
//!
//! This module provides the per-spectrum minimiser behind the CPU solver:
//! Marquardt-scaled damping, a Cholesky solve of the normal equations, and a
//! relative cost-change convergence test.

pub mod algorithm;
pub mod config;

pub use algorithm::{LevenbergMarquardt, LmResult, LmStatus};
pub use config::LmConfig;
