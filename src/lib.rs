//! # odmrfit-rs
//!
//! `odmrfit-rs` fits optically detected magnetic resonance (ODMR) spectra
//! recorded over an imaging grid. Every pixel carries a spectrum for two
//! microwave polarizations and two frequency windows; all of them are fitted
//! in batches with a constrained Levenberg-Marquardt solver.
//!
//! The library provides:
//! - A registry of resonance line-shape models (`GAUSS1D`, `ESR14N`, `ESR15N`, `ESRSINGLE`)
//! - Per-slot parameter naming and box constraints
//! - Data-driven initial guesses from cumulative spectra
//! - A [`Fit`] driver that batches, solves and reshapes results to the scan grid
//! - A pluggable [`BatchSolver`] seam with a parallel CPU backend
//!
//! ## Basic Usage
//!
//! ```
//! use odmrfit_rs::{synthetic::make_dummy_data, Fit, ModelKind};
//!
//! let dummy = make_dummy_data(ModelKind::EsrSingle, 60, (2, 2), 0.0, &mut rand::thread_rng()).unwrap();
//! let mut fit = Fit::new(dummy.data, dummy.frequencies, "ESRSINGLE")
//!     .unwrap()
//!     .with_scan_dimensions(2, 2)
//!     .unwrap();
//!
//! fit.fit().unwrap();
//! let centers = fit.param("center").unwrap();
//! assert_eq!(centers.shape(), &[2, 2, 2, 2]);
//! ```

pub mod config;
pub mod error;
pub mod fit;
pub mod guess;
pub mod lm;
pub mod models;
pub mod parameters;
pub mod problem;
pub mod solver;
pub mod synthetic;

mod utils;

// Re-exports for convenience
pub use config::{DegeneratePolicy, Estimator, FitConfig};
pub use error::{OdmrFitError, Result};
pub use fit::{Fit, FitResult};
pub use guess::InitialGuessEngine;
pub use models::{full_model, guess_model, ModelKind};
pub use parameters::{ConstraintKind, ConstraintManager, ParameterIndexer};
pub use solver::{BatchSolver, CpuSolver, FitState};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
