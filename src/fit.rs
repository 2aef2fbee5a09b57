//! Batched fitting of an ODMR imaging dataset.
//!
//! [`Fit`] owns the spectra, the frequency axes, the model and its
//! constraints. Calling [`Fit::fit`] flattens every frequency range into solver
//! rows, hands each range to the [`BatchSolver`] once, and reassembles the
//! per-row outputs into `[polarization, frequency_range, row, col, ...]`
//! arrays. Any change to data, model or constraints drops cached seeds and
//! results, so a [`Fit`] is either unfitted or holds results that match its
//! current inputs.

use crate::config::FitConfig;
use crate::error::{OdmrFitError, Result};
use crate::guess::InitialGuessEngine;
use crate::models::{guess_model, ModelGuess, ModelKind};
use crate::parameters::{ConstraintManager, IntoConstraintKind, ParameterIndexer, ParameterKind};
use crate::solver::{BatchSolver, CpuSolver, FitState, SolverRequest};
use ndarray::{
    stack, Array, Array1, Array2, Array4, Array5, ArrayD, Axis, Dimension, Ix3, Ix4, StrideShape,
};
use std::fmt;

/// Names accepted by [`Fit::param`] for the chi-square map.
const CHI_SQUARE_NAMES: [&str; 4] = ["chi2", "chi_squares", "chi_squared", "chi_square"];

/// Results of a completed fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    /// `[polarization, frequency_range, row, col, slot]`
    pub parameters: Array5<f32>,
    /// `[polarization, frequency_range, row, col]`
    pub chi_squares: Array4<f32>,
    /// `[polarization, frequency_range, row, col]` [`FitState`] codes
    pub states: Array4<i32>,
    /// `[polarization, frequency_range, row, col]`
    pub iterations: Array4<i32>,
    /// Solver wall time per frequency range, in seconds
    pub execution_times: Array1<f64>,
}

impl FitResult {
    /// Parameters with every singleton axis removed.
    pub fn squeezed_parameters(&self) -> ArrayD<f32> {
        squeeze(self.parameters.clone().into_dyn())
    }

    /// Number of pixels that ended in `state`.
    pub fn count_state(&self, state: FitState) -> usize {
        self.states.iter().filter(|&&s| s == state.code()).count()
    }
}

fn squeeze<A>(mut array: ArrayD<A>) -> ArrayD<A> {
    let mut axis = 0;
    while axis < array.ndim() {
        if array.shape()[axis] == 1 {
            array = array.index_axis_move(Axis(axis), 0);
        } else {
            axis += 1;
        }
    }
    array
}

/// Copy `values` (in logical order) into a fresh standard-layout array.
fn regrid<'a, A, I, Sh, D>(values: I, shape: Sh) -> Result<Array<A, D>>
where
    A: Clone + 'a,
    I: IntoIterator<Item = &'a A>,
    Sh: Into<StrideShape<D>>,
    D: Dimension,
{
    Ok(Array::from_shape_vec(shape, values.into_iter().cloned().collect())?)
}

/// Fits a resonance model to every pixel of an ODMR dataset.
pub struct Fit {
    data: Array4<f64>,
    frequencies: Array2<f64>,
    weights: Option<Array4<f64>>,
    model: ModelKind,
    constraints: ConstraintManager,
    config: FitConfig,
    scan_dimensions: (usize, usize),
    solver: Box<dyn BatchSolver>,
    initial_parameters: Option<Array4<f32>>,
    result: Option<FitResult>,
}

impl Fit {
    /// Fit with the default configuration and the CPU solver.
    ///
    /// `data` is `[polarization, frequency_range, pixel, freq_bin]` and
    /// `frequencies` is `[frequency_range, freq_bin]` in GHz.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::{Array1, Array4};
    /// use odmrfit_rs::Fit;
    ///
    /// let freqs = Array1::linspace(2.84, 2.85, 50).insert_axis(ndarray::Axis(0));
    /// let data = Array4::<f64>::ones((1, 1, 1, 50));
    ///
    /// let fit = Fit::new(data.clone(), freqs.clone(), "ESR15N").unwrap();
    /// assert!(!fit.fitted());
    /// assert_eq!(fit.slot_names(), ["center", "width", "contrast_0", "contrast_1", "offset"]);
    ///
    /// assert!(Fit::new(data, freqs, "FOO").is_err());
    /// ```
    pub fn new(data: Array4<f64>, frequencies: Array2<f64>, model: &str) -> Result<Self> {
        Self::with_config(data, frequencies, model, FitConfig::default())
    }

    /// Fit with an explicit configuration and the CPU solver.
    pub fn with_config(
        data: Array4<f64>,
        frequencies: Array2<f64>,
        model: &str,
        config: FitConfig,
    ) -> Result<Self> {
        let model: ModelKind = model.parse()?;
        Self::check_inputs(&data, &frequencies)?;

        let indexer = ParameterIndexer::from_template(model.template());
        let constraints = ConstraintManager::new(indexer, &config.constraints)?;
        let solver: Box<dyn BatchSolver> = Box::new(CpuSolver::new());
        solver.check_available()?;

        let n_pixel = data.dim().2;
        log::info!(
            "New fit: model {}, data {:?}, {} frequency bins, solver {}",
            model,
            data.shape(),
            frequencies.ncols(),
            solver.name()
        );

        Ok(Self {
            data,
            frequencies,
            weights: None,
            model,
            constraints,
            config,
            scan_dimensions: (n_pixel, 1),
            solver,
            initial_parameters: None,
            result: None,
        })
    }

    /// Use another solver backend. Fails if the backend is unavailable.
    pub fn with_solver(mut self, solver: Box<dyn BatchSolver>) -> Result<Self> {
        solver.check_available()?;
        log::debug!("Switching solver to {}", solver.name());
        self.solver = solver;
        self.invalidate();
        Ok(self)
    }

    /// Lay the pixel axis out as a `rows x cols` grid (row-major).
    pub fn with_scan_dimensions(mut self, rows: usize, cols: usize) -> Result<Self> {
        let n_pixel = self.n_pixel();
        if rows * cols != n_pixel {
            return Err(OdmrFitError::InvalidInput(format!(
                "Scan dimensions {}x{} do not match {} pixels",
                rows, cols, n_pixel
            )));
        }
        self.scan_dimensions = (rows, cols);
        self.invalidate();
        Ok(self)
    }

    /// Apply constraint overrides, each `(name_or_family, min, max, kind)`.
    pub fn with_constraints<'n, K, I>(mut self, overrides: I) -> Result<Self>
    where
        K: IntoConstraintKind,
        I: IntoIterator<Item = (&'n str, f64, f64, K)>,
    {
        for (name, min, max, kind) in overrides {
            self.set_constraints(name, min, max, kind)?;
        }
        Ok(self)
    }

    /// Least-squares weights, shaped like the data.
    pub fn with_weights(mut self, weights: Array4<f64>) -> Result<Self> {
        if weights.dim() != self.data.dim() {
            return Err(OdmrFitError::InvalidInput(format!(
                "Weights have shape {:?}, data has {:?}",
                weights.shape(),
                self.data.shape()
            )));
        }
        self.weights = Some(weights);
        self.invalidate();
        Ok(self)
    }

    fn check_inputs(data: &Array4<f64>, frequencies: &Array2<f64>) -> Result<()> {
        let (n_pol, n_range, n_pixel, n_freq) = data.dim();
        if n_pol == 0 || n_range == 0 || n_pixel == 0 || n_freq == 0 {
            return Err(OdmrFitError::InvalidInput(format!(
                "Data of shape {:?} is empty",
                data.shape()
            )));
        }
        if frequencies.dim() != (n_range, n_freq) {
            return Err(OdmrFitError::InvalidInput(format!(
                "Frequency axis has shape {:?}, data expects {:?}",
                frequencies.shape(),
                (n_range, n_freq)
            )));
        }
        for (r, axis) in frequencies.outer_iter().enumerate() {
            if axis.windows(2).into_iter().any(|w| !(w[1] > w[0])) {
                return Err(OdmrFitError::InvalidInput(format!(
                    "Frequency range {} is not strictly ascending",
                    r
                )));
            }
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        if self.result.is_some() {
            log::debug!("Dropping fit results");
        }
        self.initial_parameters = None;
        self.result = None;
    }

    /// Count dips in every spectrum to suggest a model.
    ///
    /// Uses [`FitConfig::find_peaks_prominence`]. A set `doubt` flag means the
    /// pixels disagree and the suggestion needs a manual check.
    pub fn detect_model(&self) -> Result<ModelGuess> {
        let guess = guess_model(self.data.view().into_dyn(), self.config.find_peaks_prominence)?;
        log::info!(
            "Detected {} dips per spectrum ({:?}), doubt: {}",
            guess.n_peaks,
            guess.model,
            guess.doubt
        );
        Ok(guess)
    }

    /// Whether results matching the current inputs are available.
    pub fn fitted(&self) -> bool {
        self.result.is_some()
    }

    pub fn data(&self) -> &Array4<f64> {
        &self.data
    }

    pub fn frequencies(&self) -> &Array2<f64> {
        &self.frequencies
    }

    pub fn model(&self) -> ModelKind {
        self.model
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    pub fn constraints(&self) -> &ConstraintManager {
        &self.constraints
    }

    pub fn scan_dimensions(&self) -> (usize, usize) {
        self.scan_dimensions
    }

    pub fn n_pixel(&self) -> usize {
        self.data.dim().2
    }

    /// Unique parameter slot names of the current model.
    pub fn slot_names(&self) -> Vec<String> {
        self.constraints.indexer().slot_names()
    }

    /// Replace the spectra. A no-op when `data` equals the current array.
    ///
    /// When the pixel count changes, the scan grid falls back to `(n_pixel, 1)`.
    pub fn set_data(&mut self, data: Array4<f64>) -> Result<()> {
        if data == self.data {
            log::debug!("set_data: data unchanged");
            return Ok(());
        }
        Self::check_inputs(&data, &self.frequencies)?;
        if self.weights.as_ref().map_or(false, |w| w.dim() != data.dim()) {
            log::warn!("Dropping weights that no longer match the data shape");
            self.weights = None;
        }

        let n_pixel = data.dim().2;
        if self.scan_dimensions.0 * self.scan_dimensions.1 != n_pixel {
            log::info!(
                "Pixel count changed to {}, scan dimensions reset to {}x1",
                n_pixel,
                n_pixel
            );
            self.scan_dimensions = (n_pixel, 1);
        }

        self.data = data;
        self.invalidate();
        Ok(())
    }

    /// Replace the frequency axes.
    pub fn set_frequencies(&mut self, frequencies: Array2<f64>) -> Result<()> {
        if frequencies == self.frequencies {
            return Ok(());
        }
        Self::check_inputs(&self.data, &frequencies)?;
        self.frequencies = frequencies;
        self.invalidate();
        Ok(())
    }

    /// Switch to another model.
    ///
    /// Constraints of slots that exist in both models are kept; new slots
    /// start from the configured defaults.
    pub fn set_model(&mut self, model: &str) -> Result<()> {
        let model: ModelKind = model.parse()?;
        if model == self.model {
            return Ok(());
        }

        let indexer = ParameterIndexer::from_template(model.template());
        let mut constraints = ConstraintManager::new(indexer, &self.config.constraints)?;
        constraints.inherit_from(&self.constraints);

        log::info!("Model changed from {} to {}", self.model, model);
        self.model = model;
        self.constraints = constraints;
        self.invalidate();
        Ok(())
    }

    /// Constrain a slot (`contrast_1`) or a whole family (`contrast`).
    ///
    /// `kind` is a [`ConstraintKind`](crate::parameters::ConstraintKind), its
    /// name or its integer index.
    pub fn set_constraints<K: IntoConstraintKind>(
        &mut self,
        name: &str,
        min: f64,
        max: f64,
        kind: K,
    ) -> Result<()> {
        let updated = self.constraints.set_constraint(name, min, max, kind)?;
        log::debug!("Constraints of {:?} set to [{}, {}]", updated, min, max);
        self.invalidate();
        Ok(())
    }

    /// Mark every slot `FREE`, keeping the stored bounds.
    pub fn set_free_constraints(&mut self) {
        self.constraints.set_free();
        log::debug!("All constraints set to FREE");
        self.invalidate();
    }

    /// Seeds `[polarization, frequency_range, pixel, slot]`, computed on first use.
    pub fn initial_parameters(&mut self) -> Result<&Array4<f32>> {
        if self.initial_parameters.is_none() {
            let engine = InitialGuessEngine::new(self.model, self.config.degenerate_spectra);
            let seeds = engine.guess(self.data.view(), self.frequencies.view())?;
            self.initial_parameters = Some(seeds);
        }

        self.initial_parameters.as_ref().ok_or_else(|| {
            OdmrFitError::InvalidInput("Initial parameters could not be computed".to_string())
        })
    }

    /// Fit every pixel of every frequency range.
    ///
    /// Does nothing when results for the current inputs already exist. A
    /// solver failure aborts the fit and leaves the instance unfitted.
    /// Per-pixel non-convergence is reported through [`FitResult::states`].
    pub fn fit(&mut self) -> Result<()> {
        if self.result.is_some() {
            log::debug!("Already fitted, skipping");
            return Ok(());
        }

        self.initial_parameters()?;
        let seeds = match &self.initial_parameters {
            Some(seeds) => seeds,
            None => return Err(OdmrFitError::InvalidInput("Missing initial parameters".to_string())),
        };

        let (n_pol, n_range, n_pixel, n_freq) = self.data.dim();
        let (rows, cols) = self.scan_dimensions;
        let n_params = self.model.n_parameters();
        let n_rows = n_pol * n_pixel;

        let constraint_kinds = self.constraints.get_constraint_types();
        let constraints = self.constraints.get_constraints_array(n_rows);

        let mut parameters = Vec::with_capacity(n_range);
        let mut chi_squares = Vec::with_capacity(n_range);
        let mut states = Vec::with_capacity(n_range);
        let mut iterations = Vec::with_capacity(n_range);
        let mut times = Vec::with_capacity(n_range);

        for r in 0..n_range {
            let axis = self.frequencies.row(r);
            log::info!(
                "Fitting {} rows of frequency range {} ({:.4}-{:.4} GHz) with {}",
                n_rows,
                r,
                axis[0],
                axis[n_freq - 1],
                self.solver.name()
            );

            let frequency_axis = axis.mapv(|f| f as f32);
            let data: Array2<f32> = regrid(
                self.data.index_axis(Axis(1), r).mapv(|v| v as f32).iter(),
                (n_rows, n_freq),
            )?;
            let initial: Array2<f32> = regrid(seeds.index_axis(Axis(1), r).iter(), (n_rows, n_params))?;
            let weights: Option<Array2<f32>> = match &self.weights {
                Some(w) => Some(regrid(
                    w.index_axis(Axis(1), r).mapv(|v| v as f32).iter(),
                    (n_rows, n_freq),
                )?),
                None => None,
            };

            let request = SolverRequest {
                data: data.view(),
                frequency_axis: frequency_axis.view(),
                constraints: constraints.view(),
                constraint_kinds: constraint_kinds.view(),
                initial_parameters: initial.view(),
                weights: weights.as_ref().map(|w| w.view()),
                model_id: self.model.model_id(),
                estimator_id: self.config.estimator.id(),
                max_iterations: self.config.max_iterations,
                tolerance: self.config.tolerance,
            };

            let output = self.solver.fit_constrained(&request)?;
            output.validate(n_rows, n_params)?;

            parameters.push(regrid::<_, _, _, Ix4>(
                output.parameters.iter(),
                (n_pol, rows, cols, n_params),
            )?);
            let grid = (n_pol, rows, cols);
            chi_squares.push(regrid::<_, _, _, Ix3>(output.chi_squares.iter(), grid)?);
            states.push(regrid::<_, _, _, Ix3>(output.states.iter(), grid)?);
            iterations.push(regrid::<_, _, _, Ix3>(output.iterations.iter(), grid)?);
            times.push(output.wall_time);

            log::info!(
                "Frequency range {} done in {:.3} s, {} of {} rows converged",
                r,
                output.wall_time,
                output.states.iter().filter(|&&s| s == FitState::Converged.code()).count(),
                n_rows
            );
        }

        let result = FitResult {
            parameters: stack(Axis(1), &parameters.iter().map(|a| a.view()).collect::<Vec<_>>())?,
            chi_squares: stack(Axis(1), &chi_squares.iter().map(|a| a.view()).collect::<Vec<_>>())?,
            states: stack(Axis(1), &states.iter().map(|a| a.view()).collect::<Vec<_>>())?,
            iterations: stack(Axis(1), &iterations.iter().map(|a| a.view()).collect::<Vec<_>>())?,
            execution_times: Array1::from_vec(times),
        };

        self.result = Some(result);
        Ok(())
    }

    fn require_result(&self) -> Result<&FitResult> {
        self.result.as_ref().ok_or_else(|| {
            OdmrFitError::ParameterLookup(
                "No fit results available, call fit() first".to_string(),
            )
        })
    }

    /// Results of the last fit, if any.
    pub fn result(&self) -> Option<&FitResult> {
        self.result.as_ref()
    }

    /// `[polarization, frequency_range, row, col, slot]` parameters.
    pub fn parameters(&self) -> Result<&Array5<f32>> {
        Ok(&self.require_result()?.parameters)
    }

    pub fn chi_squares(&self) -> Result<&Array4<f32>> {
        Ok(&self.require_result()?.chi_squares)
    }

    pub fn states(&self) -> Result<&Array4<i32>> {
        Ok(&self.require_result()?.states)
    }

    pub fn iterations(&self) -> Result<&Array4<i32>> {
        Ok(&self.require_result()?.iterations)
    }

    pub fn execution_times(&self) -> Result<&Array1<f64>> {
        Ok(&self.require_result()?.execution_times)
    }

    /// One `[polarization, frequency_range, row, col]` map by name.
    ///
    /// Accepts unique slot names, kind names that map to a single slot,
    /// `resonance`, `mean_contrast` (average over every contrast slot) and
    /// `chi2`/`chi_squares`/`chi_squared`/`chi_square`.
    pub fn param(&self, name: &str) -> Result<Array4<f32>> {
        let result = self.require_result()?;

        if CHI_SQUARE_NAMES.contains(&name) {
            return Ok(result.chi_squares.clone());
        }

        let indices = self.constraints.indexer().lookup(name)?;
        match indices.as_slice() {
            [index] => Ok(result.parameters.index_axis(Axis(4), *index).to_owned()),
            _ if name == "mean_contrast" => result
                .parameters
                .select(Axis(4), &indices)
                .mean_axis(Axis(4))
                .ok_or_else(|| OdmrFitError::ParameterLookup("No contrast slots".to_string())),
            _ => Err(OdmrFitError::ParameterLookup(format!(
                "'{}' names {} slots of {}, choose from {:?} or mean_contrast",
                name,
                indices.len(),
                self.model,
                self.slot_names()
            ))),
        }
    }

    /// Unit of the values returned by [`Fit::param`] for `name`.
    pub fn unit(&self, name: &str) -> Result<&'static str> {
        if CHI_SQUARE_NAMES.contains(&name) {
            return Ok("a.u.");
        }
        let indices = self.constraints.indexer().lookup(name)?;
        Ok(indices
            .first()
            .and_then(|&i| self.constraints.indexer().kind_of(i))
            .unwrap_or(ParameterKind::Contrast)
            .unit())
    }
}

impl fmt::Display for Fit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Fit(model: {} [{}], data: {:?}, scan: {}x{}, solver: {}, fitted: {})",
            self.model,
            self.model.description(),
            self.data.shape(),
            self.scan_dimensions.0,
            self.scan_dimensions.1,
            self.solver.name(),
            self.fitted()
        )?;
        for (slot, constraint) in self
            .constraints
            .indexer()
            .slots()
            .iter()
            .zip(self.constraints.constraints())
        {
            writeln!(f, "  {:<12} {}", slot.name(), constraint)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fit")
            .field("model", &self.model)
            .field("data", &self.data.shape())
            .field("scan_dimensions", &self.scan_dimensions)
            .field("solver", &self.solver.name())
            .field("fitted", &self.fitted())
            .finish()
    }
}
