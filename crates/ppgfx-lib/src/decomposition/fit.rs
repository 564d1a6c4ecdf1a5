//! Bounded nonlinear least-squares decomposition of canonical pulses.
//!
//! Both model families share one Levenberg–Marquardt driver. Parameters are
//! projected onto the non-negative orthant every time the solver moves them,
//! so a returned fit never carries a negative amplitude, location or width.

use super::mixture::{
    gaussian, skewed_gaussian, unit_times, GaussianMixture, SkewForm, SkewedMixture, COMPONENTS,
};
use crate::{
    error::{PulseError, PulseResult},
    preprocess::CanonicalPulse,
};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use log::debug;
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};
use serde::{Deserialize, Serialize};

const FD_STEP: f64 = 6e-6;

/// Limits handed to the least-squares solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Residual evaluations allowed before the fit counts as diverged.
    pub max_evaluations: usize,
    /// Relative tolerance on both the objective and the parameter step.
    pub tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_evaluations: 100_000,
            tolerance: 1e-10,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> PulseResult<()> {
        if self.max_evaluations == 0 {
            return Err(PulseError::config("max_evaluations must be positive"));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(PulseError::config(format!(
                "solver tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// How caller-supplied initial guesses relate to the pulse being fitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuessScaling {
    /// Guesses are used exactly as given, in normalized units.
    #[default]
    Raw,
    /// Guesses are in the raw pulse's units: amplitudes in signal units are
    /// divided by the raw pulse peak, locations and widths in samples are
    /// divided by the pulse length.
    PulseScaled,
}

impl GuessScaling {
    /// Apply the strategy to a flat guess vector of `per_component`-sized
    /// chunks laid out as `(amplitude, location, width, ..)`.
    pub fn apply(
        self,
        initials: &[f64],
        per_component: usize,
        pulse: &CanonicalPulse,
    ) -> Vec<f64> {
        let mut guess = initials.to_vec();
        if self == GuessScaling::PulseScaled && !pulse.is_empty() && pulse.raw_peak > 0.0 {
            let len = pulse.len() as f64;
            for chunk in guess.chunks_mut(per_component) {
                chunk[0] /= pulse.raw_peak;
                chunk[1] /= len;
                chunk[2] /= len;
            }
        }
        guess
    }
}

/// A mixture family the least-squares driver can evaluate.
pub trait MixtureModel: Sync {
    /// Parameters contributed by one component.
    const PER_COMPONENT: usize;
    /// Length of a full parameter vector.
    const PARAMS: usize = Self::PER_COMPONENT * COMPONENTS;

    fn family(&self) -> &'static str;

    fn eval(&self, t: f64, params: &[f64]) -> f64;

    /// Partial derivatives of `eval` with respect to every parameter.
    fn gradient(&self, t: f64, params: &[f64], out: &mut [f64]) {
        numeric_gradient(self, t, params, out);
    }
}

/// Finite-difference gradient. Steps forward instead of centrally when the
/// backward point would leave the non-negative orthant.
pub fn numeric_gradient<M: MixtureModel + ?Sized>(
    model: &M,
    t: f64,
    params: &[f64],
    out: &mut [f64],
) {
    let mut probe = params.to_vec();
    for (j, slot) in out.iter_mut().enumerate() {
        let p = params[j];
        let h = FD_STEP * p.abs().max(1.0);
        probe[j] = p + h;
        let up = model.eval(t, &probe);
        if p - h >= 0.0 {
            probe[j] = p - h;
            *slot = (up - model.eval(t, &probe)) / (2.0 * h);
        } else {
            probe[j] = p;
            *slot = (up - model.eval(t, &probe)) / h;
        }
        probe[j] = p;
    }
}

/// Four plain Gaussians, `(amplitude, mean, spread)` per component.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianModel;

impl MixtureModel for GaussianModel {
    const PER_COMPONENT: usize = 3;

    fn family(&self) -> &'static str {
        "gaussian"
    }

    fn eval(&self, t: f64, params: &[f64]) -> f64 {
        params
            .chunks_exact(3)
            .map(|p| gaussian(t, p[0], p[1], p[2]))
            .sum()
    }

    fn gradient(&self, t: f64, params: &[f64], out: &mut [f64]) {
        for (p, g) in params.chunks_exact(3).zip(out.chunks_exact_mut(3)) {
            let (a, m, v) = (p[0], p[1], p[2]);
            if v == 0.0 {
                g.fill(0.0);
                continue;
            }
            let d = t - m;
            let e = (-(d * d) / (2.0 * v * v)).exp();
            g[0] = e;
            g[1] = a * e * d / (v * v);
            g[2] = a * e * d * d / (v * v * v);
        }
    }
}

/// Four skewed Gaussians, `(amplitude, location, scale, shape)` per component.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkewedModel {
    pub form: SkewForm,
}

impl MixtureModel for SkewedModel {
    const PER_COMPONENT: usize = 4;

    fn family(&self) -> &'static str {
        "skewed"
    }

    fn eval(&self, t: f64, params: &[f64]) -> f64 {
        params
            .chunks_exact(4)
            .map(|p| skewed_gaussian(t, p[0], p[1], p[2], p[3], self.form))
            .sum()
    }
}

/// Outcome of one successful fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub params: Vec<f64>,
    pub evaluations: usize,
    /// Half the residual sum of squares at the solution.
    pub objective: f64,
}

struct MixtureProblem<'a, M: MixtureModel> {
    model: &'a M,
    times: Vec<f64>,
    samples: &'a [f64],
    params: DVector<f64>,
}

impl<M: MixtureModel> LeastSquaresProblem<f64, Dyn, Dyn> for MixtureProblem<'_, M> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params = x.map(|v| v.max(0.0));
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let p = self.params.as_slice();
        let r = DVector::from_iterator(
            self.times.len(),
            self.times
                .iter()
                .zip(self.samples)
                .map(|(&t, &y)| self.model.eval(t, p) - y),
        );
        r.iter().all(|v| v.is_finite()).then_some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let p = self.params.as_slice();
        let mut jac = DMatrix::zeros(self.times.len(), p.len());
        let mut row = vec![0.0; p.len()];
        for (i, &t) in self.times.iter().enumerate() {
            self.model.gradient(t, p, &mut row);
            for (j, &g) in row.iter().enumerate() {
                jac[(i, j)] = g;
            }
        }
        jac.iter().all(|v| v.is_finite()).then_some(jac)
    }
}

/// Check an initial guess before any fitting starts.
pub fn validate_initials<M: MixtureModel>(_model: &M, initials: &[f64]) -> PulseResult<()> {
    if initials.len() != M::PARAMS {
        return Err(PulseError::config(format!(
            "initial guess needs {} values, got {}",
            M::PARAMS,
            initials.len()
        )));
    }
    if let Some(bad) = initials.iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
        return Err(PulseError::config(format!(
            "initial guess values must be finite and non-negative, got {bad}"
        )));
    }
    Ok(())
}

/// Fit `model` to `samples` taken at `t = i / N`, starting from `initials`.
pub fn fit_mixture<M: MixtureModel>(
    model: &M,
    samples: &[f64],
    initials: &[f64],
    solver: &SolverConfig,
) -> PulseResult<FitReport> {
    validate_initials(model, initials)?;
    solver.validate()?;
    if samples.len() < initials.len() {
        return Err(PulseError::degenerate(format!(
            "{} samples cannot determine {} {} parameters",
            samples.len(),
            initials.len(),
            model.family()
        )));
    }
    let problem = MixtureProblem {
        model,
        times: unit_times(samples.len()),
        samples,
        params: DVector::from_column_slice(initials),
    };
    let patience = (solver.max_evaluations / (initials.len() + 1)).max(1);
    let (solved, report) = LevenbergMarquardt::new()
        .with_ftol(solver.tolerance)
        .with_xtol(solver.tolerance)
        .with_patience(patience)
        .minimize(problem);
    debug!(
        "{} fit: {:?} after {} evaluations (objective {:.3e})",
        model.family(),
        report.termination,
        report.number_of_evaluations,
        report.objective_function
    );
    if !report.termination.was_successful() {
        return Err(PulseError::FitDivergence {
            reason: format!("{:?}", report.termination),
            evaluations: report.number_of_evaluations,
        });
    }
    let params: Vec<f64> = solved.params.iter().copied().collect();
    if params.iter().any(|v| !v.is_finite()) {
        return Err(PulseError::FitDivergence {
            reason: "solution contains non-finite parameters".into(),
            evaluations: report.number_of_evaluations,
        });
    }
    Ok(FitReport {
        params,
        evaluations: report.number_of_evaluations,
        objective: report.objective_function,
    })
}

/// Fit four Gaussians to raw samples.
pub fn fit_gaussians(
    samples: &[f64],
    initials: &[f64],
    solver: &SolverConfig,
) -> PulseResult<GaussianMixture> {
    let report = fit_mixture(&GaussianModel, samples, initials, solver)?;
    GaussianMixture::from_params(&report.params)
}

/// Fit four skewed Gaussians to raw samples.
pub fn fit_skewed(
    samples: &[f64],
    initials: &[f64],
    form: SkewForm,
    solver: &SolverConfig,
) -> PulseResult<SkewedMixture> {
    let report = fit_mixture(&SkewedModel { form }, samples, initials, solver)?;
    SkewedMixture::from_params(&report.params, form)
}

/// Gaussian decomposition of canonical pulses with a fixed guess strategy.
#[derive(Debug, Clone)]
pub struct GaussianFitter {
    initials: Vec<f64>,
    scaling: GuessScaling,
    solver: SolverConfig,
}

impl GaussianFitter {
    pub fn new(
        initials: Vec<f64>,
        scaling: GuessScaling,
        solver: SolverConfig,
    ) -> PulseResult<Self> {
        validate_initials(&GaussianModel, &initials)?;
        solver.validate()?;
        Ok(Self {
            initials,
            scaling,
            solver,
        })
    }

    pub fn fit(&self, pulse: &CanonicalPulse) -> PulseResult<GaussianMixture> {
        let guess = self
            .scaling
            .apply(&self.initials, GaussianModel::PER_COMPONENT, pulse);
        fit_gaussians(&pulse.samples, &guess, &self.solver)
    }
}

/// Skewed-Gaussian decomposition of canonical pulses.
#[derive(Debug, Clone)]
pub struct SkewedFitter {
    initials: Vec<f64>,
    scaling: GuessScaling,
    form: SkewForm,
    solver: SolverConfig,
}

impl SkewedFitter {
    pub fn new(
        initials: Vec<f64>,
        scaling: GuessScaling,
        form: SkewForm,
        solver: SolverConfig,
    ) -> PulseResult<Self> {
        validate_initials(&SkewedModel { form }, &initials)?;
        solver.validate()?;
        Ok(Self {
            initials,
            scaling,
            form,
            solver,
        })
    }

    pub fn fit(&self, pulse: &CanonicalPulse) -> PulseResult<SkewedMixture> {
        let guess = self
            .scaling
            .apply(&self.initials, SkewedModel::PER_COMPONENT, pulse);
        fit_skewed(&pulse.samples, &guess, self.form, &self.solver)
    }
}
