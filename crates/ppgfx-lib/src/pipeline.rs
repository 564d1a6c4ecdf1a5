//! End-to-end feature extraction for one recording.
//!
//! Segments the channels, fits both mixture families to every pulse, derives
//! the Gaussian indices, extracts the secondary features and summarizes every
//! table. A failure on one pulse is recorded and leaves a missing row; only
//! configuration errors abort the run, and they are raised before any fit.

use crate::{
    decomposition::{
        GaussianFitter, GaussianIndices, GaussianMixture, GuessScaling, SkewForm, SkewedFitter,
        SkewedMixture, SolverConfig,
    },
    error::{PulseError, PulseResult},
    metrics::{pulse_shape, summarize, vpg_phase, PulseShape, VpgPhase},
    preprocess::canonical_pulse,
    segment::segment_recording,
    signal::{Landmarks, Recording},
    table::{FeatureTable, StatsTable},
};
use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path};

/// Band-pass settings used by whoever produced the channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub low_hz: f64,
    pub high_hz: f64,
    pub order: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            low_hz: 0.5,
            high_hz: 12.0,
            order: 4,
        }
    }
}

/// Smoothing windows (ms) applied to each channel upstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub ppg_ms: f64,
    pub vpg_ms: f64,
    pub apg_ms: f64,
    pub jpg_ms: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            ppg_ms: 50.0,
            vpg_ms: 10.0,
            apg_ms: 10.0,
            jpg_ms: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionConfig {
    pub gaussian: bool,
    pub skewed: bool,
    /// `(amplitude, mean, spread)` for each of the four components.
    pub gaussian_initials: Vec<f64>,
    /// `(amplitude, location, scale, shape)` for each of the four components.
    pub skewed_initials: Vec<f64>,
    pub guess_scaling: GuessScaling,
    pub skew_form: SkewForm,
    pub max_evaluations: usize,
    pub tolerance: f64,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        let solver = SolverConfig::default();
        Self {
            gaussian: true,
            skewed: true,
            gaussian_initials: vec![
                1.0, 0.2, 0.05, 0.5, 0.4, 0.05, 0.3, 0.6, 0.05, 0.1, 0.8, 0.05,
            ],
            skewed_initials: vec![
                0.05, 0.2, 0.125, 0.1, 0.05, 0.4, 0.125, 0.1, 0.05, 0.6, 0.125, 0.1, 0.05, 0.8,
                0.125, 0.1,
            ],
            guess_scaling: GuessScaling::Raw,
            skew_form: SkewForm::Conventional,
            max_evaluations: solver.max_evaluations,
            tolerance: solver.tolerance,
        }
    }
}

impl DecompositionConfig {
    pub fn solver(&self) -> SolverConfig {
        SolverConfig {
            max_evaluations: self.max_evaluations,
            tolerance: self.tolerance,
        }
    }

    pub fn gaussian_fitter(&self) -> PulseResult<GaussianFitter> {
        GaussianFitter::new(
            self.gaussian_initials.clone(),
            self.guess_scaling,
            self.solver(),
        )
    }

    pub fn skewed_fitter(&self) -> PulseResult<SkewedFitter> {
        SkewedFitter::new(
            self.skewed_initials.clone(),
            self.guess_scaling,
            self.skew_form,
            self.solver(),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub folder: String,
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            folder: "results".into(),
            format: OutputFormat::Csv,
        }
    }
}

/// Everything that controls one extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sampling rate of the channels in Hz.
    pub fs: f64,
    pub filter: FilterConfig,
    pub smoothing: SmoothingConfig,
    pub decomposition: DecompositionConfig,
    pub output: OutputConfig,
    /// Fit pulses on the rayon pool when the `parallel` feature is built.
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fs: 200.0,
            filter: FilterConfig::default(),
            smoothing: SmoothingConfig::default(),
            decomposition: DecompositionConfig::default(),
            output: OutputConfig::default(),
            parallel: true,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> PulseResult<Self> {
        let cfg: Self = toml::from_str(text).map_err(|e| PulseError::config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let cfg = Self::from_toml_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> PulseResult<()> {
        if !(self.fs.is_finite() && self.fs > 0.0) {
            return Err(PulseError::config(format!(
                "sampling rate must be positive, got {}",
                self.fs
            )));
        }
        let f = &self.filter;
        if !(f.low_hz > 0.0 && f.low_hz < f.high_hz && f.high_hz.is_finite()) || f.order == 0 {
            return Err(PulseError::config(format!(
                "filter band {}..{} Hz (order {}) is invalid",
                f.low_hz, f.high_hz, f.order
            )));
        }
        let s = &self.smoothing;
        for (name, ms) in [
            ("ppg", s.ppg_ms),
            ("vpg", s.vpg_ms),
            ("apg", s.apg_ms),
            ("jpg", s.jpg_ms),
        ] {
            if !(ms.is_finite() && ms >= 0.0) {
                return Err(PulseError::config(format!(
                    "{name} smoothing window must be non-negative, got {ms}"
                )));
            }
        }
        self.decomposition.gaussian_fitter()?;
        self.decomposition.skewed_fitter()?;
        if self.output.folder.trim().is_empty() {
            return Err(PulseError::config("output folder is empty"));
        }
        Ok(())
    }
}

/// Feature table family, used to label per-pulse failures and output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Gaussian,
    GaussianIndices,
    Skewed,
    Vpg,
    PpgExtra,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Family::Gaussian => "gaussian",
            Family::GaussianIndices => "gaussian_indices",
            Family::Skewed => "skewed",
            Family::Vpg => "vpg",
            Family::PpgExtra => "ppg_extra",
        };
        f.write_str(name)
    }
}

/// A pulse that produced no row in one family's table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseFailure {
    pub family: Family,
    /// Zero-based pulse index, equal to its landmark row.
    pub pulse: usize,
    pub error: PulseError,
}

/// A feature table with its statistics. `stats` is `None` when no row of
/// the table could be summarized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureOutput {
    pub features: FeatureTable,
    pub stats: Option<StatsTable>,
}

impl FeatureOutput {
    fn summarized(family: Family, features: FeatureTable) -> Self {
        let stats = match summarize(&features) {
            Ok(stats) => Some(stats),
            Err(err) => {
                warn!("no {family} statistics: {err}");
                None
            }
        };
        Self { features, stats }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    /// Number of pulses, one per landmark row.
    pub pulses: usize,
    pub gaussian: Option<FeatureOutput>,
    pub gaussian_indices: Option<FeatureOutput>,
    pub skewed: Option<FeatureOutput>,
    pub vpg: FeatureOutput,
    pub ppg_extra: FeatureOutput,
    pub failures: Vec<PulseFailure>,
}

struct PulseOutcome {
    gaussian: Option<PulseResult<GaussianMixture>>,
    indices: Option<PulseResult<GaussianIndices>>,
    skewed: Option<PulseResult<SkewedMixture>>,
    vpg: PulseResult<VpgPhase>,
    shape: PulseResult<PulseShape>,
}

fn process_pulse(
    ppg: &[f64],
    vpg: &[f64],
    notch: Option<usize>,
    gaussian: Option<&GaussianFitter>,
    skewed: Option<&SkewedFitter>,
) -> PulseOutcome {
    let canonical = canonical_pulse(ppg);
    let gaussian = gaussian.map(|fitter| {
        canonical
            .as_ref()
            .map_err(Clone::clone)
            .and_then(|pulse| fitter.fit(pulse))
    });
    let indices = gaussian
        .as_ref()
        .and_then(|fit| fit.as_ref().ok())
        .map(GaussianIndices::compute);
    let skewed = skewed.map(|fitter| {
        canonical
            .as_ref()
            .map_err(Clone::clone)
            .and_then(|pulse| fitter.fit(pulse))
    });
    PulseOutcome {
        gaussian,
        indices,
        skewed,
        vpg: vpg_phase(vpg, notch),
        shape: pulse_shape(ppg),
    }
}

/// Map `f` over `0..n`, on the rayon pool when enabled. Output keeps index order.
fn map_pulses<T, F>(n: usize, parallel: bool, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        if parallel {
            use rayon::prelude::*;
            return (0..n).into_par_iter().map(f).collect();
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel;
    (0..n).map(f).collect()
}

/// Append one pulse's result to `table`, recording a failure for an error.
fn push_row<T>(
    table: &mut FeatureTable,
    failures: &mut Vec<PulseFailure>,
    family: Family,
    pulse: usize,
    outcome: Option<PulseResult<T>>,
    values: impl Fn(&T) -> Vec<f64>,
) -> PulseResult<()> {
    match outcome {
        Some(Ok(v)) => table.push(values(&v))?,
        Some(Err(error)) => {
            warn!("pulse {}: {family} failed: {error}", pulse + 1);
            failures.push(PulseFailure {
                family,
                pulse,
                error,
            });
            table.push_missing();
        }
        None => table.push_missing(),
    }
    Ok(())
}

/// Run the full extraction on one recording.
///
/// Row `i` of every table belongs to landmark row `i`. Samples before the
/// first onset are not a pulse and are skipped.
pub fn run_pipeline(
    recording: &Recording,
    landmarks: &Landmarks,
    config: &PipelineConfig,
) -> PulseResult<PipelineResult> {
    config.validate()?;
    if (recording.fs - config.fs).abs() > f64::EPSILON * config.fs {
        return Err(PulseError::config(format!(
            "recording is sampled at {} Hz but the configuration says {} Hz",
            recording.fs, config.fs
        )));
    }
    landmarks.validate(recording.len())?;
    let segments = segment_recording(recording, landmarks)?;
    let dec = &config.decomposition;
    let gaussian_fitter = dec.gaussian.then(|| dec.gaussian_fitter()).transpose()?;
    let skewed_fitter = dec.skewed.then(|| dec.skewed_fitter()).transpose()?;
    info!(
        "extracting features from {} pulses ({:.1} s), gaussian={}, skewed={}",
        segments.len(),
        recording.duration(),
        dec.gaussian,
        dec.skewed
    );

    let outcomes = map_pulses(segments.len(), config.parallel, |i| {
        process_pulse(
            segments.ppg[i],
            segments.vpg[i],
            landmarks.notch_offset(i),
            gaussian_fitter.as_ref(),
            skewed_fitter.as_ref(),
        )
    });

    let mut failures = Vec::new();
    let mut gaussian = FeatureTable::new(GaussianMixture::column_names());
    let mut indices = FeatureTable::new(GaussianIndices::NAMES);
    let mut skewed = FeatureTable::new(SkewedMixture::column_names());
    let mut vpg = FeatureTable::new(VpgPhase::NAMES);
    let mut ppg_extra = FeatureTable::new(PulseShape::NAMES);
    for (i, outcome) in outcomes.into_iter().enumerate() {
        push_row(&mut gaussian, &mut failures, Family::Gaussian, i, outcome.gaussian, |m| {
            m.params()
        })?;
        push_row(
            &mut indices,
            &mut failures,
            Family::GaussianIndices,
            i,
            outcome.indices,
            GaussianIndices::values,
        )?;
        push_row(&mut skewed, &mut failures, Family::Skewed, i, outcome.skewed, |m| {
            m.params()
        })?;
        push_row(
            &mut vpg,
            &mut failures,
            Family::Vpg,
            i,
            Some(outcome.vpg),
            VpgPhase::values,
        )?;
        push_row(
            &mut ppg_extra,
            &mut failures,
            Family::PpgExtra,
            i,
            Some(outcome.shape),
            PulseShape::values,
        )?;
    }

    if let Some(fatal) = failures.iter().find(|f| f.error.is_fatal()) {
        return Err(fatal.error.clone());
    }
    info!(
        "extracted {} pulses with {} per-pulse failures",
        segments.len(),
        failures.len()
    );
    Ok(PipelineResult {
        pulses: segments.len(),
        gaussian: dec
            .gaussian
            .then(|| FeatureOutput::summarized(Family::Gaussian, gaussian)),
        gaussian_indices: dec
            .gaussian
            .then(|| FeatureOutput::summarized(Family::GaussianIndices, indices)),
        skewed: dec
            .skewed
            .then(|| FeatureOutput::summarized(Family::Skewed, skewed)),
        vpg: FeatureOutput::summarized(Family::Vpg, vpg),
        ppg_extra: FeatureOutput::summarized(Family::PpgExtra, ppg_extra),
        failures,
    })
}
