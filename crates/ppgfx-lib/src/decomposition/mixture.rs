//! Gaussian and skewed-Gaussian waveform models on normalized time.

use super::numeric::{integrate_real_line, DEFAULT_TOLERANCE};
use crate::error::{PulseError, PulseResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, SQRT_2};

/// Components per mixture in both model families.
pub const COMPONENTS: usize = 4;

/// Beyond this many widths from its centre a component is treated as zero
/// when integrating.
const SUPPORT_WIDTHS: f64 = 12.0;

/// `amp * exp(-(t - mean)^2 / (2 spread^2))`. A zero spread contributes nothing.
pub fn gaussian(t: f64, amp: f64, mean: f64, spread: f64) -> f64 {
    if spread == 0.0 {
        return 0.0;
    }
    amp * (-(t - mean).powi(2) / (2.0 * spread * spread)).exp()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianComponent {
    pub amp: f64,
    pub mean: f64,
    pub spread: f64,
}

impl GaussianComponent {
    pub fn new(amp: f64, mean: f64, spread: f64) -> Self {
        Self { amp, mean, spread }
    }

    pub fn eval(&self, t: f64) -> f64 {
        gaussian(t, self.amp, self.mean, self.spread)
    }

    fn support(&self) -> (f64, f64) {
        let w = SUPPORT_WIDTHS * self.spread.abs();
        (self.mean - w, self.mean + w)
    }
}

/// Element-wise sum of any number of Gaussian bumps.
pub fn gaussian_sum(t: f64, components: &[GaussianComponent]) -> f64 {
    components.iter().map(|c| c.eval(t)).sum()
}

/// Integral over the real line of a sum of Gaussian bumps.
pub fn gaussian_integral(components: &[GaussianComponent]) -> f64 {
    integrate_real_line(
        &|t| gaussian_sum(t, components),
        components.iter().map(GaussianComponent::support),
        DEFAULT_TOLERANCE,
    )
}

/// How the skew term enters the error function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkewForm {
    /// Skew-normal density: `erf(shape (t - loc) / (sqrt(2) scale))`.
    #[default]
    Conventional,
    /// Multiplies by `scale` inside the error function. Kept to reproduce
    /// historical outputs: `erf(shape (t - loc) / sqrt(2) * scale)`.
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkewedComponent {
    pub amp: f64,
    pub loc: f64,
    pub scale: f64,
    pub shape: f64,
}

impl SkewedComponent {
    pub fn new(amp: f64, loc: f64, scale: f64, shape: f64) -> Self {
        Self {
            amp,
            loc,
            scale,
            shape,
        }
    }

    pub fn eval(&self, t: f64, form: SkewForm) -> f64 {
        skewed_gaussian(t, self.amp, self.loc, self.scale, self.shape, form)
    }

    fn support(&self) -> (f64, f64) {
        let w = SUPPORT_WIDTHS * self.scale.abs();
        (self.loc - w, self.loc + w)
    }
}

/// Skewed Gaussian bump. A zero scale contributes nothing.
pub fn skewed_gaussian(t: f64, amp: f64, loc: f64, scale: f64, shape: f64, form: SkewForm) -> f64 {
    if scale == 0.0 {
        return 0.0;
    }
    let dt = t - loc;
    let skew_arg = match form {
        SkewForm::Conventional => shape * dt / (SQRT_2 * scale),
        SkewForm::Legacy => shape * dt / SQRT_2 * scale,
    };
    (amp / (scale * (2.0 * PI).sqrt()))
        * (-(dt * dt) / (2.0 * scale * scale)).exp()
        * (1.0 + libm::erf(skew_arg))
}

pub fn skewed_sum(t: f64, components: &[SkewedComponent], form: SkewForm) -> f64 {
    components.iter().map(|c| c.eval(t, form)).sum()
}

pub fn skewed_integral(components: &[SkewedComponent], form: SkewForm) -> f64 {
    integrate_real_line(
        &|t| skewed_sum(t, components, form),
        components.iter().map(SkewedComponent::support),
        DEFAULT_TOLERANCE,
    )
}

/// Fitted parameters of a 4-component Gaussian mixture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianMixture {
    pub components: [GaussianComponent; COMPONENTS],
}

impl GaussianMixture {
    pub const PARAMS: usize = 3 * COMPONENTS;

    /// Parse `[a1, m1, v1, .., a4, m4, v4]`.
    pub fn from_params(params: &[f64]) -> PulseResult<Self> {
        if params.len() != Self::PARAMS {
            return Err(PulseError::config(format!(
                "Gaussian mixture needs {} parameters, got {}",
                Self::PARAMS,
                params.len()
            )));
        }
        let mut components = [GaussianComponent::new(0.0, 0.0, 0.0); COMPONENTS];
        for (c, p) in components.iter_mut().zip(params.chunks_exact(3)) {
            *c = GaussianComponent::new(p[0], p[1], p[2]);
        }
        Ok(Self { components })
    }

    pub fn params(&self) -> Vec<f64> {
        self.components
            .iter()
            .flat_map(|c| [c.amp, c.mean, c.spread])
            .collect()
    }

    pub fn column_names() -> Vec<String> {
        (1..=COMPONENTS)
            .flat_map(|k| [format!("a{k}"), format!("m{k}"), format!("v{k}")])
            .collect()
    }

    pub fn eval(&self, t: f64) -> f64 {
        gaussian_sum(t, &self.components)
    }

    pub fn integral(&self) -> f64 {
        gaussian_integral(&self.components)
    }
}

/// Fitted parameters of a 4-component skewed-Gaussian mixture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkewedMixture {
    pub components: [SkewedComponent; COMPONENTS],
    pub form: SkewForm,
}

impl SkewedMixture {
    pub const PARAMS: usize = 4 * COMPONENTS;

    /// Parse `[a1, loc1, scale1, shape1, .., a4, loc4, scale4, shape4]`.
    pub fn from_params(params: &[f64], form: SkewForm) -> PulseResult<Self> {
        if params.len() != Self::PARAMS {
            return Err(PulseError::config(format!(
                "skewed mixture needs {} parameters, got {}",
                Self::PARAMS,
                params.len()
            )));
        }
        let mut components = [SkewedComponent::new(0.0, 0.0, 0.0, 0.0); COMPONENTS];
        for (c, p) in components.iter_mut().zip(params.chunks_exact(4)) {
            *c = SkewedComponent::new(p[0], p[1], p[2], p[3]);
        }
        Ok(Self { components, form })
    }

    pub fn params(&self) -> Vec<f64> {
        self.components
            .iter()
            .flat_map(|c| [c.amp, c.loc, c.scale, c.shape])
            .collect()
    }

    pub fn column_names() -> Vec<String> {
        (1..=COMPONENTS)
            .flat_map(|k| {
                [
                    format!("a{k}"),
                    format!("loc{k}"),
                    format!("scale{k}"),
                    format!("shape{k}"),
                ]
            })
            .collect()
    }

    pub fn eval(&self, t: f64) -> f64 {
        skewed_sum(t, &self.components, self.form)
    }

    pub fn integral(&self) -> f64 {
        skewed_integral(&self.components, self.form)
    }
}

/// Normalized sample times `i / n` for `i = 0..n`.
pub fn unit_times(n: usize) -> Vec<f64> {
    (0..n).map(|i| i as f64 / n as f64).collect()
}
