//! Hemodynamic indices derived from one pulse's Gaussian decomposition.

use super::{
    mixture::{gaussian_integral, gaussian_sum, GaussianComponent, GaussianMixture},
    numeric::maximize,
};
use crate::error::{PulseError, PulseResult};
use serde::{Deserialize, Serialize};

/// Points on `[0, 1)` used for the round-trip measure.
const ROUND_TRIP_POINTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianIndices {
    pub augmentation_index: f64,
    pub reflection_index: f64,
    pub round_trip: f64,
    /// `(a1 - a2) / a1`
    pub a1_a2_ratio: f64,
    /// `a3 / a1`
    pub a3_a1_ratio: f64,
    /// `a4 / a1`
    pub a4_a1_ratio: f64,
    /// `v4 / a1`
    pub v4_a1_ratio: f64,
    pub sys_dia: f64,
}

impl GaussianIndices {
    pub const NAMES: [&'static str; 8] = [
        "augmentation_index",
        "reflection_index",
        "round_trip",
        "a1_a2_ratio",
        "a3_a1_ratio",
        "a4_a1_ratio",
        "v4_a1_ratio",
        "sys_dia",
    ];

    pub fn compute(mix: &GaussianMixture) -> PulseResult<Self> {
        let [c1, c2, c3, c4] = mix.components;
        let a1 = c1.amp;
        if a1 == 0.0 {
            return Err(PulseError::undefined("a1_a2_ratio", "first amplitude is zero"));
        }
        Ok(Self {
            augmentation_index: augmentation_index(&c1, &c2, &c3)?,
            reflection_index: reflection_index(&c1, &c2, &c3),
            round_trip: round_trip(&c1, &c3),
            a1_a2_ratio: (a1 - c2.amp) / a1,
            a3_a1_ratio: c3.amp / a1,
            a4_a1_ratio: c4.amp / a1,
            v4_a1_ratio: c4.spread / a1,
            sys_dia: sys_dia(&c1, &c2, &c3, &c4)?,
        })
    }

    pub fn values(&self) -> Vec<f64> {
        vec![
            self.augmentation_index,
            self.reflection_index,
            self.round_trip,
            self.a1_a2_ratio,
            self.a3_a1_ratio,
            self.a4_a1_ratio,
            self.v4_a1_ratio,
            self.sys_dia,
        ]
    }
}

/// Global maximum over the real line of the sum of two non-negative bumps.
///
/// Outside the interval spanned by the two means both bumps move the same
/// way, so the maximum lies between them. Narrow bumps can fall between grid
/// points, hence the means themselves are checked too.
pub fn systolic_peak(c1: &GaussianComponent, c2: &GaussianComponent) -> f64 {
    let pair = [*c1, *c2];
    let f = |t: f64| gaussian_sum(t, &pair);
    let lo = c1.mean.min(c2.mean);
    let hi = c1.mean.max(c2.mean);
    let (_, searched) = maximize(&f, lo, hi);
    searched.max(f(c1.mean)).max(f(c2.mean))
}

/// Systolic peak of components 1 and 2 relative to the amplitude of component 3.
pub fn augmentation_index(
    c1: &GaussianComponent,
    c2: &GaussianComponent,
    c3: &GaussianComponent,
) -> PulseResult<f64> {
    if c3.amp == 0.0 {
        return Err(PulseError::undefined(
            "augmentation_index",
            "third amplitude is zero",
        ));
    }
    Ok(systolic_peak(c1, c2) / c3.amp)
}

/// Area of components 1 and 2 minus the area of component 3.
pub fn reflection_index(
    c1: &GaussianComponent,
    c2: &GaussianComponent,
    c3: &GaussianComponent,
) -> f64 {
    gaussian_integral(&[*c1, *c2]) - gaussian_integral(&[*c3])
}

/// Mean level of component 3 minus that of component 1 over `[0, 1)`.
pub fn round_trip(c1: &GaussianComponent, c3: &GaussianComponent) -> f64 {
    let mean_of = |c: &GaussianComponent| {
        (0..ROUND_TRIP_POINTS)
            .map(|i| c.eval(i as f64 / ROUND_TRIP_POINTS as f64))
            .sum::<f64>()
            / ROUND_TRIP_POINTS as f64
    };
    mean_of(c3) - mean_of(c1)
}

/// Ratio of systolic (components 1+2) to diastolic (3+4) area.
pub fn sys_dia(
    c1: &GaussianComponent,
    c2: &GaussianComponent,
    c3: &GaussianComponent,
    c4: &GaussianComponent,
) -> PulseResult<f64> {
    let dia = gaussian_integral(&[*c3, *c4]);
    if dia == 0.0 {
        return Err(PulseError::undefined("sys_dia", "diastolic area is zero"));
    }
    Ok(gaussian_integral(&[*c1, *c2]) / dia)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "expected {expected}, got {actual} (diff {diff} > tol {tol})"
        );
    }

    fn mixture(amps: [f64; 4]) -> GaussianMixture {
        GaussianMixture::from_params(&[
            amps[0], 0.2, 0.05, amps[1], 0.4, 0.05, amps[2], 0.6, 0.05, amps[3], 0.8, 0.07,
        ])
        .unwrap()
    }

    #[test]
    fn reference_mixture_indices() {
        let idx = GaussianIndices::compute(&mixture([1.0, 0.5, 0.3, 0.1])).unwrap();
        let unit_area = 0.05 * (2.0 * PI).sqrt();
        // Component 2 adds exp(-8) * 0.5 on top of component 1 at its mean.
        assert!(idx.augmentation_index > 1.0 / 0.3);
        assert_close(idx.augmentation_index, 1.0 / 0.3, 1e-3);
        assert_close(idx.reflection_index, (1.5 - 0.3) * unit_area, 1e-9);
        assert_close(
            idx.sys_dia,
            1.5 * unit_area / (0.3 * unit_area + 0.1 * 0.07 * (2.0 * PI).sqrt()),
            1e-9,
        );
        assert_close(idx.a1_a2_ratio, 0.5, 1e-15);
        assert_close(idx.a3_a1_ratio, 0.3, 1e-15);
        assert_close(idx.a4_a1_ratio, 0.1, 1e-15);
        assert_close(idx.v4_a1_ratio, 0.07, 1e-15);
        // Both bumps sit well inside [0, 1), so each mean is area / 1.0.
        assert_close(idx.round_trip, (0.3 - 1.0) * unit_area, 1e-5);
    }

    #[test]
    fn ratios_are_scale_invariant() {
        let base = GaussianIndices::compute(&mixture([1.0, 0.5, 0.3, 0.1])).unwrap();
        for k in [0.25, 3.0, 40.0] {
            let scaled =
                GaussianIndices::compute(&mixture([k, 0.5 * k, 0.3 * k, 0.1 * k])).unwrap();
            assert_close(scaled.augmentation_index, base.augmentation_index, 1e-8);
            assert_close(scaled.sys_dia, base.sys_dia, 1e-8);
        }
    }

    #[test]
    fn peak_between_overlapping_bumps() {
        let c1 = GaussianComponent::new(1.0, 0.3, 0.1);
        let c2 = GaussianComponent::new(1.0, 0.4, 0.1);
        // Symmetric pair peaks at the midpoint.
        let expected = 2.0 * (-(0.05f64).powi(2) / 0.02).exp();
        assert_close(systolic_peak(&c1, &c2), expected, 1e-10);
    }

    #[test]
    fn zero_reference_amplitudes_are_undefined() {
        let err = GaussianIndices::compute(&mixture([0.0, 0.5, 0.3, 0.1])).unwrap_err();
        assert!(matches!(err, PulseError::UndefinedIndex { .. }));
        let err = GaussianIndices::compute(&mixture([1.0, 0.5, 0.0, 0.1])).unwrap_err();
        assert!(err.to_string().contains("augmentation_index"));
        let err = GaussianIndices::compute(&mixture([1.0, 0.5, 0.0, 0.0]));
        assert!(err.is_err());
    }

    #[test]
    fn indices_are_deterministic() {
        let mix = mixture([0.9, 0.6, 0.35, 0.15]);
        let a = GaussianIndices::compute(&mix).unwrap();
        let b = GaussianIndices::compute(&mix).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.values().len(), GaussianIndices::NAMES.len());
    }
}
