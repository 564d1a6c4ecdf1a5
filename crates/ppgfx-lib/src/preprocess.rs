use crate::error::{PulseError, PulseResult};

/// A pulse ready for model fitting: non-negative, detrended, peak 1.
#[derive(Debug, Clone)]
pub struct CanonicalPulse {
    pub samples: Vec<f64>,
    /// Peak of the segment after the positivity shift, before normalization.
    pub raw_peak: f64,
}

impl CanonicalPulse {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Shift the segment up by its minimum when that minimum is negative.
pub fn make_positive(pulse: &mut [f64]) {
    let min = pulse.iter().copied().fold(f64::INFINITY, f64::min);
    if min < 0.0 {
        for x in pulse.iter_mut() {
            *x -= min;
        }
    }
}

/// Subtract the straight line joining the first and last samples.
pub fn linear_correction(pulse: &mut [f64]) -> PulseResult<()> {
    let n = pulse.len();
    if n < 2 {
        return Err(PulseError::degenerate(format!(
            "linear correction needs at least 2 samples, got {n}"
        )));
    }
    let first = pulse[0];
    let slope = (pulse[n - 1] - first) / (n - 1) as f64;
    for (i, x) in pulse.iter_mut().enumerate() {
        *x -= first + slope * i as f64;
    }
    Ok(())
}

/// Divide by the peak so the maximum becomes exactly 1. Returns the peak.
pub fn normalize_amplitude(pulse: &mut [f64]) -> PulseResult<f64> {
    let max = pulse.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max.is_finite() && max > 0.0) {
        return Err(PulseError::degenerate(format!(
            "cannot normalize a flat pulse (peak {max})"
        )));
    }
    for x in pulse.iter_mut() {
        *x /= max;
    }
    Ok(max)
}

/// Run the full preprocessing chain on one raw pulse segment.
///
/// The detrend can push samples below zero when the pulse dips under the
/// endpoint line, so the positivity shift is applied once more before
/// normalizing.
pub fn canonical_pulse(segment: &[f64]) -> PulseResult<CanonicalPulse> {
    if segment.is_empty() {
        return Err(PulseError::degenerate("zero-length pulse segment"));
    }
    if segment.iter().any(|x| !x.is_finite()) {
        return Err(PulseError::degenerate("pulse contains non-finite samples"));
    }
    let mut samples = segment.to_vec();
    make_positive(&mut samples);
    let raw_peak = samples.iter().copied().fold(0.0, f64::max);
    linear_correction(&mut samples)?;
    make_positive(&mut samples);
    normalize_amplitude(&mut samples)?;
    Ok(CanonicalPulse { samples, raw_peak })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn make_positive_is_noop_for_non_negative() {
        let mut p = vec![0.0, 1.0, 2.0];
        make_positive(&mut p);
        assert_eq!(p, vec![0.0, 1.0, 2.0]);
        let mut p = vec![-1.0, 1.0, 2.0];
        make_positive(&mut p);
        assert_eq!(p, vec![0.0, 2.0, 3.0]);
    }

    #[test]
    fn linear_correction_anchors_endpoints_at_zero() {
        let mut p = vec![1.0, 3.0, 4.0, 3.0];
        linear_correction(&mut p).unwrap();
        assert_eq!(p[0], 0.0);
        assert!(p[3].abs() < 1e-12);
        // line through (0,1) and (3,3) has slope 2/3
        assert!((p[1] - (3.0 - 1.0 - 2.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn flat_pulse_is_degenerate() {
        let err = canonical_pulse(&[0.3; 50]).unwrap_err();
        assert!(matches!(err, PulseError::DegenerateInput { .. }));
        assert!(canonical_pulse(&[]).is_err());
        assert!(canonical_pulse(&[1.0]).is_err());
    }

    #[test]
    fn canonical_pulse_spans_zero_to_one() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let len = rng.gen_range(20..300);
            let offset: f64 = rng.gen_range(-5.0..5.0);
            let drift: f64 = rng.gen_range(-0.01..0.01);
            let segment: Vec<f64> = (0..len)
                .map(|i| {
                    let t = i as f64 / len as f64;
                    offset
                        + drift * i as f64
                        + (-(t - 0.3).powi(2) / 0.01).exp()
                        + rng.gen_range(-0.05..0.05)
                })
                .collect();
            let pulse = canonical_pulse(&segment).unwrap();
            let min = pulse.samples.iter().copied().fold(f64::INFINITY, f64::min);
            let max = pulse.samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            assert!(min >= 0.0, "min {min}");
            assert!((max - 1.0).abs() < 1e-12, "max {max}");
        }
    }
}
