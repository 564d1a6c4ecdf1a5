//! Distribution shape of the raw (unprocessed) pulse samples.

use crate::error::{PulseError, PulseResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseShape {
    pub skewness: f64,
    pub kurtosis: f64,
}

impl PulseShape {
    pub const NAMES: [&'static str; 2] = ["skewness", "kurtosis"];

    pub fn values(&self) -> Vec<f64> {
        vec![self.skewness, self.kurtosis]
    }
}

/// Biased sample skewness `m3 / m2^1.5` and excess kurtosis `m4 / m2^2 - 3`.
pub fn pulse_shape(pulse: &[f64]) -> PulseResult<PulseShape> {
    if pulse.is_empty() {
        return Err(PulseError::degenerate("zero-length pulse segment"));
    }
    let n = pulse.len() as f64;
    let mean = pulse.iter().sum::<f64>() / n;
    let moment = |k: i32| pulse.iter().map(|x| (x - mean).powi(k)).sum::<f64>() / n;
    let m2 = moment(2);
    if !(m2 > 0.0) {
        return Err(PulseError::degenerate("flat pulse has no shape moments"));
    }
    Ok(PulseShape {
        skewness: moment(3) / m2.powf(1.5),
        kurtosis: moment(4) / (m2 * m2) - 3.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_pulse_has_zero_skew() {
        let s = pulse_shape(&[0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!(s.skewness.abs() < 1e-12);
        // m2 = 2, m4 = 6.8
        assert!((s.kurtosis + 1.3).abs() < 1e-12);
    }

    #[test]
    fn right_tail_skews_positive() {
        let s = pulse_shape(&[0.0, 0.0, 0.0, 0.0, 10.0]).unwrap();
        // two-point distribution: skew (1 - 2p) / sqrt(p (1 - p)) with p = 0.2
        assert!((s.skewness - 0.6 / 0.16f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn flat_pulse_is_degenerate() {
        assert!(pulse_shape(&[2.0; 8]).is_err());
        assert!(pulse_shape(&[]).is_err());
    }
}
