//! Systolic/diastolic phase features of the velocity plethysmogram.

use crate::error::{PulseError, PulseResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VpgPhase {
    pub sys_mean: f64,
    pub sys_var: f64,
    pub dia_mean: f64,
    pub dia_var: f64,
}

impl VpgPhase {
    pub const NAMES: [&'static str; 4] = ["sys_mean", "sys_var", "dia_mean", "dia_var"];

    pub fn values(&self) -> Vec<f64> {
        vec![self.sys_mean, self.sys_var, self.dia_mean, self.dia_var]
    }
}

/// Mean and population variance of a non-empty slice.
fn mean_var(x: &[f64]) -> (f64, f64) {
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var)
}

/// Features of one pulse's VPG segment, split at the notch offset into
/// `[0, notch)` and `[notch, end)`.
pub fn vpg_phase(segment: &[f64], notch: Option<usize>) -> PulseResult<VpgPhase> {
    let notch = notch.ok_or_else(|| PulseError::degenerate("pulse has no dicrotic notch"))?;
    if !(notch > 0 && notch < segment.len()) {
        return Err(PulseError::degenerate(format!(
            "notch at offset {notch} leaves an empty phase in a {}-sample pulse",
            segment.len()
        )));
    }
    let (sys_mean, sys_var) = mean_var(&segment[..notch]);
    let (dia_mean, dia_var) = mean_var(&segment[notch..]);
    Ok(VpgPhase {
        sys_mean,
        sys_var,
        dia_mean,
        dia_var,
    })
}
