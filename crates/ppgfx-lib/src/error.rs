use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the pulse decomposition core.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PulseError {
    /// Flat pulse, empty segment, or too few values for a statistic.
    #[error("degenerate input: {reason}")]
    DegenerateInput { reason: String },
    /// The least-squares solver gave up before meeting its tolerance.
    #[error("fit diverged after {evaluations} evaluations: {reason}")]
    FitDivergence { reason: String, evaluations: usize },
    /// A derived index divides by a zero amplitude or integral.
    #[error("index `{index}` is undefined: {reason}")]
    UndefinedIndex { index: String, reason: String },
    /// Malformed configuration or input tables. Fatal for a whole run.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PulseError {
    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateInput {
            reason: reason.into(),
        }
    }

    pub fn undefined(index: &str, reason: impl Into<String>) -> Self {
        Self::UndefinedIndex {
            index: index.to_string(),
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    /// Config errors abort the run; everything else is recorded per pulse.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

pub type PulseResult<T> = Result<T, PulseError>;
