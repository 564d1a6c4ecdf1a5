use crate::error::{PulseError, PulseResult};
use serde::{Deserialize, Serialize};

/// The four aligned channels of one recording: the filtered PPG waveform and
/// its first three time derivatives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub fs: f64,
    pub ppg: Vec<f64>,
    pub vpg: Vec<f64>,
    pub apg: Vec<f64>,
    pub jpg: Vec<f64>,
}

impl Recording {
    /// Build a recording, rejecting channels of unequal length.
    pub fn new(
        fs: f64,
        ppg: Vec<f64>,
        vpg: Vec<f64>,
        apg: Vec<f64>,
        jpg: Vec<f64>,
    ) -> PulseResult<Self> {
        if !(fs.is_finite() && fs > 0.0) {
            return Err(PulseError::config(format!(
                "sampling rate must be positive, got {fs}"
            )));
        }
        let n = ppg.len();
        for (name, channel) in [("vpg", &vpg), ("apg", &apg), ("jpg", &jpg)] {
            if channel.len() != n {
                return Err(PulseError::config(format!(
                    "channel {name} has {} samples but ppg has {n}",
                    channel.len()
                )));
            }
        }
        if n == 0 {
            return Err(PulseError::config("recording has no samples"));
        }
        Ok(Self {
            fs,
            ppg,
            vpg,
            apg,
            jpg,
        })
    }

    pub fn len(&self) -> usize {
        self.ppg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ppg.is_empty()
    }

    /// Recording length in seconds.
    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.fs
    }
}

/// Per-pulse fiducial landmarks produced by an external detector.
///
/// Row `i` holds the onset of pulse `i` and its dicrotic notch. A notch may
/// be absent when the detector could not place it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Landmarks {
    pub onsets: Vec<usize>,
    pub notches: Vec<Option<usize>>,
}

impl Landmarks {
    pub fn new(onsets: Vec<usize>, notches: Vec<Option<usize>>) -> PulseResult<Self> {
        if onsets.len() != notches.len() {
            return Err(PulseError::config(format!(
                "landmark table has {} onsets but {} notches",
                onsets.len(),
                notches.len()
            )));
        }
        if let Some(w) = onsets.windows(2).find(|w| w[1] <= w[0]) {
            return Err(PulseError::config(format!(
                "onsets must be strictly increasing ({} then {})",
                w[0], w[1]
            )));
        }
        Ok(Self { onsets, notches })
    }

    pub fn len(&self) -> usize {
        self.onsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.onsets.is_empty()
    }

    /// Check every landmark against a channel of `len` samples. Each notch
    /// must fall in `[onset, next_onset)`, or `[onset, len]` for the last row.
    pub fn validate(&self, len: usize) -> PulseResult<()> {
        for (i, (&on, dn)) in self.onsets.iter().zip(&self.notches).enumerate() {
            if on >= len {
                return Err(PulseError::config(format!(
                    "onset {on} of pulse {i} is beyond the channel end ({len})"
                )));
            }
            let Some(dn) = *dn else { continue };
            let upper = self.onsets.get(i + 1).copied();
            let in_range = match upper {
                Some(next) => dn >= on && dn < next,
                None => dn >= on && dn <= len,
            };
            if !in_range {
                return Err(PulseError::config(format!(
                    "notch {dn} of pulse {i} is outside its pulse (onset {on})"
                )));
            }
        }
        Ok(())
    }

    /// Notch of landmark row `pulse` as an offset from that row's onset.
    pub fn notch_offset(&self, pulse: usize) -> Option<usize> {
        let onset = *self.onsets.get(pulse)?;
        self.notches.get(pulse).copied().flatten()?.checked_sub(onset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_rejects_mismatched_channels() {
        let err = Recording::new(
            200.0,
            vec![0.0; 10],
            vec![0.0; 10],
            vec![0.0; 9],
            vec![0.0; 10],
        )
        .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("apg"));
    }

    #[test]
    fn landmarks_require_increasing_onsets() {
        assert!(Landmarks::new(vec![10, 5], vec![Some(12), Some(8)]).is_err());
        assert!(Landmarks::new(vec![5, 10], vec![Some(7)]).is_err());
        assert!(Landmarks::new(vec![5, 10], vec![Some(7), None]).is_ok());
    }

    #[test]
    fn notch_must_sit_inside_its_pulse() {
        let lm = Landmarks::new(vec![0, 100], vec![Some(100), Some(150)]).unwrap();
        assert!(lm.validate(200).is_err());
        let lm = Landmarks::new(vec![0, 100], vec![Some(40), Some(150)]).unwrap();
        assert!(lm.validate(200).is_ok());
        assert!(lm.validate(120).is_err());
    }

    #[test]
    fn notch_offsets_are_relative_to_the_onset() {
        let lm = Landmarks::new(vec![50, 250], vec![Some(150), None]).unwrap();
        assert_eq!(lm.notch_offset(0), Some(100));
        assert_eq!(lm.notch_offset(1), None);
        assert_eq!(lm.notch_offset(2), None);
    }
}
