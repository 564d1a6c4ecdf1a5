//! Splitting whole-signal channels into per-pulse segments.

use crate::{
    error::{PulseError, PulseResult},
    signal::{Landmarks, Recording},
};
use log::debug;

/// Split `channel` at the given internal boundaries.
///
/// Boundaries `[o1, .., ok]` yield `[0, o1)`, `[o1, o2)`, .., `[ok, end)`.
/// With no boundaries the whole channel is one segment.
pub fn split_at_onsets<'a>(
    channel: &'a [f64],
    boundaries: &[usize],
) -> PulseResult<Vec<&'a [f64]>> {
    let mut segments = Vec::with_capacity(boundaries.len() + 1);
    let mut start = 0usize;
    for &b in boundaries {
        if b <= start || b > channel.len() {
            return Err(PulseError::config(format!(
                "segment boundary {b} is out of order or beyond {} samples",
                channel.len()
            )));
        }
        segments.push(&channel[start..b]);
        start = b;
    }
    segments.push(&channel[start..]);
    Ok(segments)
}

/// Aligned per-pulse views into the four channels of a recording.
#[derive(Debug, Clone)]
pub struct PulseSegments<'a> {
    pub ppg: Vec<&'a [f64]>,
    pub vpg: Vec<&'a [f64]>,
    pub apg: Vec<&'a [f64]>,
    pub jpg: Vec<&'a [f64]>,
}

impl PulseSegments<'_> {
    pub fn len(&self) -> usize {
        self.ppg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ppg.is_empty()
    }
}

/// Split `channel` into one segment per landmark row.
///
/// Segment `i` is `[onset_i, onset_{i+1})`, the last one running to the end
/// of the channel. Samples before the first onset belong to no pulse.
fn split_by_landmarks<'a>(channel: &'a [f64], onsets: &[usize]) -> PulseResult<Vec<&'a [f64]>> {
    let Some((&first, rest)) = onsets.split_first() else {
        return split_at_onsets(channel, &[]);
    };
    if first >= channel.len() {
        return Err(PulseError::config(format!(
            "first onset {first} is beyond {} samples",
            channel.len()
        )));
    }
    let boundaries: Vec<usize> = rest.iter().map(|&on| on.saturating_sub(first)).collect();
    split_at_onsets(&channel[first..], &boundaries)
}

/// Segment every channel of `recording` with the same landmark rows, so that
/// segment `i` of each channel belongs to landmark row `i`.
pub fn segment_recording<'a>(
    recording: &'a Recording,
    landmarks: &Landmarks,
) -> PulseResult<PulseSegments<'a>> {
    if let Some(&first) = landmarks.onsets.first().filter(|&&on| on > 0) {
        debug!("skipping {first} samples before the first onset");
    }
    let onsets = &landmarks.onsets;
    Ok(PulseSegments {
        ppg: split_by_landmarks(&recording.ppg, onsets)?,
        vpg: split_by_landmarks(&recording.vpg, onsets)?,
        apg: split_by_landmarks(&recording.apg, onsets)?,
        jpg: split_by_landmarks(&recording.jpg, onsets)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_sum_to_channel_length() {
        let channel: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let segments = split_at_onsets(&channel, &[200, 400, 600, 800]).unwrap();
        assert_eq!(segments.len(), 5);
        assert_eq!(segments.iter().map(|s| s.len()).sum::<usize>(), 1000);
        assert_eq!(segments[1][0], 200.0);
        assert_eq!(*segments[4].last().unwrap(), 999.0);
    }

    #[test]
    fn no_boundaries_gives_whole_channel() {
        let channel = vec![1.0, 2.0, 3.0];
        let segments = split_at_onsets(&channel, &[]).unwrap();
        assert_eq!(segments, vec![&channel[..]]);
    }

    #[test]
    fn rejects_unordered_boundaries() {
        let channel = vec![0.0; 10];
        assert!(split_at_onsets(&channel, &[5, 3]).is_err());
        assert!(split_at_onsets(&channel, &[5, 11]).is_err());
        assert!(split_at_onsets(&channel, &[0, 5]).is_err());
    }

    #[test]
    fn channels_are_split_alike() {
        let n = 30;
        let rec = Recording::new(
            100.0,
            vec![1.0; n],
            vec![2.0; n],
            vec![3.0; n],
            vec![4.0; n],
        )
        .unwrap();
        let lm = Landmarks::new(vec![0, 10, 20], vec![None, None, None]).unwrap();
        let segs = segment_recording(&rec, &lm).unwrap();
        assert_eq!(segs.len(), 3);
        for i in 0..3 {
            assert_eq!(segs.ppg[i].len(), segs.jpg[i].len());
            assert_eq!(segs.vpg[i][0], 2.0);
        }
    }

    #[test]
    fn one_segment_per_landmark_row() {
        let channel: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let n = channel.len();
        let rec = Recording::new(
            100.0,
            channel.clone(),
            channel.clone(),
            channel.clone(),
            channel,
        )
        .unwrap();
        let lm = Landmarks::new(vec![15, 40, 70], vec![None, None, None]).unwrap();
        let segs = segment_recording(&rec, &lm).unwrap();
        assert_eq!(segs.len(), lm.len());
        assert_eq!(segs.ppg[0][0], 15.0);
        assert_eq!(segs.ppg[0].len(), 25);
        assert_eq!(segs.vpg[1][0], 40.0);
        assert_eq!(segs.jpg[2].len(), n - 70);
    }

    #[test]
    fn empty_landmarks_keep_the_whole_channel() {
        let rec = Recording::new(
            100.0,
            vec![1.0; 8],
            vec![2.0; 8],
            vec![3.0; 8],
            vec![4.0; 8],
        )
        .unwrap();
        let segs = segment_recording(&rec, &Landmarks::default()).unwrap();
        assert_eq!(segs.len(), 1);
        assert_eq!(segs.apg[0].len(), 8);
    }
}
