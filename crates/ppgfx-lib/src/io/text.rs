use crate::signal::Recording;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse a newline-delimited sample series, ignoring blank/comment lines.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: f64 = trimmed
            .parse()
            .with_context(|| format!("line {} is not f64: {}", idx + 1, trimmed))?;
        out.push(val);
    }
    if out.is_empty() {
        anyhow::bail!("no numeric samples found");
    }
    Ok(out)
}

/// Read a newline-delimited sample series from disk.
pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_f64_series(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Load one sample file per channel into a recording.
pub fn read_channel_files(
    fs: f64,
    ppg: &Path,
    vpg: &Path,
    apg: &Path,
    jpg: &Path,
) -> Result<Recording> {
    let recording = Recording::new(
        fs,
        read_f64_series(ppg)?,
        read_f64_series(vpg)?,
        read_f64_series(apg)?,
        read_f64_series(jpg)?,
    )?;
    Ok(recording)
}
