//! CSV loaders for channels, landmark tables and feature tables.

use crate::{
    signal::{Landmarks, Recording},
    table::FeatureTable,
};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::Path;

const CHANNELS: [&str; 4] = ["ppg", "vpg", "apg", "jpg"];

fn locate_column(headers: &StringRecord, requested: &str) -> Result<usize> {
    headers
        .iter()
        .position(|name| name.eq_ignore_ascii_case(requested))
        .ok_or_else(|| anyhow::anyhow!("missing `{}` column", requested))
}

fn open(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))
}

/// Load a CSV with `ppg`, `vpg`, `apg` and `jpg` columns (any order, extra
/// columns ignored).
pub fn read_channels_csv(path: &Path, fs: f64) -> Result<Recording> {
    let mut reader = open(path)?;
    let headers = reader.headers().context("reading header")?.clone();
    let idx = CHANNELS
        .iter()
        .map(|name| locate_column(&headers, name))
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("channels in {}", path.display()))?;
    let mut channels: [Vec<f64>; 4] = Default::default();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading row {}", row + 1))?;
        for (channel, (&col, name)) in channels.iter_mut().zip(idx.iter().zip(CHANNELS)) {
            let value = record
                .get(col)
                .unwrap_or("")
                .parse::<f64>()
                .with_context(|| format!("row {} has no numeric {name} value", row + 1))?;
            channel.push(value);
        }
    }
    let [ppg, vpg, apg, jpg] = channels;
    Ok(Recording::new(fs, ppg, vpg, apg, jpg)?)
}

/// A sample index written as an integer or an integral float.
fn parse_index(raw: &str) -> Option<usize> {
    if let Ok(i) = raw.parse::<usize>() {
        return Some(i);
    }
    let f: f64 = raw.parse().ok()?;
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0).then_some(f as usize)
}

/// Load a fiducial table with `on` and `dn` columns. An empty or NaN notch
/// is kept as missing.
pub fn read_landmarks_csv(path: &Path) -> Result<Landmarks> {
    let mut reader = open(path)?;
    let headers = reader.headers().context("reading header")?.clone();
    let on_idx = locate_column(&headers, "on")?;
    let dn_idx = locate_column(&headers, "dn")?;
    let mut onsets = Vec::new();
    let mut notches = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading row {}", row + 1))?;
        let on = record.get(on_idx).unwrap_or("");
        let onset = parse_index(on)
            .ok_or_else(|| anyhow::anyhow!("row {} has an invalid onset `{on}`", row + 1))?;
        let dn = record.get(dn_idx).unwrap_or("");
        let notch = if dn.is_empty() || dn.eq_ignore_ascii_case("nan") {
            None
        } else {
            Some(
                parse_index(dn)
                    .ok_or_else(|| anyhow::anyhow!("row {} has an invalid notch `{dn}`", row + 1))?,
            )
        };
        onsets.push(onset);
        notches.push(notch);
    }
    let landmarks = Landmarks::new(onsets, notches)
        .with_context(|| format!("landmarks in {}", path.display()))?;
    Ok(landmarks)
}

/// Load a feature table written one row per pulse. A leading `pulse` column
/// is dropped, a row of empty cells is a missing pulse and a single empty
/// cell reads as NaN.
pub fn read_feature_csv(path: &Path) -> Result<FeatureTable> {
    let mut reader = open(path)?;
    let headers = reader.headers().context("reading header")?.clone();
    let skip = headers
        .iter()
        .position(|name| name.eq_ignore_ascii_case("pulse"));
    let columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != skip)
        .map(|(i, name)| (i, name.to_string()))
        .collect();
    if columns.is_empty() {
        anyhow::bail!("{} has no feature columns", path.display());
    }
    let mut table = FeatureTable::new(columns.iter().map(|(_, name)| name.clone()));
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading row {}", row + 1))?;
        let cells: Vec<&str> = columns
            .iter()
            .map(|(i, _)| record.get(*i).unwrap_or(""))
            .collect();
        if cells.iter().all(|c| c.is_empty()) {
            table.push_missing();
            continue;
        }
        let values = cells
            .iter()
            .zip(&columns)
            .map(|(cell, (_, name))| {
                if cell.is_empty() {
                    Ok(f64::NAN)
                } else {
                    cell.parse::<f64>()
                        .with_context(|| format!("row {} column {name}: `{cell}`", row + 1))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        table.push(values)?;
    }
    Ok(table)
}
