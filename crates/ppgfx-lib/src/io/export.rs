//! Persistence of pipeline results as CSV tables or a single JSON document.

use crate::{
    pipeline::{FeatureOutput, OutputFormat, PipelineConfig, PipelineResult, PulseFailure},
    table::{FeatureTable, StatsTable},
};
use anyhow::{Context, Result};
use csv::WriterBuilder;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Summary of one run, written next to the tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub name: String,
    pub pulses: usize,
    pub config: PipelineConfig,
    pub failures: Vec<PulseFailure>,
    pub files: Vec<String>,
}

fn cell(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        v.to_string()
    }
}

/// One row per pulse with a 1-based `pulse` column; missing rows are empty.
pub fn write_feature_csv(path: &Path, table: &FeatureTable) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut header = vec!["pulse".to_string()];
    header.extend(table.columns().iter().cloned());
    writer.write_record(&header)?;
    for (i, row) in table.rows().iter().enumerate() {
        let mut record = vec![(i + 1).to_string()];
        match row {
            Some(values) => record.extend(values.iter().copied().map(cell)),
            None => record.extend(std::iter::repeat(String::new()).take(table.columns().len())),
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// One row per statistic, one column per feature.
pub fn write_stats_csv(path: &Path, stats: &StatsTable) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut header = vec![String::new()];
    header.extend(stats.columns().iter().cloned());
    writer.write_record(&header)?;
    for (stat, values) in stats.rows() {
        let mut record = vec![stat.name().to_string()];
        record.extend(values.iter().copied().map(cell));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_family(
    dir: &Path,
    name: &str,
    label: &str,
    stats_label: &str,
    output: &FeatureOutput,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    let path = dir.join(format!("{name}_{label}.csv"));
    write_feature_csv(&path, &output.features)?;
    written.push(path);
    if let Some(stats) = &output.stats {
        let path = dir.join(format!("{name}_{stats_label}.csv"));
        write_stats_csv(&path, stats)?;
        written.push(path);
    }
    Ok(())
}

/// Write `result` under the configured output folder. Returns every file
/// written, the manifest last.
pub fn save_result(
    result: &PipelineResult,
    config: &PipelineConfig,
    name: &str,
) -> Result<Vec<PathBuf>> {
    let folder = Path::new(&config.output.folder);
    let mut written = Vec::new();
    match config.output.format {
        OutputFormat::None => return Ok(written),
        OutputFormat::Json => {
            fs::create_dir_all(folder)
                .with_context(|| format!("creating {}", folder.display()))?;
            let path = folder.join(format!("{name}_features.json"));
            let file = fs::File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            serde_json::to_writer_pretty(file, result)?;
            written.push(path);
        }
        OutputFormat::Csv => {
            let dir = folder.join("Additional");
            fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
            if let Some(out) = &result.gaussian {
                write_family(&dir, name, "Gaussians", "Gaussian_stats", out, &mut written)?;
            }
            if let Some(out) = &result.gaussian_indices {
                write_family(
                    &dir,
                    name,
                    "Gaussian_additional",
                    "Gaussian_additional_stats",
                    out,
                    &mut written,
                )?;
            }
            if let Some(out) = &result.skewed {
                write_family(&dir, name, "Skewed", "Skewed_stats", out, &mut written)?;
            }
            write_family(&dir, name, "VPG", "VPG_stats", &result.vpg, &mut written)?;
            write_family(
                &dir,
                name,
                "PPG_extra",
                "PPG_extra_stats",
                &result.ppg_extra,
                &mut written,
            )?;
        }
    }
    let manifest = RunManifest {
        name: name.to_string(),
        pulses: result.pulses,
        config: config.clone(),
        failures: result.failures.clone(),
        files: written.iter().map(|p| p.display().to_string()).collect(),
    };
    let path = folder.join(format!("{name}_manifest.json"));
    write_manifest(&path, &manifest)?;
    written.push(path);
    info!("wrote {} files to {}", written.len(), folder.display());
    Ok(written)
}

pub fn write_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, manifest)?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<RunManifest> {
    let file =
        fs::File::open(path).with_context(|| format!("opening manifest {}", path.display()))?;
    let manifest = serde_json::from_reader::<_, RunManifest>(file)
        .with_context(|| format!("parsing manifest {}", path.display()))?;
    Ok(manifest)
}
