use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::warn;
use ppgfx_lib::{
    canonical_pulse,
    io::{csv as csv_io, export, text as text_io},
    run_pipeline, summarize, GaussianIndices, GaussianMixture, OutputFormat, PipelineConfig,
    PulseFailure, Recording, SkewedMixture,
};
use serde::Serialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "ppgfx",
    version,
    about = "PPG pulse decomposition and feature statistics"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FitFamily {
    Gaussian,
    Skewed,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Format {
    Csv,
    Json,
    None,
}

impl From<Format> for OutputFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Csv => OutputFormat::Csv,
            Format::Json => OutputFormat::Json,
            Format::None => OutputFormat::None,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and summarize per-pulse features from a whole recording
    Extract {
        /// CSV with ppg, vpg, apg and jpg columns
        #[arg(long, conflicts_with_all = ["ppg", "vpg", "apg", "jpg"])]
        channels: Option<PathBuf>,
        /// Newline-delimited channel files, used when --channels is absent
        #[arg(long, requires_all = ["vpg", "apg", "jpg"])]
        ppg: Option<PathBuf>,
        #[arg(long)]
        vpg: Option<PathBuf>,
        #[arg(long)]
        apg: Option<PathBuf>,
        #[arg(long)]
        jpg: Option<PathBuf>,
        /// Fiducial CSV with `on` and `dn` columns
        #[arg(long)]
        landmarks: PathBuf,
        /// TOML pipeline configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Sampling rate override (Hz)
        #[arg(long)]
        fs: Option<f64>,
        /// Output folder override
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        format: Option<Format>,
        /// Prefix of every output file
        #[arg(long, default_value = "ppg")]
        name: String,
    },
    /// Fit one pulse read from stdin or --input and print its parameters
    FitPulse {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "gaussian")]
        family: FitFamily,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Summarize a feature CSV (one row per pulse) into the statistics table
    Stats {
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Extract {
            channels,
            ppg,
            vpg,
            apg,
            jpg,
            landmarks,
            config,
            fs,
            out,
            format,
            name,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(fs) = fs {
                cfg.fs = fs;
            }
            if let Some(out) = out {
                cfg.output.folder = out.display().to_string();
            }
            if let Some(format) = format {
                cfg.output.format = format.into();
            }
            let recording = match (channels, ppg, vpg, apg, jpg) {
                (Some(path), ..) => csv_io::read_channels_csv(&path, cfg.fs)?,
                (None, Some(ppg), Some(vpg), Some(apg), Some(jpg)) => {
                    text_io::read_channel_files(cfg.fs, &ppg, &vpg, &apg, &jpg)?
                }
                _ => bail!("pass --channels or all of --ppg, --vpg, --apg and --jpg"),
            };
            cmd_extract(&recording, &landmarks, &cfg, &name)?
        }
        Commands::FitPulse {
            input,
            family,
            config,
        } => cmd_fit_pulse(input.as_deref(), family, config.as_deref())?,
        Commands::Stats { input } => cmd_stats(&input)?,
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path),
        None => Ok(PipelineConfig::default()),
    }
}

fn read_samples(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => text_io::read_f64_series(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_f64_series(&buf)
        }
    }
}

#[derive(Serialize)]
struct ExtractSummary<'a> {
    name: &'a str,
    pulses: usize,
    failures: &'a [PulseFailure],
    files: Vec<String>,
}

fn cmd_extract(
    recording: &Recording,
    landmarks_path: &Path,
    cfg: &PipelineConfig,
    name: &str,
) -> Result<()> {
    let landmarks = csv_io::read_landmarks_csv(landmarks_path)?;
    let result = run_pipeline(recording, &landmarks, cfg)?;
    let files = export::save_result(&result, cfg, name)?;
    let summary = ExtractSummary {
        name,
        pulses: result.pulses,
        failures: &result.failures,
        files: files.iter().map(|p| p.display().to_string()).collect(),
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

#[derive(Serialize)]
struct FitOutput {
    family: &'static str,
    raw_peak: f64,
    columns: Vec<String>,
    params: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    indices: Option<GaussianIndices>,
}

fn cmd_fit_pulse(input: Option<&Path>, family: FitFamily, config: Option<&Path>) -> Result<()> {
    let cfg = load_config(config)?;
    let samples = read_samples(input)?;
    let pulse = canonical_pulse(&samples)?;
    let output = match family {
        FitFamily::Gaussian => {
            let fit = cfg.decomposition.gaussian_fitter()?.fit(&pulse)?;
            let indices = match GaussianIndices::compute(&fit) {
                Ok(indices) => Some(indices),
                Err(err) => {
                    warn!("{err}");
                    None
                }
            };
            FitOutput {
                family: "gaussian",
                raw_peak: pulse.raw_peak,
                columns: GaussianMixture::column_names(),
                params: fit.params(),
                indices,
            }
        }
        FitFamily::Skewed => {
            let fit = cfg.decomposition.skewed_fitter()?.fit(&pulse)?;
            FitOutput {
                family: "skewed",
                raw_peak: pulse.raw_peak,
                columns: SkewedMixture::column_names(),
                params: fit.params(),
                indices: None,
            }
        }
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    rows: usize,
    missing: usize,
    columns: &'a [String],
    statistics: Vec<&'static str>,
    /// `values[statistic][column]`, NaN printed as null
    values: Vec<&'a [f64]>,
}

fn cmd_stats(input: &Path) -> Result<()> {
    let table = csv_io::read_feature_csv(input)?;
    let stats = summarize(&table)?;
    let output = StatsOutput {
        rows: table.len(),
        missing: table.missing(),
        columns: stats.columns(),
        statistics: stats.rows().map(|(s, _)| s.name()).collect(),
        values: stats.rows().map(|(_, v)| v).collect(),
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}
