use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::{
    error::Error,
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

const PULSE_LEN: usize = 200;
const PULSES: usize = 5;
const TRUTH: [f64; 12] = [
    1.0, 0.2, 0.05, 0.5, 0.4, 0.05, 0.3, 0.6, 0.05, 0.1, 0.8, 0.05,
];

#[derive(Deserialize)]
struct Failure {
    family: String,
    pulse: usize,
}

#[derive(Deserialize)]
struct Summary {
    pulses: usize,
    failures: Vec<Failure>,
    files: Vec<String>,
}

fn pulse() -> Vec<f64> {
    (0..PULSE_LEN)
        .map(|i| {
            let t = i as f64 / PULSE_LEN as f64;
            TRUTH
                .chunks_exact(3)
                .map(|c| c[0] * (-(t - c[1]).powi(2) / (2.0 * c[2] * c[2])).exp())
                .sum()
        })
        .collect()
}

fn diff(x: &[f64]) -> Vec<f64> {
    let mut d: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    d.push(0.0);
    d
}

/// Writes channel and landmark CSVs for a run of identical synthetic pulses.
fn write_inputs(dir: &Path) -> Result<(PathBuf, PathBuf), Box<dyn Error>> {
    let one = pulse();
    let ppg: Vec<f64> = (0..PULSES).flat_map(|_| one.iter().copied()).collect();
    let vpg = diff(&ppg);
    let apg = diff(&vpg);
    let jpg = diff(&apg);
    let mut channels = String::from("ppg,vpg,apg,jpg\n");
    for i in 0..ppg.len() {
        writeln!(channels, "{},{},{},{}", ppg[i], vpg[i], apg[i], jpg[i])?;
    }
    let mut landmarks = String::from("on,dn\n");
    for p in 0..PULSES {
        let on = p * PULSE_LEN;
        // last pulse has no detected notch
        if p + 1 == PULSES {
            writeln!(landmarks, "{on},")?;
        } else {
            writeln!(landmarks, "{on},{}", on + 100)?;
        }
    }
    let channels_path = dir.join("channels.csv");
    let landmarks_path = dir.join("fiducials.csv");
    fs::write(&channels_path, channels)?;
    fs::write(&landmarks_path, landmarks)?;
    Ok((channels_path, landmarks_path))
}

#[test]
fn extract_writes_feature_tables() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let (channels, landmarks) = write_inputs(dir.path())?;
    let config = dir.path().join("pipeline.toml");
    fs::write(&config, "[decomposition]\nskewed = false\n")?;
    let out = dir.path().join("results");

    let mut cmd = cargo_bin_cmd!("ppgfx");
    cmd.args([
        "extract",
        "--channels",
        channels.to_str().expect("utf8 path"),
        "--landmarks",
        landmarks.to_str().expect("utf8 path"),
        "--config",
        config.to_str().expect("utf8 path"),
        "--out",
        out.to_str().expect("utf8 path"),
        "--name",
        "synthetic",
    ]);
    let stdout = cmd.assert().success().get_output().stdout.clone();
    let summary: Summary = serde_json::from_slice(&stdout)?;
    assert_eq!(summary.pulses, PULSES);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].family, "vpg");
    assert_eq!(summary.failures[0].pulse, PULSES - 1);

    let additional = out.join("Additional");
    for file in [
        "synthetic_Gaussians.csv",
        "synthetic_Gaussian_stats.csv",
        "synthetic_Gaussian_additional.csv",
        "synthetic_Gaussian_additional_stats.csv",
        "synthetic_VPG.csv",
        "synthetic_VPG_stats.csv",
        "synthetic_PPG_extra.csv",
        "synthetic_PPG_extra_stats.csv",
    ] {
        assert!(additional.join(file).exists(), "missing {file}");
    }
    assert!(!additional.join("synthetic_Skewed.csv").exists());
    assert!(out.join("synthetic_manifest.json").exists());
    assert_eq!(summary.files.len(), 9);

    let gaussians = fs::read_to_string(additional.join("synthetic_Gaussians.csv"))?;
    let mut lines = gaussians.lines();
    assert_eq!(
        lines.next(),
        Some("pulse,a1,m1,v1,a2,m2,v2,a3,m3,v3,a4,m4,v4")
    );
    for (row, line) in lines.enumerate() {
        let cells: Vec<f64> = line
            .split(',')
            .map(|c| c.parse())
            .collect::<Result<_, _>>()?;
        assert_eq!(cells[0] as usize, row + 1);
        for (got, want) in cells[1..].iter().zip(TRUTH) {
            assert!((got - want).abs() < 2e-3, "pulse {}: {got} vs {want}", row + 1);
        }
    }

    let vpg = fs::read_to_string(additional.join("synthetic_VPG.csv"))?;
    assert_eq!(vpg.lines().last(), Some("5,,,,"));
    Ok(())
}

#[test]
fn extract_rejects_malformed_initial_guess() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let (channels, landmarks) = write_inputs(dir.path())?;
    let config = dir.path().join("bad.toml");
    fs::write(&config, "[decomposition]\ngaussian_initials = [1.0, 0.2, 0.05]\n")?;

    let mut cmd = cargo_bin_cmd!("ppgfx");
    cmd.args([
        "extract",
        "--channels",
        channels.to_str().expect("utf8 path"),
        "--landmarks",
        landmarks.to_str().expect("utf8 path"),
        "--config",
        config.to_str().expect("utf8 path"),
        "--format",
        "none",
    ]);
    let stderr = cmd.assert().failure().get_output().stderr.clone();
    assert!(String::from_utf8(stderr)?.contains("invalid configuration"));
    Ok(())
}

#[test]
fn sample_config_is_valid() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let (channels, landmarks) = write_inputs(dir.path())?;
    let config = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .join("test_data/pipeline.toml");

    let mut cmd = cargo_bin_cmd!("ppgfx");
    cmd.args([
        "extract",
        "--channels",
        channels.to_str().expect("utf8 path"),
        "--landmarks",
        landmarks.to_str().expect("utf8 path"),
        "--config",
        config.to_str().expect("utf8 path"),
        "--format",
        "none",
    ]);
    let stdout = cmd.assert().success().get_output().stdout.clone();
    let summary: Summary = serde_json::from_slice(&stdout)?;
    assert_eq!(summary.pulses, PULSES);
    assert!(summary.files.is_empty());
    Ok(())
}
