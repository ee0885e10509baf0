//! Drivers of the individual studies
//!
//! Each driver opens its input samples, runs one analysis over each of them
//! through an [`EventAggregator`], and hands the outcome over to the output
//! stage. Samples are independent: when processing several of them, a failed
//! sample is reported and the batch moves on, but the driver still reports
//! an error once every sample has been tried.

use crate::{
    aggregator::{Analysis, EventAggregator},
    analysis::{
        efficiency::EfficiencyAnalysis, fake_rate::FakeRateAnalysis, heatmap::HeatmapAnalysis,
        truth::TruthAnalysis,
    },
    config::{Configuration, MismatchPolicy, OverlayConfig},
    output::{dump_results, OutputSpec},
    overlay::run_overlay,
    source::EventSource,
    Result,
};
use eyre::{bail, ensure, eyre, WrapErr};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Efficiency store file name
pub const EFFICIENCY_STORE: &str = "eff_plots.json";

/// Fake rate store file name
pub const FAKE_RATE_STORE: &str = "rates_plots.json";

/// Per-sample store file name
pub fn sample_store_name(sample: &str) -> String {
    format!("histograms_{sample}.json")
}

/// Run one analysis over one sample and write its results
///
/// The output directory is only created once the sample could be opened.
fn process_sample<A: Analysis>(
    path: &Path,
    policy: MismatchPolicy,
    analysis: A,
    output: impl FnOnce(&str) -> (PathBuf, String),
    log_y: bool,
) -> Result<PathBuf> {
    let source = EventSource::open(path, policy)?;
    let sample = source.sample_name();
    log::info!("Processing sample {sample} from {}", path.display());
    let (outcome, stats) = EventAggregator::new(source, analysis).run()?;
    log::info!(
        "Sample {sample}: {} events, {} skipped",
        stats.events,
        stats.skipped
    );
    let (dir, store_name) = output(&sample);
    dump_results(
        &OutputSpec {
            dir: &dir,
            store_name: &store_name,
            sample: &sample,
            log_y,
        },
        outcome,
    )
    .wrap_err_with(|| format!("Failed to output the results of sample {sample}"))
}

/// Process every sample of a batch, returning the written stores
fn run_batch(
    inputs: &[PathBuf],
    mut process: impl FnMut(&Path) -> Result<PathBuf>,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(inputs.len());
    let mut failures = 0;
    for input in inputs {
        match process(input) {
            Ok(store) => written.push(store),
            Err(e) => {
                log::error!("Sample {} failed: {e:?}", input.display());
                failures += 1;
            }
        }
    }
    ensure!(
        failures == 0,
        "{failures} of {} samples failed to process",
        inputs.len()
    );
    Ok(written)
}

/// List the samples of a directory which match a name prefix and an extension
pub fn discover_samples(dir: &Path, prefix: &str, extension: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .wrap_err_with(|| format!("Failed to scan input directory {}", dir.display()))?;
    let mut samples = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let name_ok = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(prefix));
        let ext_ok = path.extension().and_then(|ext| ext.to_str()) == Some(extension);
        if path.is_file() && name_ok && ext_ok {
            samples.push(path);
        }
    }
    samples.sort();
    Ok(samples)
}

/// Truth-level kinematics of every sample of the input directory
pub fn run_truth(cfg: &Configuration) -> Result<Vec<PathBuf>> {
    let truth = &cfg.truth;
    let samples = discover_samples(&truth.input_dir, &truth.file_prefix, &truth.extension)?;
    ensure!(
        !samples.is_empty(),
        "No {}*.{} sample found in {}",
        truth.file_prefix,
        truth.extension,
        truth.input_dir.display()
    );
    log::info!("Found {} samples", samples.len());
    run_batch(&samples, |path| {
        process_sample(
            path,
            cfg.schema.on_mismatch,
            TruthAnalysis::new(truth),
            |sample| {
                (
                    truth.output_root.join(format!("output_truth_{sample}")),
                    sample_store_name(sample),
                )
            },
            truth.log_y,
        )
    })
}

/// Opening angle heatmaps of the configured samples, or of the given ones
pub fn run_heatmap(cfg: &Configuration, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let heatmap = &cfg.heatmap;
    let inputs = if inputs.is_empty() {
        &heatmap.inputs[..]
    } else {
        inputs
    };
    ensure!(!inputs.is_empty(), "No input sample given for the heatmap study");
    run_batch(inputs, |path| {
        process_sample(
            path,
            cfg.schema.on_mismatch,
            HeatmapAnalysis::new(heatmap),
            |sample| {
                (
                    heatmap.output_root.join(format!("2D_ctau_{sample}")),
                    sample_store_name(sample),
                )
            },
            false,
        )
    })
}

/// Pick the input of a single-sample study
fn single_input(input: Option<&Path>, configured: Option<&PathBuf>, study: &str) -> Result<PathBuf> {
    input
        .map(Path::to_path_buf)
        .or_else(|| configured.cloned())
        .ok_or_else(|| eyre!("No input sample given for the {study} study"))
}

/// Reconstruction efficiency of one sample
pub fn run_efficiency(cfg: &Configuration, input: Option<&Path>) -> Result<PathBuf> {
    let eff = &cfg.efficiency;
    let input = single_input(input, eff.input.as_ref(), "efficiency")?;
    process_sample(
        &input,
        cfg.schema.on_mismatch,
        EfficiencyAnalysis::new(eff),
        |_| (eff.output_dir.clone(), EFFICIENCY_STORE.to_owned()),
        false,
    )
}

/// Matched and fake rates of one sample
pub fn run_fake_rate(cfg: &Configuration, input: Option<&Path>) -> Result<PathBuf> {
    let fake = &cfg.fake_rate;
    let input = single_input(input, fake.input.as_ref(), "fake rate")?;
    process_sample(
        &input,
        cfg.schema.on_mismatch,
        FakeRateAnalysis::new(fake),
        |_| (fake.output_dir.clone(), FAKE_RATE_STORE.to_owned()),
        false,
    )
}

/// Comparison plots of one named overlay set, or of all of them
pub fn run_overlays(cfg: &Configuration, name: Option<&str>) -> Result<Vec<PathBuf>> {
    let sets: Vec<&OverlayConfig> = match name {
        Some(name) => match cfg.overlay(name) {
            Some(set) => vec![set],
            None => bail!("No overlay set named '{name}' in the configuration"),
        },
        None => cfg.overlays.iter().collect(),
    };
    if sets.is_empty() {
        log::warn!("No overlay set configured, nothing to do");
    }
    let mut written = Vec::new();
    for set in sets {
        written.extend(run_overlay(set)?);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_discovered_by_prefix_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["frvz_b.jsonl", "frvz_a.jsonl", "frvz_c.txt", "other.jsonl"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("frvz_dir.jsonl")).unwrap();
        let found = discover_samples(dir.path(), "frvz_", "jsonl").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["frvz_a.jsonl", "frvz_b.jsonl"]);
    }

    #[test]
    fn empty_truth_batch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Configuration::default();
        cfg.truth.input_dir = dir.path().to_owned();
        assert!(run_truth(&cfg).is_err());
    }

    #[test]
    fn missing_input_creates_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Configuration::default();
        cfg.efficiency.output_dir = dir.path().join("eff");
        let missing = dir.path().join("missing.jsonl");
        assert!(run_efficiency(&cfg, Some(&missing)).is_err());
        assert!(!cfg.efficiency.output_dir.exists());
        assert!(run_efficiency(&cfg, None).is_err());
    }

    #[test]
    fn unknown_overlay_set_is_an_error() {
        let cfg = Configuration::default();
        assert!(run_overlays(&cfg, Some("nope")).is_err());
        assert!(run_overlays(&cfg, None).unwrap().is_empty());
    }
}
