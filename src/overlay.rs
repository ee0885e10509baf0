//! Comparison plots across finished runs
//!
//! Overlays only read stores written by previous runs. Inputs that cannot be
//! found are skipped with a warning, so that a partial set of samples still
//! produces plots. A record which no input provides yields no plot.

use crate::{
    config::OverlayConfig,
    histogram::Hist1D,
    numeric::Float,
    render::{curve_points, render_overlay, series_color, Series},
    store::{OutputStore, Record},
    Result,
};
use eyre::WrapErr;
use std::{fs, path::PathBuf};

/// Headroom added past the last populated bin when choosing an x range
const AUTO_RANGE_MARGIN: Float = 1.05;

/// A labelled store which could be opened
pub struct LabelledStore {
    /// Legend label
    pub label: String,

    /// Store contents
    pub store: OutputStore,
}

/// Open every input of an overlay set, skipping those that cannot be read
pub fn load_inputs(cfg: &OverlayConfig) -> Vec<LabelledStore> {
    cfg.inputs
        .iter()
        .filter_map(|input| match OutputStore::open(&input.store) {
            Ok(store) => Some(LabelledStore {
                label: input.label.clone(),
                store,
            }),
            Err(e) => {
                log::warn!("Skipping overlay input '{}': {e}", input.label);
                None
            }
        })
        .collect()
}

/// Data of one overlay plot
#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    /// Name of the overlaid record
    pub record: String,

    /// One labelled series per input that provides the record
    pub series: Vec<(String, Series)>,

    /// Horizontal range
    pub x_range: (Float, Float),
}

/// Default x range of overlaid histograms: from the lowest lower edge to a
/// little past the highest populated bin
pub fn auto_x_range(hists: &[&Hist1D]) -> Option<(Float, Float)> {
    let lo = hists.iter().map(|h| h.binning.lo).reduce(Float::min)?;
    let hi = hists
        .iter()
        .filter_map(|h| h.last_filled_bin().map(|bin| h.binning.up_edge(bin)))
        .reduce(Float::max);
    match hi {
        Some(hi) if hi * AUTO_RANGE_MARGIN > lo => Some((lo, hi * AUTO_RANGE_MARGIN)),
        _ => hists.iter().map(|h| h.binning.hi).reduce(Float::max).map(|hi| (lo, hi)),
    }
}

/// Gather one record from every input, normalizing histograms to unit area
pub fn build_overlay(inputs: &[LabelledStore], record: &str, cfg: &OverlayConfig) -> Option<Overlay> {
    let mut series = Vec::new();
    let mut hists = Vec::new();
    let mut curve_range = None;
    for input in inputs {
        match input.store.get(record) {
            Some(Record::Hist1d(h)) => {
                let steps = (h.normalized().into_iter().enumerate())
                    .map(|(bin, y)| (h.binning.low_edge(bin), h.binning.up_edge(bin), y))
                    .collect();
                series.push((input.label.clone(), Series::Steps(steps)));
                hists.push(h);
            }
            Some(Record::Efficiency(curve)) => {
                series.push((input.label.clone(), Series::Points(curve_points(curve))));
                if curve_range.is_none() {
                    curve_range = Some((curve.binning.lo, curve.binning.hi));
                }
            }
            Some(Record::Hist2d(_)) => {
                log::warn!("Record {record} of '{}' is two-dimensional, skipping it", input.label);
            }
            None => {
                log::warn!("Record {record} not found in '{}', skipping it", input.label);
            }
        }
    }
    if series.is_empty() {
        return None;
    }
    let x_range = cfg
        .x_ranges
        .get(record)
        .copied()
        .or_else(|| auto_x_range(&hists))
        .or(curve_range)?;
    Some(Overlay {
        record: record.to_owned(),
        series,
        x_range,
    })
}

/// Produce every plot of an overlay set, returning the written files
pub fn run_overlay(cfg: &OverlayConfig) -> Result<Vec<PathBuf>> {
    let inputs = load_inputs(cfg);
    log::info!(
        "Overlay '{}': {} of {} inputs available",
        cfg.name,
        inputs.len(),
        cfg.inputs.len()
    );
    fs::create_dir_all(&cfg.output_dir).wrap_err_with(|| {
        format!("Failed to create overlay directory {}", cfg.output_dir.display())
    })?;
    let mut written = Vec::new();
    for record in &cfg.records {
        let Some(overlay) = build_overlay(&inputs, record, cfg) else {
            log::warn!("No valid input for '{record}', no overlay produced");
            continue;
        };
        let path = cfg.output_dir.join(format!("overlay_{record}.png"));
        let series: Vec<Series> = overlay.series.iter().map(|(_, s)| s.clone()).collect();
        render_overlay(&series, overlay.x_range, cfg.log_y, &path)?;
        for (idx, (label, _)) in overlay.series.iter().enumerate() {
            let [r, g, b] = series_color(idx).0;
            log::info!("  #{r:02x}{g:02x}{b:02x} : {label}");
        }
        log::info!("Saved overlay plot {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::OverlayInput,
        efficiency::RatioAccumulator,
        histogram::{Binning, Labels},
    };
    use std::path::Path;

    fn write_store(path: &Path, pt_values: &[Float]) {
        let mut store = OutputStore::new("sample");
        let mut h = Hist1D::new("dp_pt", Labels::default(), Binning::new(10, 0., 100.));
        for &x in pt_values {
            h.fill(x);
        }
        h.finalize(true);
        store.insert(h).unwrap();
        let mut acc = RatioAccumulator::new("efficiency_vs_pt", Labels::default(), Binning::new(4, 0., 100.));
        acc.fill(10., true);
        store.insert(acc.finalize().unwrap()).unwrap();
        store.write(path).unwrap();
    }

    fn overlay_config(dir: &Path, stores: &[(&str, PathBuf)]) -> OverlayConfig {
        OverlayConfig {
            name: "test".to_owned(),
            output_dir: dir.join("overlay_plots"),
            inputs: stores
                .iter()
                .map(|(label, store)| OverlayInput {
                    label: (*label).to_owned(),
                    store: store.clone(),
                })
                .collect(),
            records: vec!["dp_pt".to_owned(), "efficiency_vs_pt".to_owned(), "dp_eta".to_owned()],
            ..OverlayConfig::default()
        }
    }

    #[test]
    fn missing_inputs_and_records_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.json");
        write_store(&a, &[5., 15., 15., 35.]);
        let cfg = overlay_config(
            dir.path(),
            &[("ctau=5 mm", a), ("ctau=50 mm", dir.path().join("missing.json"))],
        );
        let written = run_overlay(&cfg).unwrap();
        let names: Vec<_> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["overlay_dp_pt.png", "overlay_efficiency_vs_pt.png"]);
        for path in &written {
            assert!(path.exists());
        }
    }

    #[test]
    fn inconsistent_stores_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (good, bad) = (dir.path().join("good.json"), dir.path().join("bad.json"));
        write_store(&good, &[5.]);
        write_store(&bad, &[5.]);
        let mut value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&bad).unwrap()).unwrap();
        value["records"]["dp_pt"]["binning"]["bins"] = serde_json::json!(0);
        fs::write(&bad, value.to_string()).unwrap();

        let cfg = overlay_config(dir.path(), &[("good", good), ("bad", bad)]);
        let inputs = load_inputs(&cfg);
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].label, "good");
    }

    #[test]
    fn zero_inputs_produce_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = overlay_config(dir.path(), &[("gone", dir.path().join("gone.json"))]);
        assert!(run_overlay(&cfg).unwrap().is_empty());
    }

    #[test]
    fn histograms_are_normalized_and_ranged() {
        let dir = tempfile::tempdir().unwrap();
        let (a, b) = (dir.path().join("a.json"), dir.path().join("b.json"));
        write_store(&a, &[5., 15., 15., 35.]);
        write_store(&b, &[55.]);
        let mut cfg = overlay_config(dir.path(), &[("a", a), ("b", b)]);
        let inputs = load_inputs(&cfg);

        let overlay = build_overlay(&inputs, "dp_pt", &cfg).unwrap();
        assert_eq!(overlay.series.len(), 2);
        for (_, series) in &overlay.series {
            let Series::Steps(steps) = series else {
                panic!("histograms should be drawn as steps");
            };
            let area: Float = steps.iter().map(|&(_, _, y)| y).sum();
            assert!((area - 1.).abs() < 1e-12);
        }
        let (lo, hi) = overlay.x_range;
        assert_eq!(lo, 0.);
        assert!((hi - 63.).abs() < 1e-9);

        cfg.x_ranges.insert("dp_pt".to_owned(), (0., 350.));
        let overlay = build_overlay(&inputs, "dp_pt", &cfg).unwrap();
        assert_eq!(overlay.x_range, (0., 350.));

        let overlay = build_overlay(&inputs, "efficiency_vs_pt", &cfg).unwrap();
        assert_eq!(overlay.x_range, (0., 100.));
        assert!(matches!(overlay.series[0].1, Series::Points(ref p) if p.len() == 1));
    }

    #[test]
    fn empty_histograms_keep_their_range() {
        let h = Hist1D::new("h", Labels::default(), Binning::new(10, -5., 5.));
        assert_eq!(auto_x_range(&[&h]), Some((-5., 5.)));
        assert_eq!(auto_x_range(&[]), None);
    }
}
