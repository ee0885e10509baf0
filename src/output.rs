//! This module is in charge of outputting the final analysis results to the
//! log, to a histogram store, and to rendered plots

use crate::{
    aggregator::Outcome,
    render::{render_efficiency, render_hist1d, render_hist2d},
    store::{OutputStore, Record},
    Result,
};
use eyre::WrapErr;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Where and how the results of one run are written
#[derive(Clone, Debug)]
pub struct OutputSpec<'a> {
    /// Output directory, created if need be
    pub dir: &'a Path,

    /// File name of the store within that directory
    pub store_name: &'a str,

    /// Name of the analyzed sample
    pub sample: &'a str,

    /// Draw 1D histograms with a logarithmic vertical axis
    pub log_y: bool,
}

/// Output the results of a run to the log and to disk
///
/// Returns the location of the written store.
pub fn dump_results(spec: &OutputSpec<'_>, outcome: Outcome) -> Result<PathBuf> {
    fs::create_dir_all(spec.dir)
        .wrap_err_with(|| format!("Failed to create output directory {}", spec.dir.display()))?;

    let mut store = OutputStore::new(spec.sample);
    for (key, value) in &outcome.notes {
        store.note(key, value);
    }
    for record in outcome.records {
        store.insert(record)?;
    }
    for record in store.records() {
        let plot_path = spec.dir.join(format!("{}.png", record.name()));
        match record {
            Record::Hist1d(h) => render_hist1d(h, spec.log_y, &plot_path)?,
            Record::Hist2d(h) => render_hist2d(h, &plot_path)?,
            Record::Efficiency(c) => render_efficiency(c, &plot_path)?,
        }
        log::debug!("Saved plot {}", plot_path.display());
    }

    let store_path = spec.dir.join(spec.store_name);
    store
        .write(&store_path)
        .wrap_err("Failed to save the histogram store")?;
    log::info!(
        "Saved {} records for {} to {}",
        store.len(),
        spec.sample,
        store_path.display()
    );
    Ok(store_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::{Binning, Hist1D, Labels};

    #[test]
    fn store_and_plots_land_in_the_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("output_truth_frvz");
        let mut hist = Hist1D::new("dp_pt", Labels::default(), Binning::new(5, 0., 5.));
        hist.fill(1.);
        hist.finalize(true);
        let mut outcome = Outcome::default();
        outcome.records.push(hist.into());
        outcome.notes.insert("events".to_owned(), "1".to_owned());

        let spec = OutputSpec {
            dir: &out,
            store_name: "histograms_frvz.json",
            sample: "frvz",
            log_y: true,
        };
        let store_path = dump_results(&spec, outcome).unwrap();
        assert_eq!(store_path, out.join("histograms_frvz.json"));
        assert!(out.join("dp_pt.png").exists());
        let store = OutputStore::open(&store_path).unwrap();
        assert_eq!(store.meta().sample, "frvz");
        assert_eq!(store.meta().notes["events"], "1");
        assert!(store.get("dp_pt").is_some());
    }

    #[test]
    fn unfinished_records_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let hist = Hist1D::new("dp_pt", Labels::default(), Binning::new(5, 0., 5.));
        let outcome = Outcome {
            records: vec![hist.into()],
            ..Outcome::default()
        };
        let spec = OutputSpec {
            dir: dir.path(),
            store_name: "store.json",
            sample: "s",
            log_y: false,
        };
        assert!(dump_results(&spec, outcome).is_err());
        assert!(!dir.path().join("store.json").exists());
        assert!(!dir.path().join("dp_pt.png").exists());
    }
}
