//! Mechanism for loading and sharing the analysis configuration
//!
//! Every tunable of the analyses (input locations, cuts, match radius, binning
//! and overflow policy) lives here, in one explicit structure which is loaded
//! once and passed down. All sections are optional: the defaults reproduce the
//! reference dark photon study.

use crate::{
    evcut::{JetCut, TruthCut},
    histogram::Binning,
    numeric::Float,
    range::{LowerEdge, RangePolicy, RangeSpec},
    Result,
};
use eyre::{ensure, WrapErr};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "dark_photons.toml";

/// Default angular matching radius
const DEFAULT_MATCH_RADIUS: Float = 0.4;

/// Analysis configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Handling of malformed events
    pub schema: SchemaConfig,

    /// Truth-level kinematics study
    pub truth: TruthConfig,

    /// Reconstruction efficiency study
    pub efficiency: EfficiencyConfig,

    /// Fake rate study
    pub fake_rate: FakeRateConfig,

    /// Opening angle vs. 2m/pt study
    pub heatmap: HeatmapConfig,

    /// Comparison plots across finished runs
    pub overlays: Vec<OverlayConfig>,
}
//
impl Configuration {
    /// Load the configuration from an explicitly requested file, or else from
    /// the default file if there is one, or else use the defaults
    ///
    /// An explicitly requested file must exist.
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        Self::locate_with_default(explicit, Path::new(DEFAULT_CONFIG_FILE))
    }

    fn locate_with_default(explicit: Option<&Path>, default: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None if default.exists() => Self::load(default),
            None => {
                log::info!("No {} found, using the default configuration", default.display());
                let config = Self::default();
                config.print();
                Ok(config)
            }
        }
    }

    /// Load the configuration from a file, check it, and print it out
    pub fn load(file_name: impl AsRef<Path>) -> Result<Self> {
        let file_name = file_name.as_ref();
        let config_str = fs::read_to_string(file_name)
            .wrap_err_with(|| format!("Failed to read configuration file {}", file_name.display()))?;
        let config: Self = toml::from_str(&config_str)
            .wrap_err_with(|| format!("Failed to parse configuration file {}", file_name.display()))?;
        config.check()?;
        config.print();
        Ok(config)
    }

    /// Check that the configuration makes sense
    pub fn check(&self) -> Result<()> {
        let truth_bins = &self.truth.bins;
        for (name, axis) in [
            ("truth.bins.pt", &truth_bins.pt),
            ("truth.bins.eta", &truth_bins.eta),
            ("truth.bins.phi", &truth_bins.phi),
            ("truth.bins.m", &truth_bins.m),
            ("truth.bins.lxy", &truth_bins.lxy),
            ("truth.bins.lz", &truth_bins.lz),
            ("truth.bins.ctau", &truth_bins.ctau),
            ("truth.bins.delta_r", &truth_bins.delta_r),
            ("truth.bins.approx_delta_r", &truth_bins.approx_delta_r),
            ("efficiency.bins.pt", &self.efficiency.bins.pt),
            ("efficiency.bins.eta", &self.efficiency.bins.eta),
            ("efficiency.bins.phi", &self.efficiency.bins.phi),
            ("efficiency.bins.lxy", &self.efficiency.bins.lxy),
            ("fake_rate.bins.pt", &self.fake_rate.bins.pt),
            ("fake_rate.bins.eta", &self.fake_rate.bins.eta),
            ("fake_rate.bins.phi", &self.fake_rate.bins.phi),
            ("heatmap.bins.pt", &self.heatmap.bins.pt),
            ("heatmap.bins.delta_r", &self.heatmap.bins.delta_r),
            ("heatmap.bins.approx_delta_r", &self.heatmap.bins.approx_delta_r),
        ] {
            axis.check(name)?;
        }
        for (name, radius) in [
            ("efficiency.match_radius", self.efficiency.match_radius),
            ("fake_rate.match_radius", self.fake_rate.match_radius),
        ] {
            ensure!(radius >= 0., "{name} must not be negative (got {radius})");
        }
        for overlay in &self.overlays {
            ensure!(!overlay.name.is_empty(), "Every overlay set needs a name");
            for (record, &(lo, hi)) in &overlay.x_ranges {
                ensure!(
                    hi > lo,
                    "Overlay {} has an empty x range for {record}",
                    overlay.name
                );
            }
        }
        Ok(())
    }

    /// Look up an overlay set by name
    pub fn overlay(&self, name: &str) -> Option<&OverlayConfig> {
        self.overlays.iter().find(|overlay| overlay.name == name)
    }

    /// Display the main settings
    pub fn print(&self) {
        log::info!("schema.on_mismatch       : {:?}", self.schema.on_mismatch);
        log::info!("truth.input_dir          : {}", self.truth.input_dir.display());
        log::info!("truth.file_prefix        : {}", self.truth.file_prefix);
        log::info!("truth.cut                : {:?}", self.truth.cut);
        log::info!("efficiency.match_radius  : {}", self.efficiency.match_radius);
        log::info!("efficiency.truth_cut     : {:?}", self.efficiency.truth_cut);
        log::info!("efficiency.jet_cut       : {:?}", self.efficiency.jet_cut);
        log::info!("fake_rate.match_radius   : {}", self.fake_rate.match_radius);
        log::info!("fake_rate.leading_only   : {}", self.fake_rate.leading_only);
        log::info!("fake_rate.jet_cut        : {:?}", self.fake_rate.jet_cut);
        log::info!("overlays                 : {}", self.overlays.len());
    }
}

/// What to do with events whose arrays are misaligned or undecodable
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Abort the run
    Abort,

    /// Log the problem and skip the event
    #[default]
    Skip,
}

/// Handling of malformed events
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Policy for malformed events
    pub on_mismatch: MismatchPolicy,
}

/// Binning of one histogram axis
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    /// Number of bins
    pub bins: usize,

    /// Range of the axis
    pub range: RangeSpec,
}
//
impl AxisSpec {
    /// Axis with a range known in advance
    pub fn fixed(bins: usize, lo: Float, hi: Float) -> Self {
        Self {
            bins,
            range: RangeSpec::Fixed { lo, hi },
        }
    }

    /// Axis starting at zero, ending at the largest observed value times
    /// `margin`, or at the fallback range if nothing was observed
    pub fn inferred(bins: usize, margin: Float, fallback: (Float, Float)) -> Self {
        Self {
            bins,
            range: RangeSpec::Inferred(RangePolicy::from_zero(margin, fallback)),
        }
    }

    /// Truth that the range must be discovered in a first pass
    pub fn needs_first_pass(&self) -> bool {
        self.range.needs_first_pass()
    }

    /// Binning of this axis, given the first-pass values (if any)
    pub fn binning(&self, values: &[Float]) -> Binning {
        let (lo, hi) = self.range.resolve(values);
        Binning::new(self.bins, lo, hi)
    }

    /// Check that this axis can be binned
    fn check(&self, name: &str) -> Result<()> {
        ensure!(self.bins > 0, "{name} needs at least one bin");
        match self.range {
            RangeSpec::Fixed { lo, hi } => {
                ensure!(hi > lo, "{name} has an empty range [{lo}, {hi})")
            }
            RangeSpec::Inferred(RangePolicy {
                lower,
                margin,
                fallback: (lo, hi),
            }) => {
                ensure!(margin > 0., "{name} needs a positive margin");
                ensure!(hi > lo, "{name} has an empty fallback range [{lo}, {hi})");
                if lower == LowerEdge::Zero {
                    ensure!(lo == 0., "{name} starts at zero, so must its fallback range");
                }
            }
        }
        Ok(())
    }
}

/// Truth-level kinematics study
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruthConfig {
    /// Directory scanned for input samples
    pub input_dir: PathBuf,

    /// Only files whose name starts with this prefix are processed
    pub file_prefix: String,

    /// ...and whose extension is this one
    pub extension: String,

    /// Per-sample output directories are created under this one
    pub output_root: PathBuf,

    /// Selection of the particles of interest
    pub cut: TruthCut,

    /// Histogram binning
    pub bins: TruthBins,

    /// Histograms whose overflow is folded into the last bin
    pub merge_overflow: Vec<String>,

    /// Draw 1D histograms with a logarithmic vertical axis
    pub log_y: bool,
}
//
impl Default for TruthConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            file_prefix: "frvz_".to_owned(),
            extension: "jsonl".to_owned(),
            output_root: PathBuf::from("."),
            cut: TruthCut::default(),
            bins: TruthBins::default(),
            merge_overflow: ["dp_pt", "dp_lxy", "dp_lz", "dp_ctau"]
                .iter()
                .map(|&name| name.to_owned())
                .collect(),
            log_y: true,
        }
    }
}

/// Binning of the truth-level histograms
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruthBins {
    /// Transverse momentum (GeV)
    pub pt: AxisSpec,
    /// Pseudorapidity
    pub eta: AxisSpec,
    /// Azimuth
    pub phi: AxisSpec,
    /// Mass (GeV)
    pub m: AxisSpec,
    /// Transverse decay length (mm)
    pub lxy: AxisSpec,
    /// Longitudinal decay length (mm)
    pub lz: AxisSpec,
    /// Proper decay length (mm)
    pub ctau: AxisSpec,
    /// Opening angle of two-body decays
    pub delta_r: AxisSpec,
    /// 2m/pt approximation of the opening angle
    pub approx_delta_r: AxisSpec,
}
//
impl Default for TruthBins {
    fn default() -> Self {
        Self {
            pt: AxisSpec::inferred(100, 1.1, (0., 500.)),
            eta: AxisSpec::fixed(100, -5., 5.),
            phi: AxisSpec::fixed(100, -3.2, 3.2),
            m: AxisSpec::inferred(100, 1.2, (0., 1.)),
            lxy: AxisSpec::fixed(100, 0., 10_000.),
            lz: AxisSpec::inferred(100, 1.1, (0., 1.)),
            ctau: AxisSpec::inferred(100, 1.1, (0., 100.)),
            delta_r: AxisSpec::inferred(100, 1.1, (0., 1.)),
            approx_delta_r: AxisSpec::inferred(100, 1.1, (0., 1.)),
        }
    }
}

/// Reconstruction efficiency study
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EfficiencyConfig {
    /// Input sample
    pub input: Option<PathBuf>,

    /// Output directory
    pub output_dir: PathBuf,

    /// Truth and reconstructed objects closer than this are matched
    pub match_radius: Float,

    /// Preselection of truth particles
    pub truth_cut: TruthCut,

    /// Preselection of reconstructed jets
    pub jet_cut: JetCut,

    /// Histogram binning
    pub bins: EfficiencyBins,
}
//
impl Default for EfficiencyConfig {
    fn default() -> Self {
        Self {
            input: None,
            output_dir: PathBuf::from("output_eff_plot"),
            match_radius: DEFAULT_MATCH_RADIUS,
            truth_cut: TruthCut::efficiency_preselection(),
            jet_cut: JetCut::default(),
            bins: EfficiencyBins::default(),
        }
    }
}

/// Binning of the efficiency curves
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EfficiencyBins {
    /// Truth transverse momentum (GeV)
    pub pt: AxisSpec,
    /// Truth pseudorapidity
    pub eta: AxisSpec,
    /// Truth azimuth
    pub phi: AxisSpec,
    /// Truth transverse decay length (m)
    pub lxy: AxisSpec,
}
//
impl Default for EfficiencyBins {
    fn default() -> Self {
        Self {
            pt: AxisSpec::fixed(20, 0., 100.),
            eta: AxisSpec::fixed(20, -2., 2.),
            phi: AxisSpec::fixed(20, -3., 3.),
            lxy: AxisSpec::fixed(20, 0., 5.),
        }
    }
}

/// Fake rate study
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FakeRateConfig {
    /// Input sample
    pub input: Option<PathBuf>,

    /// Output directory
    pub output_dir: PathBuf,

    /// Truth and reconstructed objects closer than this are matched
    pub match_radius: Float,

    /// Truth particles that count as genuine
    pub truth_cut: TruthCut,

    /// Preselection of reconstructed jets
    pub jet_cut: JetCut,

    /// Only consider the leading preselected jet of each event
    pub leading_only: bool,

    /// Histogram binning
    pub bins: FakeRateBins,
}
//
impl Default for FakeRateConfig {
    fn default() -> Self {
        Self {
            input: None,
            output_dir: PathBuf::from("output_fake_plot"),
            match_radius: DEFAULT_MATCH_RADIUS,
            truth_cut: TruthCut::default(),
            jet_cut: JetCut::default(),
            leading_only: false,
            bins: FakeRateBins::default(),
        }
    }
}

/// Binning of the fake rate curves
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FakeRateBins {
    /// Jet transverse momentum (GeV)
    pub pt: AxisSpec,
    /// Jet pseudorapidity
    pub eta: AxisSpec,
    /// Jet azimuth
    pub phi: AxisSpec,
}
//
impl Default for FakeRateBins {
    fn default() -> Self {
        Self {
            pt: AxisSpec::fixed(20, 0., 100.),
            eta: AxisSpec::fixed(20, -2., 2.),
            phi: AxisSpec::fixed(20, -3., 3.),
        }
    }
}

/// Opening angle vs. 2m/pt study
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Input samples
    pub inputs: Vec<PathBuf>,

    /// Per-sample output directories are created under this one
    pub output_root: PathBuf,

    /// Selection of the particles of interest
    pub cut: TruthCut,

    /// Histogram binning
    pub bins: HeatmapBins,
}
//
impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output_root: PathBuf::from("."),
            cut: TruthCut::default(),
            bins: HeatmapBins::default(),
        }
    }
}

/// Binning of the heatmap study
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapBins {
    /// Transverse momentum (GeV)
    pub pt: AxisSpec,
    /// Opening angle
    pub delta_r: AxisSpec,
    /// 2m/pt approximation of the opening angle
    pub approx_delta_r: AxisSpec,
}
//
impl Default for HeatmapBins {
    fn default() -> Self {
        Self {
            pt: AxisSpec::fixed(100, 0., 500.),
            delta_r: AxisSpec::fixed(100, 0., 0.2),
            approx_delta_r: AxisSpec::fixed(100, 0., 0.2),
        }
    }
}

/// One labelled input of an overlay
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayInput {
    /// Legend label
    pub label: String,

    /// Histogram store written by a previous run
    pub store: PathBuf,
}

/// A set of comparison plots across finished runs
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Name used to select this set on the command line
    pub name: String,

    /// Output directory
    pub output_dir: PathBuf,

    /// Stores to compare
    pub inputs: Vec<OverlayInput>,

    /// Records to overlay, one plot each
    pub records: Vec<String>,

    /// Explicit horizontal ranges, by record name
    pub x_ranges: BTreeMap<String, (Float, Float)>,

    /// Draw histograms with a logarithmic vertical axis
    pub log_y: bool,
}
