//! Truth-level kinematics of dark photons
//!
//! Momentum, mass and decay length scales depend a lot on the generated
//! sample, so most histogram ranges are discovered in a first pass over the
//! events before anything is filled.

use super::{decay_kinematics, DecayKinematics};
use crate::{
    aggregator::{Analysis, Outcome},
    config::TruthConfig,
    event::{Event, SchemaError},
    histogram::{Hist1D, Hist2D, Labels},
    numeric::Float,
    Result,
};
use std::collections::BTreeMap;

/// Values seen in the first pass, one list per histogrammed quantity
#[derive(Debug, Default)]
struct Observed {
    pt: Vec<Float>,
    eta: Vec<Float>,
    phi: Vec<Float>,
    m: Vec<Float>,
    lxy: Vec<Float>,
    lz: Vec<Float>,
    ctau: Vec<Float>,
    delta_r: Vec<Float>,
    approx_delta_r: Vec<Float>,
}
//
impl Observed {
    fn record(&mut self, dp: &DecayKinematics) {
        self.pt.push(dp.pt);
        self.eta.push(dp.eta);
        self.phi.push(dp.phi);
        self.m.push(dp.m);
        self.lxy.push(dp.lxy);
        self.lz.push(dp.lz);
        self.ctau.extend(dp.ctau);
        self.delta_r.extend(dp.delta_r);
        self.approx_delta_r.extend(dp.approx_delta_r);
    }
}

/// Histograms of the truth analysis
struct TruthHistograms {
    pt: Hist1D,
    eta: Hist1D,
    phi: Hist1D,
    m: Hist1D,
    lxy: Hist1D,
    lz: Hist1D,
    ctau: Hist1D,
    delta_r: Hist1D,
    delta_r_vs_approx: Hist2D,
}
//
impl TruthHistograms {
    fn new(cfg: &TruthConfig, seen: &Observed) -> Self {
        let bins = &cfg.bins;
        let events = |title: &str, x: &str| Labels::new(title, x, "Events");
        Self {
            pt: Hist1D::new("dp_pt", events("dark photon pt", "pT [GeV]"), bins.pt.binning(&seen.pt)),
            eta: Hist1D::new("dp_eta", events("dark photon eta", "eta"), bins.eta.binning(&seen.eta)),
            phi: Hist1D::new("dp_phi", events("dark photon phi", "phi"), bins.phi.binning(&seen.phi)),
            m: Hist1D::new("dp_m", events("dark photon mass", "Mass [GeV]"), bins.m.binning(&seen.m)),
            lxy: Hist1D::new("dp_lxy", events("dark photon Lxy", "Lxy [mm]"), bins.lxy.binning(&seen.lxy)),
            lz: Hist1D::new("dp_lz", events("dark photon Lz", "Lz [mm]"), bins.lz.binning(&seen.lz)),
            ctau: Hist1D::new(
                "dp_ctau",
                events("dark photon ctau", "ctau [mm]"),
                bins.ctau.binning(&seen.ctau),
            ),
            delta_r: Hist1D::new(
                "dp_deltaR",
                events("dark photon DeltaR", "DeltaR"),
                bins.delta_r.binning(&seen.delta_r),
            ),
            delta_r_vs_approx: Hist2D::new(
                "deltaR_vs_2mPt",
                Labels::new(
                    "True DeltaR vs. 2m/pT approx.",
                    "Approximation (2m/pT)",
                    "True DeltaR",
                ),
                bins.approx_delta_r.binning(&seen.approx_delta_r),
                bins.delta_r.binning(&seen.delta_r),
            ),
        }
    }

    fn fill(&mut self, dp: &DecayKinematics) {
        self.pt.fill(dp.pt);
        self.eta.fill(dp.eta);
        self.phi.fill(dp.phi);
        self.m.fill(dp.m);
        self.lxy.fill(dp.lxy);
        self.lz.fill(dp.lz);
        if let Some(ctau) = dp.ctau {
            self.ctau.fill(ctau);
        }
        if let Some(delta_r) = dp.delta_r {
            self.delta_r.fill(delta_r);
            if let Some(approx) = dp.approx_delta_r {
                self.delta_r_vs_approx.fill(approx, delta_r);
            }
        }
    }
}

/// Kinematic verification figures of a finished truth analysis
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VerificationReport {
    /// Center of the most populated mass bin (GeV)
    pub mass_peak: Option<Float>,

    /// Mean pseudorapidity, expected to be close to zero
    pub eta_mean: Option<Float>,

    /// Mean proper decay length (mm)
    pub ctau_mean: Option<Float>,
}
//
impl VerificationReport {
    fn new(m: &Hist1D, eta: &Hist1D, ctau: &Hist1D) -> Self {
        Self {
            mass_peak: m.max_bin().map(|bin| m.binning.center(bin)),
            eta_mean: eta.mean(),
            ctau_mean: ctau.mean(),
        }
    }

    /// Log the figures and turn them into run notes
    fn publish(&self) -> BTreeMap<String, String> {
        let show = |x: Option<Float>, decimals: usize| {
            x.map_or_else(|| "undefined".to_owned(), |x| format!("{x:.decimals$}"))
        };
        let mass_peak = show(self.mass_peak, 4);
        let eta_mean = show(self.eta_mean, 4);
        let ctau_mean = show(self.ctau_mean, 2);
        log::info!("--- Kinematic verification report ---");
        log::info!("Dark photon mass peak  : {mass_peak} GeV");
        log::info!("Dark photon eta mean   : {eta_mean} (expected: ~0.0)");
        log::info!("Dark photon c-tau mean : {ctau_mean} mm");
        BTreeMap::from([
            ("mass_peak_gev".to_owned(), mass_peak),
            ("eta_mean".to_owned(), eta_mean),
            ("ctau_mean_mm".to_owned(), ctau_mean),
        ])
    }
}

/// Two-pass truth-level kinematics study of one sample
pub struct TruthAnalysis<'cfg> {
    cfg: &'cfg TruthConfig,
    seen: Observed,
    histograms: TruthHistograms,
}
//
impl<'cfg> TruthAnalysis<'cfg> {
    /// Set up the study
    ///
    /// Until the first pass configures them, inferred axes use their fallback
    /// ranges.
    pub fn new(cfg: &'cfg TruthConfig) -> Self {
        let seen = Observed::default();
        Self {
            cfg,
            histograms: TruthHistograms::new(cfg, &seen),
            seen,
        }
    }
}
//
impl Analysis for TruthAnalysis<'_> {
    fn needs_first_pass(&self) -> bool {
        let bins = &self.cfg.bins;
        [
            &bins.pt,
            &bins.eta,
            &bins.phi,
            &bins.m,
            &bins.lxy,
            &bins.lz,
            &bins.ctau,
            &bins.delta_r,
            &bins.approx_delta_r,
        ]
        .iter()
        .any(|axis| axis.needs_first_pass())
    }

    fn collect(&mut self, event: &Event) -> Result<(), SchemaError> {
        for dp in decay_kinematics(event, &self.cfg.cut)? {
            self.seen.record(&dp);
        }
        Ok(())
    }

    fn configure(&mut self) -> Result<()> {
        self.histograms = TruthHistograms::new(self.cfg, &self.seen);
        self.seen = Observed::default();
        Ok(())
    }

    fn fill(&mut self, event: &Event) -> Result<(), SchemaError> {
        for dp in decay_kinematics(event, &self.cfg.cut)? {
            self.histograms.fill(&dp);
        }
        Ok(())
    }

    fn finalize(self) -> Result<Outcome> {
        let mut h = self.histograms;
        let merge = |name: &str| self.cfg.merge_overflow.iter().any(|n| n == name);
        for hist in [
            &mut h.pt,
            &mut h.eta,
            &mut h.phi,
            &mut h.m,
            &mut h.lxy,
            &mut h.lz,
            &mut h.ctau,
            &mut h.delta_r,
        ] {
            let merge_overflow = merge(&hist.name);
            hist.finalize(merge_overflow);
        }
        h.delta_r_vs_approx.finalize();

        let notes = VerificationReport::new(&h.m, &h.eta, &h.ctau).publish();
        Ok(Outcome {
            records: vec![
                h.pt.into(),
                h.eta.into(),
                h.phi.into(),
                h.m.into(),
                h.lxy.into(),
                h.lz.into(),
                h.ctau.into(),
                h.delta_r.into(),
                h.delta_r_vs_approx.into(),
            ],
            notes,
        })
    }
}
