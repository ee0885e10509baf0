//! Reconstruction efficiency of dark photons as lepton jets
//!
//! Every preselected truth dark photon enters the denominator. It enters the
//! numerator if at least one preselected lepton jet of the same event lies
//! within the matching radius.

use crate::{
    aggregator::{Analysis, Outcome},
    candidates::{select_jets, select_truth_candidates},
    config::EfficiencyConfig,
    efficiency::RatioAccumulator,
    event::{Event, SchemaError},
    histogram::Labels,
    momentum::is_matched,
    numeric::Float,
    Result,
};

/// Millimeters per meter
const MM_PER_M: Float = 1000.;

/// One-pass efficiency study of one sample
pub struct EfficiencyAnalysis<'cfg> {
    cfg: &'cfg EfficiencyConfig,
    vs_pt: RatioAccumulator,
    vs_eta: RatioAccumulator,
    vs_phi: RatioAccumulator,
    vs_lxy: RatioAccumulator,
}
//
impl<'cfg> EfficiencyAnalysis<'cfg> {
    /// Set up the study
    pub fn new(cfg: &'cfg EfficiencyConfig) -> Self {
        let bins = &cfg.bins;
        let labels = |x: &str| Labels::new("Efficiency", x, "Efficiency");
        Self {
            cfg,
            vs_pt: RatioAccumulator::new(
                "efficiency_vs_pt",
                labels("Truth DP pT [GeV]"),
                bins.pt.binning(&[]),
            ),
            vs_eta: RatioAccumulator::new(
                "efficiency_vs_eta",
                labels("Truth DP eta"),
                bins.eta.binning(&[]),
            ),
            vs_phi: RatioAccumulator::new(
                "efficiency_vs_phi",
                labels("Truth DP phi"),
                bins.phi.binning(&[]),
            ),
            vs_lxy: RatioAccumulator::new(
                "efficiency_vs_lxy",
                labels("Truth DP Lxy [m]"),
                bins.lxy.binning(&[]),
            ),
        }
    }
}
//
impl Analysis for EfficiencyAnalysis<'_> {
    fn fill(&mut self, event: &Event) -> Result<(), SchemaError> {
        let truth = select_truth_candidates(event, &self.cfg.truth_cut)?;
        if truth.is_empty() {
            return Ok(());
        }
        let jets = select_jets(event, &self.cfg.jet_cut);
        for dp in &truth {
            let matched = is_matched(&dp.p4, &jets, self.cfg.match_radius);
            self.vs_pt.fill(dp.p4.pt(), matched);
            self.vs_eta.fill(dp.p4.eta(), matched);
            self.vs_phi.fill(dp.p4.phi(), matched);
            self.vs_lxy.fill(dp.lxy() / MM_PER_M, matched);
        }
        Ok(())
    }

    fn finalize(self) -> Result<Outcome> {
        let mut outcome = Outcome::default();
        for acc in [self.vs_pt, self.vs_eta, self.vs_phi, self.vs_lxy] {
            let passed = acc.passed().fills();
            let total = acc.total().fills();
            log::debug!("{}: {passed} matched out of {total}", acc.passed().name);
            outcome.records.push(acc.finalize()?.into());
        }
        Ok(outcome)
    }
}
