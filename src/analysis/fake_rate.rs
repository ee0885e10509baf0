//! Matched and fake rates of reconstructed lepton jets
//!
//! Every preselected lepton jet enters the common denominator. Jets within the
//! matching radius of a truth dark photon count as matched, all others as
//! fakes, so that both numerators add up to the denominator in every bin.

use crate::{
    aggregator::{Analysis, Outcome},
    candidates::{select_jets, select_leading_jet, select_truth_candidates},
    config::FakeRateConfig,
    efficiency::RatioAccumulator,
    event::{Event, SchemaError},
    histogram::{Binning, Labels},
    momentum::{is_matched, FourMomentum},
    numeric::Float,
    store::Record,
    Result,
};

/// Matched and fake rate accumulators along one jet quantity
struct RatePair {
    matched: RatioAccumulator,
    fake: RatioAccumulator,
}
//
impl RatePair {
    fn new(quantity: &str, axis_title: &str, binning: Binning) -> Self {
        Self {
            matched: RatioAccumulator::new(
                &format!("matched_rate_vs_{quantity}"),
                Labels::new(
                    &format!("Matched Rate vs. {quantity}"),
                    axis_title,
                    "Matched Rate",
                ),
                binning,
            ),
            fake: RatioAccumulator::new(
                &format!("fake_rate_vs_{quantity}"),
                Labels::new(&format!("Fake Rate vs. {quantity}"), axis_title, "Fake Rate"),
                binning,
            ),
        }
    }

    fn fill(&mut self, value: Float, matched: bool) {
        self.matched.fill(value, matched);
        self.fake.fill(value, !matched);
    }
}

/// One-pass fake rate study of one sample
pub struct FakeRateAnalysis<'cfg> {
    cfg: &'cfg FakeRateConfig,
    vs_pt: RatePair,
    vs_eta: RatePair,
    vs_phi: RatePair,
}
//
impl<'cfg> FakeRateAnalysis<'cfg> {
    /// Set up the study
    pub fn new(cfg: &'cfg FakeRateConfig) -> Self {
        let bins = &cfg.bins;
        Self {
            cfg,
            vs_pt: RatePair::new("pt", "Reconstructed LJ pT [GeV]", bins.pt.binning(&[])),
            vs_eta: RatePair::new("eta", "Reconstructed LJ eta", bins.eta.binning(&[])),
            vs_phi: RatePair::new("phi", "Reconstructed LJ phi", bins.phi.binning(&[])),
        }
    }
}
//
impl Analysis for FakeRateAnalysis<'_> {
    fn fill(&mut self, event: &Event) -> Result<(), SchemaError> {
        let jets = if self.cfg.leading_only {
            select_leading_jet(event, &self.cfg.jet_cut).into_iter().collect()
        } else {
            select_jets(event, &self.cfg.jet_cut)
        };
        if jets.is_empty() {
            return Ok(());
        }
        let truth: Vec<FourMomentum> = select_truth_candidates(event, &self.cfg.truth_cut)?
            .into_iter()
            .map(|dp| dp.p4)
            .collect();
        for jet in &jets {
            let matched = is_matched(jet, &truth, self.cfg.match_radius);
            self.vs_pt.fill(jet.pt(), matched);
            self.vs_eta.fill(jet.eta(), matched);
            self.vs_phi.fill(jet.phi(), matched);
        }
        Ok(())
    }

    fn finalize(self) -> Result<Outcome> {
        let mut matched: Vec<Record> = Vec::new();
        let mut fake: Vec<Record> = Vec::new();
        for pair in [self.vs_eta, self.vs_phi, self.vs_pt] {
            matched.push(pair.matched.finalize()?.into());
            fake.push(pair.fake.finalize()?.into());
        }
        matched.append(&mut fake);
        Ok(Outcome {
            records: matched,
            notes: Default::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        efficiency::EfficiencyCurve,
        event::tests::{random_raw_event, sample_raw_event},
    };
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn curve<'a>(outcome: &'a Outcome, name: &str) -> &'a EfficiencyCurve {
        outcome
            .records
            .iter()
            .find_map(|r| match r {
                Record::Efficiency(c) if c.name == name => Some(c),
                _ => None,
            })
            .unwrap()
    }

    /// Sample event with a second, fake jet far away from the dark photon
    fn two_jet_event() -> Event {
        let mut raw = sample_raw_event();
        raw.lj_jet_pt = vec![28e3, 45e3];
        raw.lj_jet_eta = vec![0.52, -1.5];
        raw.lj_jet_phi = vec![0.12, 2.5];
        raw.lj_jet_m = vec![400.; 2];
        raw.lj_jet_em_frac = vec![0.1; 2];
        raw.lj_jet_gap_ratio = vec![0.95; 2];
        Event::bind(raw).unwrap()
    }

    #[test]
    fn matched_and_fake_add_up() {
        let cfg = FakeRateConfig::default();
        let mut analysis = FakeRateAnalysis::new(&cfg);
        analysis.fill(&two_jet_event()).unwrap();
        analysis.fill(&Event::bind(sample_raw_event()).unwrap()).unwrap();
        let outcome = analysis.finalize().unwrap();
        assert_eq!(outcome.records.len(), 6);

        for quantity in ["pt", "eta", "phi"] {
            let matched = curve(&outcome, &format!("matched_rate_vs_{quantity}"));
            let fake = curve(&outcome, &format!("fake_rate_vs_{quantity}"));
            let mut matched_total = 0;
            let mut fake_total = 0;
            for (m, f) in matched.points.iter().zip(&fake.points) {
                assert_eq!(m.total, f.total);
                assert_eq!(m.passed + f.passed, m.total);
                matched_total += m.passed;
                fake_total += f.passed;
            }
            assert_eq!((matched_total, fake_total), (2, 1), "{quantity}");
        }
    }

    #[test]
    fn leading_only_ignores_subleading_jets() {
        let cfg = FakeRateConfig {
            leading_only: true,
            ..FakeRateConfig::default()
        };
        let mut analysis = FakeRateAnalysis::new(&cfg);
        analysis.fill(&two_jet_event()).unwrap();
        let outcome = analysis.finalize().unwrap();
        let fake = curve(&outcome, "fake_rate_vs_eta");
        assert!(fake.points.iter().all(|p| p.passed == 0));
        assert_eq!(fake.points.iter().map(|p| p.total).sum::<u64>(), 1);
    }

    #[test]
    fn failing_leading_jet_vetoes_the_event() {
        let mut raw = sample_raw_event();
        raw.lj_jet_pt = vec![28e3, 45e3];
        raw.lj_jet_eta = vec![0.52, -1.5];
        raw.lj_jet_phi = vec![0.12, 2.5];
        raw.lj_jet_m = vec![400.; 2];
        raw.lj_jet_em_frac = vec![0.5, 0.1];
        raw.lj_jet_gap_ratio = vec![0.95; 2];
        let cfg = FakeRateConfig {
            leading_only: true,
            ..FakeRateConfig::default()
        };
        let mut analysis = FakeRateAnalysis::new(&cfg);
        analysis.fill(&Event::bind(raw).unwrap()).unwrap();
        let outcome = analysis.finalize().unwrap();
        for name in ["matched_rate_vs_pt", "fake_rate_vs_eta", "fake_rate_vs_phi"] {
            let rate = curve(&outcome, name);
            assert_eq!(rate.points.iter().map(|p| p.total).sum::<u64>(), 0, "{name}");
        }
    }

    #[test]
    fn matched_and_fake_partition_random_jets() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0xfa6e);
        for leading_only in [false, true] {
            let cfg = FakeRateConfig {
                leading_only,
                ..FakeRateConfig::default()
            };
            let mut analysis = FakeRateAnalysis::new(&cfg);
            for _ in 0..500 {
                analysis.fill(&Event::bind(random_raw_event(&mut rng)).unwrap()).unwrap();
            }
            let outcome = analysis.finalize().unwrap();
            for quantity in ["pt", "eta", "phi"] {
                let matched = curve(&outcome, &format!("matched_rate_vs_{quantity}"));
                let fake = curve(&outcome, &format!("fake_rate_vs_{quantity}"));
                assert!(matched.points.iter().any(|p| p.passed > 0), "{quantity}");
                assert!(fake.points.iter().any(|p| p.passed > 0), "{quantity}");
                for (m, f) in matched.points.iter().zip(&fake.points) {
                    assert_eq!(m.total, f.total);
                    assert!(m.passed <= m.total && f.passed <= f.total);
                    assert_eq!(m.passed + f.passed, m.total);
                }
            }
        }
    }

    #[test]
    fn jets_without_truth_are_fakes() {
        let mut raw = sample_raw_event();
        raw.truth_pdg_id = vec![11, 11];
        let cfg = FakeRateConfig::default();
        let mut analysis = FakeRateAnalysis::new(&cfg);
        analysis.fill(&Event::bind(raw).unwrap()).unwrap();
        let outcome = analysis.finalize().unwrap();
        let fake = curve(&outcome, "fake_rate_vs_phi");
        assert_eq!(fake.defined_points().map(|(_, r)| r).collect::<Vec<_>>(), [1.]);
    }

    #[test]
    fn events_below_multiplicity_threshold_are_skipped() {
        let mut raw = sample_raw_event();
        raw.n_lj_jets20 = 0;
        let cfg = FakeRateConfig::default();
        let mut analysis = FakeRateAnalysis::new(&cfg);
        analysis.fill(&Event::bind(raw).unwrap()).unwrap();
        let outcome = analysis.finalize().unwrap();
        let matched = curve(&outcome, "matched_rate_vs_pt");
        assert_eq!(matched.defined_points().count(), 0);
    }
}
