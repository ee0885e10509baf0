//! Opening angle of dark photon decays vs. its 2m/pt approximation
//!
//! Unlike the truth study, this one works with fixed ranges zoomed on the
//! small-angle region, where the approximation is expected to hold.

use super::decay_kinematics;
use crate::{
    aggregator::{Analysis, Outcome},
    config::HeatmapConfig,
    event::{Event, SchemaError},
    evcut::TruthCut,
    histogram::{Hist1D, Hist2D, Labels},
    Result,
};

/// One-pass opening angle study of one sample
pub struct HeatmapAnalysis {
    pt: Hist1D,
    delta_r: Hist1D,
    delta_r_vs_approx: Hist2D,
    cut: TruthCut,
}
//
impl HeatmapAnalysis {
    /// Set up the study
    ///
    /// Ranges are never inferred here: any inferred axis resolves to its
    /// fallback range.
    pub fn new(cfg: &HeatmapConfig) -> Self {
        let bins = &cfg.bins;
        Self {
            pt: Hist1D::new(
                "dp_pt",
                Labels::new("dark photon pt", "pT [GeV]", "Events"),
                bins.pt.binning(&[]),
            ),
            delta_r: Hist1D::new(
                "dp_deltaR",
                Labels::new("dark photon DeltaR", "DeltaR", "Events"),
                bins.delta_r.binning(&[]),
            ),
            delta_r_vs_approx: Hist2D::new(
                "deltaR_vs_2mPt",
                Labels::new(
                    "True DeltaR vs. 2m/pT approximation",
                    "Approximation (2m/pT)",
                    "True DeltaR",
                ),
                bins.approx_delta_r.binning(&[]),
                bins.delta_r.binning(&[]),
            ),
            cut: cfg.cut.clone(),
        }
    }
}
//
impl Analysis for HeatmapAnalysis {
    fn fill(&mut self, event: &Event) -> Result<(), SchemaError> {
        for dp in decay_kinematics(event, &self.cut)? {
            // Only two-body decays are of interest here
            let Some(delta_r) = dp.delta_r else {
                continue;
            };
            if let Some(approx) = dp.approx_delta_r {
                self.delta_r_vs_approx.fill(approx, delta_r);
            }
            self.pt.fill(dp.pt);
            self.delta_r.fill(delta_r);
        }
        Ok(())
    }

    fn finalize(mut self) -> Result<Outcome> {
        self.pt.finalize(false);
        self.delta_r.finalize(false);
        self.delta_r_vs_approx.finalize();
        Ok(Outcome {
            records: vec![
                self.pt.into(),
                self.delta_r.into(),
                self.delta_r_vs_approx.into(),
            ],
            notes: Default::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{event::tests::sample_raw_event, store::Record};

    #[test]
    fn only_two_body_decays_are_counted() {
        let mut analysis = HeatmapAnalysis::new(&HeatmapConfig::default());
        analysis
            .fill(&Event::bind(sample_raw_event()).unwrap())
            .unwrap();
        let mut raw = sample_raw_event();
        raw.child_mom_barcode = vec![10001, 42];
        analysis.fill(&Event::bind(raw).unwrap()).unwrap();

        let outcome = analysis.finalize().unwrap();
        let [Record::Hist1d(pt), Record::Hist1d(delta_r), Record::Hist2d(h2)] =
            &outcome.records[..]
        else {
            panic!("unexpected record layout");
        };
        assert_eq!(pt.fills(), 1);
        assert_eq!((pt.binning.lo, pt.binning.hi), (0., 500.));
        assert_eq!(delta_r.fills(), 1);
        assert_eq!(delta_r.integral(), 1);
        // 2m/pt is well beyond the zoomed range for this sample
        assert_eq!(h2.fills(), 1);
        assert_eq!(h2.outside(), 1);
        assert!(h2.is_frozen());
    }
}
