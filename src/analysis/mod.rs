//! Analyses built on top of the shared event loop
//!
//! Each analysis is a thin configuration of [`EventAggregator`]: which
//! candidates to select, which quantities to derive from them, and where to
//! accumulate those.
//!
//! [`EventAggregator`]: crate::aggregator::EventAggregator

pub mod efficiency;
pub mod fake_rate;
pub mod heatmap;
pub mod truth;

use crate::{
    candidates::{daughter_separation, find_daughters, select_truth_candidates},
    event::{Event, SchemaError},
    evcut::TruthCut,
    numeric::Float,
};

/// Quantities derived from one selected truth particle and its decay
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecayKinematics {
    /// Transverse momentum (GeV)
    pub pt: Float,
    /// Pseudorapidity
    pub eta: Float,
    /// Azimuth
    pub phi: Float,
    /// Mass (GeV)
    pub m: Float,
    /// Transverse decay length (mm)
    pub lxy: Float,
    /// Longitudinal decay length (mm)
    pub lz: Float,
    /// Proper decay length (mm), if the particle moves
    pub ctau: Option<Float>,
    /// Opening angle, for two-body decays
    pub delta_r: Option<Float>,
    /// 2m/pt, for two-body decays of particles with transverse momentum
    pub approx_delta_r: Option<Float>,
}

/// Derive the decay kinematics of every truth particle of an event which
/// passes a cut
pub fn decay_kinematics(event: &Event, cut: &TruthCut) -> Result<Vec<DecayKinematics>, SchemaError> {
    let candidates = select_truth_candidates(event, cut)?;
    Ok(candidates
        .iter()
        .map(|candidate| {
            let daughters = find_daughters(event, candidate.barcode);
            let delta_r = daughter_separation(&daughters);
            DecayKinematics {
                pt: candidate.p4.pt(),
                eta: candidate.p4.eta(),
                phi: candidate.p4.phi(),
                m: candidate.p4.m(),
                lxy: candidate.lxy(),
                lz: candidate.lz(),
                ctau: candidate.proper_lifetime(),
                delta_r,
                approx_delta_r: delta_r.and_then(|_| candidate.approx_opening_angle()),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::tests::sample_raw_event;

    #[test]
    fn sample_decay() {
        let event = Event::bind(sample_raw_event()).unwrap();
        let kinematics = decay_kinematics(&event, &TruthCut::default()).unwrap();
        assert_eq!(kinematics.len(), 1);
        let dp = kinematics[0];
        assert!((dp.pt - 30.).abs() < 1e-9);
        assert_eq!(dp.lxy, 50.);
        assert_eq!(dp.lz, 120.);
        assert!(dp.ctau.unwrap() > 0.);
        assert!((dp.delta_r.unwrap() - 0.05).abs() < 1e-12);
        assert!((dp.approx_delta_r.unwrap() - 2. * dp.m / dp.pt).abs() < 1e-12);
    }

    #[test]
    fn no_opening_angle_without_two_daughters() {
        let mut raw = sample_raw_event();
        raw.child_mom_barcode = vec![10001, 10002];
        let event = Event::bind(raw).unwrap();
        let dp = decay_kinematics(&event, &TruthCut::default()).unwrap()[0];
        assert_eq!(dp.delta_r, None);
        assert_eq!(dp.approx_delta_r, None);
    }
}
