//! Mechanism to apply selection cuts to recorded objects

use crate::{
    event::{Event, LeptonJet, SchemaError, TruthParticle, DARK_PHOTON_PDG_ID, MUON_DECAY_TYPE},
    momentum::MomentumConvention,
    numeric::{Float, NATIVE_TO_WORKING},
};
use prefix_num_ops::real::*;
use serde::{Deserialize, Serialize};

/// Cuts on truth-level particles
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruthCut {
    /// Identity code of the particles of interest
    pub pdg_id: i32,

    /// Cut on maximal |η|
    pub max_abs_eta: Option<Float>,

    /// Cut on minimal transverse momentum (GeV)
    pub min_pt: Option<Float>,

    /// Decay classification to reject
    pub excluded_decay_type: Option<i32>,

    /// Whether momenta are built from the energy or the mass branch
    pub momentum: MomentumConvention,
}
//
impl Default for TruthCut {
    /// Select every dark photon, whatever its kinematics
    fn default() -> Self {
        Self {
            pdg_id: DARK_PHOTON_PDG_ID,
            max_abs_eta: None,
            min_pt: None,
            excluded_decay_type: None,
            momentum: MomentumConvention::PtEtaPhiE,
        }
    }
}
//
impl TruthCut {
    /// Dark photon preselection of the efficiency study: central, hard, and
    /// not decaying to muons
    pub fn efficiency_preselection() -> Self {
        Self {
            max_abs_eta: Some(1.1),
            min_pt: Some(20.),
            excluded_decay_type: Some(MUON_DECAY_TYPE),
            ..Self::default()
        }
    }

    /// Decide whether a truth particle passes the cut or should be rejected
    pub fn keep(&self, particle: &TruthParticle) -> Result<bool, SchemaError> {
        if particle.pdg_id != self.pdg_id {
            return Ok(false);
        }
        if let Some(max_abs_eta) = self.max_abs_eta {
            if abs(particle.eta) >= max_abs_eta {
                return Ok(false);
            }
        }
        if let Some(min_pt) = self.min_pt {
            if particle.pt * NATIVE_TO_WORKING <= min_pt {
                return Ok(false);
            }
        }
        if let Some(excluded) = self.excluded_decay_type {
            let decay_type = particle
                .decay_type
                .ok_or(SchemaError::MissingBranch("truthDecayType"))?;
            if decay_type == excluded {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Cuts on reconstructed lepton jets
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JetCut {
    /// Events must have more than this many jets above 20 GeV
    pub min_jets_above_20: i32,

    /// Cut on maximal electromagnetic energy fraction
    pub max_em_frac: Float,

    /// Cut on minimal gap ratio
    pub min_gap_ratio: Float,

    /// Cut on minimal transverse momentum (GeV)
    pub min_pt: Float,
}
//
impl Default for JetCut {
    fn default() -> Self {
        Self {
            min_jets_above_20: 0,
            max_em_frac: 0.4,
            min_gap_ratio: 0.9,
            min_pt: 20.,
        }
    }
}
//
impl JetCut {
    /// Decide whether an event has enough jets to be considered at all
    pub fn keep_event(&self, event: &Event) -> bool {
        event.num_jets_above_20() > self.min_jets_above_20
    }

    /// Decide whether a jet passes the cut or should be rejected
    pub fn keep(&self, jet: &LeptonJet) -> bool {
        jet.em_frac < self.max_em_frac
            && jet.gap_ratio > self.min_gap_ratio
            && jet.pt * NATIVE_TO_WORKING > self.min_pt
    }
}
