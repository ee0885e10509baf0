//! This module defines the properties and storage of recorded events
//!
//! Events come from a fixed-schema table in which every object family (truth
//! particles, decay products, reconstructed lepton jets) is stored as a set of
//! parallel arrays. A raw row is deserialized as-is, then bound to a typed
//! [`Event`] which checks once that each family's arrays are aligned. Nothing
//! downstream of [`Event::bind`] needs to worry about index mismatches.

use crate::numeric::Float;
use serde::Deserialize;
use thiserror::Error;

/// Identity code of the dark photon in the truth record
pub const DARK_PHOTON_PDG_ID: i32 = 3000001;

/// Decay classification code of dark photons decaying to muons
pub const MUON_DECAY_TYPE: i32 = 13;

/// Shape problems detected while binding a raw row
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Two arrays of the same object family have different lengths
    #[error("branch {branch} has {found} entries, but {reference} has {expected}")]
    Misaligned {
        /// Branch whose length disagrees
        branch: &'static str,
        /// Its length
        found: usize,
        /// Branch used as the family's length reference
        reference: &'static str,
        /// The reference length
        expected: usize,
    },

    /// A branch needed by the configured selection is absent from the row
    #[error("branch {0} is required by the selection but absent")]
    MissingBranch(&'static str),

    /// The row could not be decoded at all
    #[error("undecodable row: {0}")]
    Undecodable(String),
}

/// One row of the event table, exactly as stored
///
/// Field names follow the stored branch names. Missing branches decode as
/// empty arrays, so that samples without e.g. reconstructed jets can still be
/// used by the truth-level analyses.
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawEvent {
    #[serde(rename = "truthPdgId")]
    pub truth_pdg_id: Vec<i32>,
    #[serde(rename = "truthPt")]
    pub truth_pt: Vec<Float>,
    #[serde(rename = "truthEta")]
    pub truth_eta: Vec<Float>,
    #[serde(rename = "truthPhi")]
    pub truth_phi: Vec<Float>,
    #[serde(rename = "truthE")]
    pub truth_e: Vec<Float>,
    #[serde(rename = "truthM")]
    pub truth_m: Option<Vec<Float>>,
    #[serde(rename = "truthDecayVtx_x")]
    pub truth_decay_vtx_x: Vec<Float>,
    #[serde(rename = "truthDecayVtx_y")]
    pub truth_decay_vtx_y: Vec<Float>,
    #[serde(rename = "truthDecayVtx_z")]
    pub truth_decay_vtx_z: Vec<Float>,
    #[serde(rename = "truthBarcode")]
    pub truth_barcode: Vec<i64>,
    #[serde(rename = "truthDecayType")]
    pub truth_decay_type: Option<Vec<i32>>,

    #[serde(rename = "childPdgId")]
    pub child_pdg_id: Vec<i32>,
    #[serde(rename = "childPt")]
    pub child_pt: Vec<Float>,
    #[serde(rename = "childEta")]
    pub child_eta: Vec<Float>,
    #[serde(rename = "childPhi")]
    pub child_phi: Vec<Float>,
    #[serde(rename = "childMomBarcode")]
    pub child_mom_barcode: Vec<i64>,

    #[serde(rename = "nLJjets20")]
    pub n_lj_jets20: i32,
    #[serde(rename = "LJjet_pt")]
    pub lj_jet_pt: Vec<Float>,
    #[serde(rename = "LJjet_eta")]
    pub lj_jet_eta: Vec<Float>,
    #[serde(rename = "LJjet_phi")]
    pub lj_jet_phi: Vec<Float>,
    #[serde(rename = "LJjet_m")]
    pub lj_jet_m: Vec<Float>,
    #[serde(rename = "LJjet_EMfrac")]
    pub lj_jet_em_frac: Vec<Float>,
    #[serde(rename = "LJjet_gapRatio")]
    pub lj_jet_gap_ratio: Vec<Float>,
}

/// One truth-level particle, viewed through the parallel arrays
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TruthParticle {
    pub pdg_id: i32,
    /// Transverse momentum (native units)
    pub pt: Float,
    pub eta: Float,
    pub phi: Float,
    /// Energy (native units)
    pub e: Float,
    /// Mass (native units), when the table stores it
    pub m: Option<Float>,
    /// Decay vertex (mm)
    pub decay_vertex: [Float; 3],
    pub barcode: i64,
    pub decay_type: Option<i32>,
}

/// One decay product
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Child {
    pub pdg_id: i32,
    /// Transverse momentum (native units)
    pub pt: Float,
    pub eta: Float,
    pub phi: Float,
    /// Barcode of the parent truth particle
    pub parent_barcode: i64,
}

/// One reconstructed lepton jet
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeptonJet {
    /// Transverse momentum (native units)
    pub pt: Float,
    pub eta: Float,
    pub phi: Float,
    /// Mass (native units)
    pub m: Float,
    /// Electromagnetic energy fraction
    pub em_frac: Float,
    pub gap_ratio: Float,
}

/// A validated event, with typed per-object access
pub struct Event {
    raw: RawEvent,
    num_truth: usize,
    num_children: usize,
    num_jets: usize,
}
//
impl Event {
    /// Check that every object family's arrays are aligned, then wrap the row
    pub fn bind(raw: RawEvent) -> Result<Self, SchemaError> {
        let num_truth = check_family(
            ("truthPdgId", raw.truth_pdg_id.len()),
            &[
                ("truthPt", raw.truth_pt.len()),
                ("truthEta", raw.truth_eta.len()),
                ("truthPhi", raw.truth_phi.len()),
                ("truthE", raw.truth_e.len()),
                ("truthM", raw.truth_m.as_ref().map_or(raw.truth_pdg_id.len(), Vec::len)),
                ("truthDecayVtx_x", raw.truth_decay_vtx_x.len()),
                ("truthDecayVtx_y", raw.truth_decay_vtx_y.len()),
                ("truthDecayVtx_z", raw.truth_decay_vtx_z.len()),
                ("truthBarcode", raw.truth_barcode.len()),
                (
                    "truthDecayType",
                    raw.truth_decay_type.as_ref().map_or(raw.truth_pdg_id.len(), Vec::len),
                ),
            ],
        )?;
        let num_children = check_family(
            ("childPdgId", raw.child_pdg_id.len()),
            &[
                ("childPt", raw.child_pt.len()),
                ("childEta", raw.child_eta.len()),
                ("childPhi", raw.child_phi.len()),
                ("childMomBarcode", raw.child_mom_barcode.len()),
            ],
        )?;
        let num_jets = check_family(
            ("LJjet_pt", raw.lj_jet_pt.len()),
            &[
                ("LJjet_eta", raw.lj_jet_eta.len()),
                ("LJjet_phi", raw.lj_jet_phi.len()),
                ("LJjet_m", raw.lj_jet_m.len()),
                ("LJjet_EMfrac", raw.lj_jet_em_frac.len()),
                ("LJjet_gapRatio", raw.lj_jet_gap_ratio.len()),
            ],
        )?;
        Ok(Self {
            raw,
            num_truth,
            num_children,
            num_jets,
        })
    }

    /// Number of truth particles
    pub fn num_truth(&self) -> usize {
        self.num_truth
    }

    /// Access a truth particle
    pub fn truth(&self, idx: usize) -> TruthParticle {
        let raw = &self.raw;
        TruthParticle {
            pdg_id: raw.truth_pdg_id[idx],
            pt: raw.truth_pt[idx],
            eta: raw.truth_eta[idx],
            phi: raw.truth_phi[idx],
            e: raw.truth_e[idx],
            m: raw.truth_m.as_ref().map(|m| m[idx]),
            decay_vertex: [
                raw.truth_decay_vtx_x[idx],
                raw.truth_decay_vtx_y[idx],
                raw.truth_decay_vtx_z[idx],
            ],
            barcode: raw.truth_barcode[idx],
            decay_type: raw.truth_decay_type.as_ref().map(|t| t[idx]),
        }
    }

    /// Iterate over truth particles, in storage order
    pub fn truth_particles(&self) -> impl Iterator<Item = TruthParticle> + '_ {
        (0..self.num_truth).map(move |idx| self.truth(idx))
    }

    /// Iterate over decay products, in storage order
    pub fn children(&self) -> impl Iterator<Item = Child> + '_ {
        let raw = &self.raw;
        (0..self.num_children).map(move |idx| Child {
            pdg_id: raw.child_pdg_id[idx],
            pt: raw.child_pt[idx],
            eta: raw.child_eta[idx],
            phi: raw.child_phi[idx],
            parent_barcode: raw.child_mom_barcode[idx],
        })
    }

    /// Number of reconstructed lepton jets stored in the event
    pub fn num_jets(&self) -> usize {
        self.num_jets
    }

    /// Number of lepton jets above the 20 GeV threshold, as counted upstream
    pub fn num_jets_above_20(&self) -> i32 {
        self.raw.n_lj_jets20
    }

    /// Iterate over reconstructed lepton jets, in storage (leading first) order
    pub fn jets(&self) -> impl Iterator<Item = LeptonJet> + '_ {
        let raw = &self.raw;
        (0..self.num_jets).map(move |idx| LeptonJet {
            pt: raw.lj_jet_pt[idx],
            eta: raw.lj_jet_eta[idx],
            phi: raw.lj_jet_phi[idx],
            m: raw.lj_jet_m[idx],
            em_frac: raw.lj_jet_em_frac[idx],
            gap_ratio: raw.lj_jet_gap_ratio[idx],
        })
    }
}

/// Check that all arrays of an object family have the reference length
fn check_family(
    (reference, expected): (&'static str, usize),
    others: &[(&'static str, usize)],
) -> Result<usize, SchemaError> {
    for &(branch, found) in others {
        if found != expected {
            return Err(SchemaError::Misaligned {
                branch,
                found,
                reference,
                expected,
            });
        }
    }
    Ok(expected)
}
