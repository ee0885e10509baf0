//! Physics candidates derived from recorded events
//!
//! Both the truth-level analyses and the performance studies start the same
//! way: pick the dark photons and lepton jets of an event, turn them into
//! 4-momenta in working units, and derive decay quantities from them.

use crate::{
    event::{Event, LeptonJet, SchemaError},
    evcut::{JetCut, TruthCut},
    momentum::{FourMomentum, MomentumConvention},
    numeric::{Float, NATIVE_TO_WORKING},
};
use prefix_num_ops::real::*;

/// A selected truth particle, with its kinematics in working units
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TruthCandidate {
    /// Index of the particle in the event's truth record
    pub index: usize,

    /// 4-momentum (GeV)
    pub p4: FourMomentum,

    /// Unique tag, referenced by the decay products
    pub barcode: i64,

    /// Decay vertex (mm)
    pub decay_vertex: [Float; 3],
}
//
impl TruthCandidate {
    /// Transverse decay length (mm)
    pub fn lxy(&self) -> Float {
        let [x, y, _] = self.decay_vertex;
        decay_length_transverse(x, y)
    }

    /// Longitudinal decay length (mm)
    pub fn lz(&self) -> Float {
        abs(self.decay_vertex[2])
    }

    /// 3D decay length (mm)
    pub fn l3d(&self) -> Float {
        let [x, y, z] = self.decay_vertex;
        decay_length_3d(x, y, z)
    }

    /// Proper decay length cτ (mm), undefined for particles at rest
    pub fn proper_lifetime(&self) -> Option<Float> {
        proper_lifetime(self.l3d(), self.p4.p(), self.p4.m())
    }

    /// Small-angle approximation of the opening angle of a two-body decay,
    /// 2m/pt, undefined for particles without transverse momentum
    pub fn approx_opening_angle(&self) -> Option<Float> {
        let pt = self.p4.pt();
        (pt > 0.).then(|| 2. * self.p4.m() / pt)
    }
}

/// Select the truth particles of an event which pass a cut
///
/// Candidates are returned in storage order. An empty selection is perfectly
/// normal and simply means that the event contributes nothing.
pub fn select_truth_candidates(
    event: &Event,
    cut: &TruthCut,
) -> Result<Vec<TruthCandidate>, SchemaError> {
    let mut candidates = Vec::new();
    for (index, particle) in event.truth_particles().enumerate() {
        if !cut.keep(&particle)? {
            continue;
        }
        let fourth = match cut.momentum {
            MomentumConvention::PtEtaPhiE => particle.e,
            MomentumConvention::PtEtaPhiM => {
                particle.m.ok_or(SchemaError::MissingBranch("truthM"))?
            }
        };
        candidates.push(TruthCandidate {
            index,
            p4: FourMomentum::new(
                cut.momentum,
                particle.pt * NATIVE_TO_WORKING,
                particle.eta,
                particle.phi,
                fourth * NATIVE_TO_WORKING,
            ),
            barcode: particle.barcode,
            decay_vertex: particle.decay_vertex,
        });
    }
    Ok(candidates)
}

/// Find the decay products of the truth particle tagged `parent_tag`
///
/// Decay products are treated as massless.
pub fn find_daughters(event: &Event, parent_tag: i64) -> Vec<FourMomentum> {
    event
        .children()
        .filter(|child| child.parent_barcode == parent_tag)
        .map(|child| FourMomentum::massless(child.pt * NATIVE_TO_WORKING, child.eta, child.phi))
        .collect()
}

/// Angular separation between the two decay products of a particle
///
/// Only two-body decays have a well-defined opening angle, any other number
/// of daughters yields `None`.
pub fn daughter_separation(daughters: &[FourMomentum]) -> Option<Float> {
    match daughters {
        [first, second] => Some(first.delta_r(second)),
        _ => None,
    }
}

/// Select the reconstructed lepton jets of an event which pass a cut
///
/// Returns nothing if the event itself fails the jet multiplicity cut. Jets
/// are returned in storage order, so the leading jet comes first.
pub fn select_jets(event: &Event, cut: &JetCut) -> Vec<FourMomentum> {
    if !cut.keep_event(event) {
        return Vec::new();
    }
    event
        .jets()
        .filter(|jet| cut.keep(jet))
        .map(|jet| jet_momentum(&jet))
        .collect()
}

/// Leading lepton jet of an event, if it passes the preselection
///
/// Only the first stored jet is considered. When it fails the cut, the event
/// has no leading jet, even if some subleading jet would pass.
pub fn select_leading_jet(event: &Event, cut: &JetCut) -> Option<FourMomentum> {
    if !cut.keep_event(event) {
        return None;
    }
    let leading = event.jets().next()?;
    cut.keep(&leading).then(|| jet_momentum(&leading))
}

/// 4-momentum of a lepton jet, in working units
fn jet_momentum(jet: &LeptonJet) -> FourMomentum {
    FourMomentum::from_pt_eta_phi_m(
        jet.pt * NATIVE_TO_WORKING,
        jet.eta,
        jet.phi,
        jet.m * NATIVE_TO_WORKING,
    )
}

/// Transverse decay length `sqrt(vx² + vy²)`
pub fn decay_length_transverse(vx: Float, vy: Float) -> Float {
    sqrt(vx.powi(2) + vy.powi(2))
}

/// 3D decay length `sqrt(vx² + vy² + vz²)`
pub fn decay_length_3d(vx: Float, vy: Float, vz: Float) -> Float {
    sqrt(vx.powi(2) + vy.powi(2) + vz.powi(2))
}

/// Proper decay length `L / |p| * m`, undefined when |p| is zero
pub fn proper_lifetime(decay_length_3d: Float, momentum: Float, mass: Float) -> Option<Float> {
    (momentum > 0.).then(|| decay_length_3d / momentum * mass)
}
