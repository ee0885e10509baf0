//! This module implements some domain-specific 4-momentum handling logic.
//!
//! Collider analyses describe particles with (pt, η, φ) plus either an energy
//! or a mass, while the Lorentz algebra is easier to express in cartesian
//! coordinates. We store the cartesian form and derive the collider
//! coordinates on demand.

use crate::numeric::{functions::wrap_angle, Float};
use nalgebra::SVector;
use prefix_num_ops::real::*;
use serde::{Deserialize, Serialize};

/// 4-momentum dimension
pub const MOMENTUM_DIM: usize = 4;

/// Cartesian storage of a relativistic 4-momentum
pub type Momentum = SVector<Float, MOMENTUM_DIM>;

/// Convenience const for accessing the X coordinate of a 4-vector
pub const X: usize = 0;

/// Convenience const for accessing the Y coordinate of a 4-vector
pub const Y: usize = 1;

/// Convenience const for accessing the Z coordinate of a 4-vector
pub const Z: usize = 2;

/// Convenience const for accessing the E coordinate of a 4-vector
pub const E: usize = 3;

/// Which fourth coordinate accompanies (pt, η, φ) when building a momentum
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumConvention {
    /// (pt, η, φ, E)
    #[default]
    PtEtaPhiE,

    /// (pt, η, φ, m)
    PtEtaPhiM,
}

/// A physics object's 4-momentum, with collider coordinates cached
///
/// η and φ are kept as given rather than recomputed from the cartesian form,
/// so that zero-pt objects still have a well-defined direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FourMomentum {
    p: Momentum,
    eta: Float,
    phi: Float,
}
//
impl FourMomentum {
    /// Build from (pt, η, φ) and an energy or a mass, depending on convention
    pub fn new(
        convention: MomentumConvention,
        pt: Float,
        eta: Float,
        phi: Float,
        e_or_m: Float,
    ) -> Self {
        match convention {
            MomentumConvention::PtEtaPhiE => Self::from_pt_eta_phi_e(pt, eta, phi, e_or_m),
            MomentumConvention::PtEtaPhiM => Self::from_pt_eta_phi_m(pt, eta, phi, e_or_m),
        }
    }

    /// Build from transverse momentum, pseudorapidity, azimuth and energy
    ///
    /// Negative transverse momenta and energies are clamped to zero.
    pub fn from_pt_eta_phi_e(pt: Float, eta: Float, phi: Float, e: Float) -> Self {
        let pt = pt.max(0.);
        let p = Momentum::new(pt * phi.cos(), pt * phi.sin(), pt * eta.sinh(), e.max(0.));
        Self { p, eta, phi }
    }

    /// Build from transverse momentum, pseudorapidity, azimuth and mass
    ///
    /// Negative transverse momenta and masses are clamped to zero.
    pub fn from_pt_eta_phi_m(pt: Float, eta: Float, phi: Float, m: Float) -> Self {
        let pt = pt.max(0.);
        let pz = pt * eta.sinh();
        let e = sqrt(pt.powi(2) + pz.powi(2) + m.max(0.).powi(2));
        Self {
            p: Momentum::new(pt * phi.cos(), pt * phi.sin(), pz, e),
            eta,
            phi,
        }
    }

    /// Build a massless momentum, as used for decay products
    pub fn massless(pt: Float, eta: Float, phi: Float) -> Self {
        Self::from_pt_eta_phi_m(pt, eta, phi, 0.)
    }

    /// Transverse momentum
    pub fn pt(&self) -> Float {
        sqrt(self.p[X].powi(2) + self.p[Y].powi(2))
    }

    /// Pseudorapidity
    pub fn eta(&self) -> Float {
        self.eta
    }

    /// Azimuth, in (-π, π]
    pub fn phi(&self) -> Float {
        wrap_angle(self.phi)
    }

    /// Energy
    pub fn e(&self) -> Float {
        self.p[E]
    }

    /// Momentum magnitude |p|
    pub fn p(&self) -> Float {
        self.p.fixed_rows::<3>(X).norm()
    }

    /// Invariant mass
    ///
    /// Space-like 4-vectors (which can only arise from inconsistent inputs in
    /// the (pt, η, φ, E) convention) report a zero mass.
    pub fn m(&self) -> Float {
        let m2 = self.e().powi(2) - self.p().powi(2);
        if m2 > 0. {
            sqrt(m2)
        } else {
            0.
        }
    }

    /// Angular separation ΔR to another momentum
    pub fn delta_r(&self, other: &Self) -> Float {
        angular_separation(self, other)
    }
}

/// Azimuthal difference, wrapped to (-π, π]
pub fn delta_phi(phi_a: Float, phi_b: Float) -> Float {
    wrap_angle(phi_a - phi_b)
}

/// Angular distance in (η, φ) space: `sqrt(Δη² + Δφ²)`
pub fn angular_separation(a: &FourMomentum, b: &FourMomentum) -> Float {
    let d_eta = a.eta - b.eta;
    let d_phi = delta_phi(a.phi, b.phi);
    sqrt(d_eta.powi(2) + d_phi.powi(2))
}

/// Truth that at least one of `others` lies strictly within `radius` of
/// `candidate`. Stops at the first match.
pub fn is_matched<'a>(
    candidate: &FourMomentum,
    others: impl IntoIterator<Item = &'a FourMomentum>,
    radius: Float,
) -> bool {
    others
        .into_iter()
        .any(|other| angular_separation(candidate, other) < radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn close(a: Float, b: Float, tol: Float) -> bool {
        abs(a - b) <= tol
    }

    #[test]
    fn conventions_agree_on_kinematics() {
        let by_m = FourMomentum::from_pt_eta_phi_m(30., 0.5, 0.1, 0.4);
        let by_e = FourMomentum::from_pt_eta_phi_e(30., 0.5, 0.1, by_m.e());
        assert!(close(by_e.pt(), 30., 1e-9));
        assert!(close(by_e.m(), 0.4, 1e-6));
        assert!(close(by_m.p(), by_e.p(), 1e-9));
        let dispatched = FourMomentum::new(MomentumConvention::PtEtaPhiM, 30., 0.5, 0.1, 0.4);
        assert_eq!(dispatched, by_m);
    }

    #[test]
    fn negative_mass_is_clamped() {
        let p = FourMomentum::from_pt_eta_phi_m(10., 0., 0., -3.);
        assert!(close(p.m(), 0., 1e-9));
        assert!(p.e() >= 0.);
        let p = FourMomentum::from_pt_eta_phi_e(10., 0., 0., -3.);
        assert_eq!(p.e(), 0.);
        assert_eq!(p.m(), 0.);
    }

    #[test]
    fn separation_wraps_across_pi() {
        let a = FourMomentum::massless(5., 0., 3.13);
        let b = FourMomentum::massless(5., 0., -3.13);
        let dr = angular_separation(&a, &b);
        assert!(close(dr, 0.023185, 1e-5), "{dr}");
    }

    #[test]
    fn separation_is_symmetric_and_non_negative() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0xd4c7);
        for _ in 0..1000 {
            let a = FourMomentum::massless(
                rng.gen_range(0.0..100.),
                rng.gen_range(-4.0..4.),
                rng.gen_range(-10.0..10.),
            );
            let b = FourMomentum::massless(
                rng.gen_range(0.0..100.),
                rng.gen_range(-4.0..4.),
                rng.gen_range(-10.0..10.),
            );
            let ab = angular_separation(&a, &b);
            assert!(ab >= 0.);
            assert!(close(ab, angular_separation(&b, &a), 1e-12));
            assert_eq!(angular_separation(&a, &a), 0.);
        }
    }

    #[test]
    fn separation_zero_for_equivalent_azimuths() {
        let a = FourMomentum::massless(5., 1.2, 0.5);
        let b = FourMomentum::massless(5., 1.2, 0.5 + 2. * crate::numeric::reals::consts::PI);
        assert!(angular_separation(&a, &b) < 1e-12);
    }

    #[test]
    fn matching_scenario() {
        let truth = FourMomentum::from_pt_eta_phi_m(30., 0.5, 0.1, 0.4);
        let reco = FourMomentum::from_pt_eta_phi_m(28., 0.52, 0.12, 0.4);
        assert!(close(truth.delta_r(&reco), 0.028284, 1e-5));
        assert!(is_matched(&truth, [&reco], 0.4));
        assert!(!is_matched(&truth, [&reco], 0.02));
    }

    #[test]
    fn nothing_matches_an_empty_set() {
        let truth = FourMomentum::from_pt_eta_phi_m(30., 0.5, 0.1, 0.4);
        let nothing: [FourMomentum; 0] = [];
        for radius in [0., 0.4, 1e9] {
            assert!(!is_matched(&truth, &nothing, radius));
        }
    }

    #[test]
    fn daughters_opening_angle() {
        let d1 = FourMomentum::massless(5., 0., 0.);
        let d2 = FourMomentum::massless(5., 0., 0.05);
        assert!(close(d1.delta_r(&d2), 0.05, 1e-12));
    }
}
