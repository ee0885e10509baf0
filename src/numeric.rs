//! Basic numerical concepts used throughout the program

#![allow(missing_docs)]

// Floating-point precision is configured here
#[cfg(feature = "f32")]
pub type Float = f32;
#[cfg(feature = "f32")]
pub use std::f32 as reals;
#[cfg(not(feature = "f32"))]
pub type Float = f64;
#[cfg(not(feature = "f32"))]
pub use std::f64 as reals;

/// Conversion factor from the native energy unit of the event tables (MeV) to
/// the working unit of the analysis (GeV). Also maps mm to m for lengths.
pub const NATIVE_TO_WORKING: Float = 0.001;

/// Mathematical functions
pub mod functions {
    use super::{reals::consts::PI, Float};

    /// Wrap an angle into the (-π, π] interval
    pub fn wrap_angle(mut phi: Float) -> Float {
        // Bring the angle into [-π, π) first, then flip the lower boundary
        phi = (phi + PI).rem_euclid(2. * PI) - PI;
        if phi <= -PI {
            phi + 2. * PI
        } else {
            phi
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{functions::*, reals::consts::PI, Float};

    #[test]
    fn wrap_angle_stays_in_half_open_interval() {
        for &phi in &[0., 1., -1., PI, -PI, 3. * PI, -3. * PI, 7.5, -7.5] {
            let wrapped = wrap_angle(phi);
            assert!(wrapped > -PI - 1e-12 && wrapped <= PI + 1e-12, "{phi} -> {wrapped}");
            let turns = (phi - wrapped) / (2. * PI);
            assert!((turns - turns.round()).abs() < 1e-9);
        }
    }

    #[test]
    fn wrap_angle_maps_minus_pi_to_pi() {
        assert!((wrap_angle(-PI) - PI).abs() < 1e-12);
    }

    #[test]
    fn wrap_angle_boundary_difference() {
        let dphi: Float = wrap_angle(3.13 - (-3.13));
        assert!((dphi.abs() - (2. * PI - 6.26)).abs() < 1e-9);
    }
}
