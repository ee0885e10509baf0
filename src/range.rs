//! Histogram range discovery
//!
//! Some quantities (momenta, decay lengths, opening angles) have sample
//! dependent scales, so their histogram ranges are inferred from the data in a
//! first pass over the events. The raw values are kept around, the range is
//! computed once they have all been seen, and only then are bins fixed and
//! filled. This costs memory but avoids any rebinning.

use crate::numeric::Float;
use serde::{Deserialize, Serialize};

/// Where an inferred range starts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowerEdge {
    /// Always start at zero
    #[default]
    Zero,

    /// Start at the smallest observed value
    Observed,
}

/// How to infer a range from observed values
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangePolicy {
    /// Lower edge policy
    #[serde(default)]
    pub lower: LowerEdge,

    /// Headroom factor applied to the largest value, so that it does not land
    /// on the upper edge
    pub margin: Float,

    /// Range to use when nothing usable was observed
    pub fallback: (Float, Float),
}
//
impl RangePolicy {
    /// Policy starting at zero with the given margin and fallback range
    pub fn from_zero(margin: Float, fallback: (Float, Float)) -> Self {
        Self {
            lower: LowerEdge::Zero,
            margin,
            fallback,
        }
    }

    /// Compute a (min, max) range from a first-pass collection of values
    ///
    /// Non-finite values are ignored. If no finite value was observed, or if
    /// the inferred range would be empty (e.g. all values are zero), the
    /// fallback range is used instead.
    pub fn infer(&self, values: &[Float]) -> (Float, Float) {
        let mut finite = values.iter().copied().filter(|x| x.is_finite());
        let Some(first) = finite.next() else {
            return self.fallback;
        };
        let (min, max) = finite.fold((first, first), |(lo, hi), x| (lo.min(x), hi.max(x)));
        let lo = match self.lower {
            LowerEdge::Zero => 0.,
            LowerEdge::Observed => min,
        };
        let hi = max * self.margin;
        if hi > lo {
            (lo, hi)
        } else {
            self.fallback
        }
    }
}

/// Range of a histogram axis, either fixed up front or inferred from data
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RangeSpec {
    /// Range known before any event is read
    Fixed {
        /// Lower edge
        lo: Float,
        /// Upper edge
        hi: Float,
    },

    /// Range computed from a first pass over the data
    Inferred(RangePolicy),
}
//
impl RangeSpec {
    /// Truth that this range needs a first pass over the data
    pub fn needs_first_pass(&self) -> bool {
        matches!(self, Self::Inferred(_))
    }

    /// Resolve this range into concrete edges, given first-pass values
    pub fn resolve(&self, values: &[Float]) -> (Float, Float) {
        match *self {
            Self::Fixed { lo, hi } => (lo, hi),
            Self::Inferred(policy) => policy.infer(values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn margin_is_applied_to_the_maximum() {
        let values = [1., 2., 3., 100.];
        let zero = RangePolicy::from_zero(1.1, (0., 500.));
        let (lo, hi) = zero.infer(&values);
        assert_eq!(lo, 0.);
        assert!((hi - 110.).abs() < 1e-9);

        let observed = RangePolicy {
            lower: LowerEdge::Observed,
            ..zero
        };
        let (lo, hi) = observed.infer(&values);
        assert_eq!(lo, 1.);
        assert!((hi - 110.).abs() < 1e-9);
    }

    #[test]
    fn empty_input_uses_fallback() {
        let policy = RangePolicy::from_zero(1.2, (0., 1.));
        assert_eq!(policy.infer(&[]), (0., 1.));
        assert_eq!(policy.infer(&[Float::NAN]), (0., 1.));
    }

    #[test]
    fn degenerate_input_uses_fallback() {
        let policy = RangePolicy::from_zero(1.1, (0., 100.));
        assert_eq!(policy.infer(&[0., 0.]), (0., 100.));
        let observed = RangePolicy {
            lower: LowerEdge::Observed,
            ..policy
        };
        let (lo, hi) = observed.infer(&[5.]);
        assert_eq!(lo, 5.);
        assert!((hi - 5.5).abs() < 1e-9);
        let shrinking = RangePolicy {
            margin: 0.5,
            ..observed
        };
        assert_eq!(shrinking.infer(&[5.]), (0., 100.));
    }

    #[test]
    fn fixed_specs_ignore_data() {
        let spec = RangeSpec::Fixed { lo: -5., hi: 5. };
        assert!(!spec.needs_first_pass());
        assert_eq!(spec.resolve(&[100.]), (-5., 5.));
        let spec = RangeSpec::Inferred(RangePolicy::from_zero(1.1, (0., 1.)));
        assert!(spec.needs_first_pass());
    }

    #[test]
    fn specs_decode_from_toml() {
        #[derive(Deserialize)]
        struct Holder {
            range: RangeSpec,
        }
        let fixed: Holder = toml::from_str("range = { kind = \"fixed\", lo = 0.0, hi = 5.0 }").unwrap();
        assert_eq!(fixed.range, RangeSpec::Fixed { lo: 0., hi: 5. });
        let inferred: Holder = toml::from_str(
            "range = { kind = \"inferred\", lower = \"observed\", margin = 1.05, fallback = [0.0, 1.0] }",
        )
        .unwrap();
        assert_eq!(
            inferred.range,
            RangeSpec::Inferred(RangePolicy {
                lower: LowerEdge::Observed,
                margin: 1.05,
                fallback: (0., 1.),
            })
        );
    }
}
