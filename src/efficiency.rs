//! Ratio-of-counts performance curves (efficiencies, fake rates)
//!
//! A curve is built from a pair of histograms with identical binning: the
//! denominator counts every candidate, the numerator only those that pass some
//! test. The numerator can therefore never exceed the denominator, and bins
//! with an empty denominator have no defined ratio at all (which is not the
//! same as a zero ratio).

use crate::{
    histogram::{to_float, Binning, Hist1D, Labels},
    numeric::Float,
    Result,
};
use eyre::ensure;
use prefix_num_ops::real::*;
use serde::{Deserialize, Serialize};

/// Coverage of the reported interval, in standard deviations
const INTERVAL_SIGMAS: Float = 1.;

/// One bin of a performance curve
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatioPoint {
    /// Numerator count
    pub passed: u64,

    /// Denominator count
    pub total: u64,

    /// passed / total, undefined if total is zero
    pub ratio: Option<Float>,

    /// Wilson score interval around the ratio, if defined
    pub interval: Option<(Float, Float)>,
}
//
impl RatioPoint {
    /// Compute the ratio and its interval from raw counts
    pub fn new(passed: u64, total: u64) -> Self {
        if total == 0 {
            return Self {
                passed,
                total,
                ratio: None,
                interval: None,
            };
        }
        let n = to_float(total);
        let p = to_float(passed) / n;
        let z2 = INTERVAL_SIGMAS.powi(2);
        let denom = 1. + z2 / n;
        let center = (p + z2 / (2. * n)) / denom;
        let half_width = INTERVAL_SIGMAS * sqrt(p * (1. - p) / n + z2 / (4. * n * n)) / denom;
        Self {
            passed,
            total,
            ratio: Some(p),
            // Rounding must not push the ratio itself out of its interval
            interval: Some((
                (center - half_width).max(0.).min(p),
                (center + half_width).min(1.).max(p),
            )),
        }
    }
}

/// A finalized performance curve
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyCurve {
    /// Name under which the curve is stored
    pub name: String,

    /// Plot labels
    pub labels: Labels,

    /// Binning of the horizontal axis
    pub binning: Binning,

    /// Per-bin ratios
    pub points: Vec<RatioPoint>,
}
//
impl EfficiencyCurve {
    /// Divide a numerator histogram by a denominator histogram
    ///
    /// Both histograms must share the same binning, and the numerator must not
    /// exceed the denominator in any bin.
    pub fn divide(name: &str, labels: Labels, passed: &Hist1D, total: &Hist1D) -> Result<Self> {
        ensure!(
            passed.binning == total.binning,
            "Histograms {} and {} have different binnings",
            passed.name,
            total.name
        );
        let points = (passed.counts().iter().zip(total.counts()))
            .enumerate()
            .map(|(bin, (&p, &t))| {
                ensure!(
                    p <= t,
                    "Bin {bin} of {} has more entries ({p}) than bin {bin} of {} ({t})",
                    passed.name,
                    total.name
                );
                Ok(RatioPoint::new(p, t))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: name.to_owned(),
            labels,
            binning: total.binning,
            points,
        })
    }

    /// Defined points, as (bin center, ratio) pairs
    pub fn defined_points(&self) -> impl Iterator<Item = (Float, Float)> + '_ {
        (self.points.iter().enumerate())
            .filter_map(|(bin, point)| point.ratio.map(|r| (self.binning.center(bin), r)))
    }
}

/// Numerator/denominator pair accumulated along one kinematic axis
pub struct RatioAccumulator {
    name: String,
    labels: Labels,
    passed: Hist1D,
    total: Hist1D,
}
//
impl RatioAccumulator {
    /// Set up an empty pair of histograms
    pub fn new(name: &str, labels: Labels, binning: Binning) -> Self {
        Self {
            passed: Hist1D::new(&format!("{name}_num"), labels.clone(), binning),
            total: Hist1D::new(&format!("{name}_den"), labels.clone(), binning),
            name: name.to_owned(),
            labels,
        }
    }

    /// Record one candidate: it always enters the denominator, and enters the
    /// numerator only if it passed
    pub fn fill(&mut self, value: Float, passed: bool) {
        self.total.fill(value);
        if passed {
            self.passed.fill(value);
        }
    }

    /// Numerator histogram
    pub fn passed(&self) -> &Hist1D {
        &self.passed
    }

    /// Denominator histogram
    pub fn total(&self) -> &Hist1D {
        &self.total
    }

    /// Freeze both histograms and compute the curve
    pub fn finalize(mut self) -> Result<EfficiencyCurve> {
        self.passed.finalize(false);
        self.total.finalize(false);
        EfficiencyCurve::divide(&self.name, self.labels, &self.passed, &self.total)
    }
}
