//! Histogram accumulators
//!
//! Accumulators count how many values fall in each bin of a fixed, uniform
//! binning. Values below the lower edge go to an underflow bucket, values at
//! or above the upper edge (and non-finite values) go to an overflow bucket,
//! so that every fill is accounted for somewhere. Once finalized, an
//! accumulator is frozen and any further fill is a bug.

use crate::numeric::Float;
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Convert a count to the working floating-point type
pub(crate) fn to_float(count: u64) -> Float {
    count.as_()
}

/// Sum of stored counts, which cannot overflow even if the store is corrupt
fn wide_sum(counts: &[u64]) -> u128 {
    counts.iter().map(|&c| u128::from(c)).sum()
}

/// Uniform binning of one axis
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredBinning")]
pub struct Binning {
    /// Number of regular bins
    pub bins: usize,

    /// Lower edge of the first bin
    pub lo: Float,

    /// Upper edge of the last bin
    pub hi: Float,
}

/// Binning as read back from a store, before validation
#[derive(Deserialize)]
struct StoredBinning {
    bins: usize,
    lo: Float,
    hi: Float,
}
//
impl TryFrom<StoredBinning> for Binning {
    type Error = String;

    fn try_from(StoredBinning { bins, lo, hi }: StoredBinning) -> Result<Self, String> {
        if bins == 0 {
            return Err("a binning needs at least one bin".to_owned());
        }
        if hi.partial_cmp(&lo) != Some(Ordering::Greater) {
            return Err(format!("bin range [{lo}, {hi}) is empty"));
        }
        Ok(Self { bins, lo, hi })
    }
}

/// Where a value lands on an axis
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// Below the lower edge
    Underflow,

    /// Inside regular bin N
    Bin(usize),

    /// At or above the upper edge, or not a number
    Overflow,
}
//
impl Binning {
    /// Set up a binning, checking that it makes sense
    pub fn new(bins: usize, lo: Float, hi: Float) -> Self {
        assert!(bins > 0, "A binning needs at least one bin");
        assert!(hi > lo, "Bin range [{lo}, {hi}) is empty");
        Self { bins, lo, hi }
    }

    /// Width of each bin
    pub fn width(&self) -> Float {
        (self.hi - self.lo) / self.bins as Float
    }

    /// Find the slot of a value
    pub fn find(&self, value: Float) -> Slot {
        if value.is_nan() || value >= self.hi {
            Slot::Overflow
        } else if value < self.lo {
            Slot::Underflow
        } else {
            // Rounding can push values right below hi into a nonexistent bin
            let idx = ((value - self.lo) / self.width()) as usize;
            Slot::Bin(idx.min(self.bins - 1))
        }
    }

    /// Lower edge of a bin
    pub fn low_edge(&self, bin: usize) -> Float {
        self.lo + bin as Float * self.width()
    }

    /// Upper edge of a bin
    pub fn up_edge(&self, bin: usize) -> Float {
        self.low_edge(bin + 1)
    }

    /// Center of a bin
    pub fn center(&self, bin: usize) -> Float {
        self.lo + (bin as Float + 0.5) * self.width()
    }
}

/// Axis titles of a plot
///
/// These are stored next to the data for downstream plotting tools. The
/// built-in PNG renderer draws no text.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Labels {
    /// Plot title
    pub title: String,

    /// Horizontal axis title
    pub x: String,

    /// Vertical axis title
    pub y: String,
}
//
impl Labels {
    /// Build a set of labels
    pub fn new(title: &str, x: &str, y: &str) -> Self {
        Self {
            title: title.to_owned(),
            x: x.to_owned(),
            y: y.to_owned(),
        }
    }
}

/// One-dimensional histogram
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredHist1D")]
pub struct Hist1D {
    /// Name under which the histogram is stored
    pub name: String,

    /// Plot labels
    pub labels: Labels,

    /// Binning of the horizontal axis
    pub binning: Binning,

    /// Per-bin counts
    counts: Vec<u64>,

    /// Values below the lower edge
    underflow: u64,

    /// Values at or above the upper edge, or not a number
    overflow: u64,

    /// Number of fill calls
    fills: u64,

    /// Truth that the histogram was finalized
    frozen: bool,
}
//
impl Hist1D {
    /// Create an empty histogram
    pub fn new(name: &str, labels: Labels, binning: Binning) -> Self {
        Self {
            name: name.to_owned(),
            labels,
            counts: vec![0; binning.bins],
            binning,
            underflow: 0,
            overflow: 0,
            fills: 0,
            frozen: false,
        }
    }

    /// Record one value
    pub fn fill(&mut self, value: Float) {
        assert!(!self.frozen, "Histogram {} was filled after finalization", self.name);
        self.fills += 1;
        match self.binning.find(value) {
            Slot::Underflow => self.underflow += 1,
            Slot::Bin(idx) => self.counts[idx] += 1,
            Slot::Overflow => self.overflow += 1,
        }
    }

    /// Per-bin counts
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Count of one bin
    pub fn count(&self, bin: usize) -> u64 {
        self.counts[bin]
    }

    /// Underflow bucket
    pub fn underflow(&self) -> u64 {
        self.underflow
    }

    /// Overflow bucket
    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    /// Number of fill calls
    pub fn fills(&self) -> u64 {
        self.fills
    }

    /// Sum of the regular bins
    pub fn integral(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Truth that the histogram was finalized
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Fold the overflow bucket into the last regular bin
    ///
    /// Long-tailed quantities are easier to read this way. Calling this again
    /// is harmless, since the overflow bucket is empty afterwards.
    pub fn merge_overflow(&mut self) {
        if self.overflow > 0 {
            let last = self.binning.bins - 1;
            self.counts[last] += self.overflow;
            self.overflow = 0;
        }
    }

    /// Finalize the histogram, optionally folding the overflow bucket first
    pub fn finalize(&mut self, merge_overflow: bool) {
        if merge_overflow {
            self.merge_overflow();
        }
        self.frozen = true;
    }

    /// Index of the most populated bin (first one in case of ties)
    pub fn max_bin(&self) -> Option<usize> {
        let max = *self.counts.iter().max()?;
        if max == 0 {
            return None;
        }
        self.counts.iter().position(|&c| c == max)
    }

    /// Mean of the in-range contents, using bin centers
    pub fn mean(&self) -> Option<Float> {
        let total = self.integral();
        if total == 0 {
            return None;
        }
        let weighted: Float = (self.counts.iter().enumerate())
            .map(|(bin, &count)| to_float(count) * self.binning.center(bin))
            .sum();
        Some(weighted / to_float(total))
    }

    /// Index of the last bin with a non-zero count
    pub fn last_filled_bin(&self) -> Option<usize> {
        self.counts.iter().rposition(|&c| c > 0)
    }

    /// Bin contents scaled to unit integral, or raw contents if empty
    pub fn normalized(&self) -> Vec<Float> {
        let total = self.integral();
        let scale: Float = if total > 0 { 1. / to_float(total) } else { 1. };
        self.counts.iter().map(|&c| to_float(c) * scale).collect()
    }
}

/// 1D histogram as read back from a store, before validation
#[derive(Deserialize)]
struct StoredHist1D {
    name: String,
    labels: Labels,
    binning: Binning,
    counts: Vec<u64>,
    underflow: u64,
    overflow: u64,
    fills: u64,
    frozen: bool,
}
//
impl TryFrom<StoredHist1D> for Hist1D {
    type Error = String;

    fn try_from(h: StoredHist1D) -> Result<Self, String> {
        if h.counts.len() != h.binning.bins {
            return Err(format!(
                "histogram {} has {} counts for {} bins",
                h.name,
                h.counts.len(),
                h.binning.bins
            ));
        }
        let accounted = wide_sum(&h.counts) + u128::from(h.underflow) + u128::from(h.overflow);
        if accounted != u128::from(h.fills) {
            return Err(format!(
                "histogram {} accounts for {accounted} of {} fills",
                h.name, h.fills
            ));
        }
        Ok(Self {
            name: h.name,
            labels: h.labels,
            binning: h.binning,
            counts: h.counts,
            underflow: h.underflow,
            overflow: h.overflow,
            fills: h.fills,
            frozen: h.frozen,
        })
    }
}

/// Two-dimensional histogram
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredHist2D")]
pub struct Hist2D {
    /// Name under which the histogram is stored
    pub name: String,

    /// Plot labels
    pub labels: Labels,

    /// Binning of the horizontal axis
    pub x_binning: Binning,

    /// Binning of the vertical axis
    pub y_binning: Binning,

    /// Per-bin counts, row-major (one row per y bin)
    counts: Vec<u64>,

    /// Values falling outside of either axis range
    outside: u64,

    /// Number of fill calls
    fills: u64,

    /// Truth that the histogram was finalized
    frozen: bool,
}
//
impl Hist2D {
    /// Create an empty histogram
    pub fn new(name: &str, labels: Labels, x_binning: Binning, y_binning: Binning) -> Self {
        Self {
            name: name.to_owned(),
            labels,
            counts: vec![0; x_binning.bins * y_binning.bins],
            x_binning,
            y_binning,
            outside: 0,
            fills: 0,
            frozen: false,
        }
    }

    /// Record one (x, y) pair
    pub fn fill(&mut self, x: Float, y: Float) {
        assert!(!self.frozen, "Histogram {} was filled after finalization", self.name);
        self.fills += 1;
        match (self.x_binning.find(x), self.y_binning.find(y)) {
            (Slot::Bin(ix), Slot::Bin(iy)) => self.counts[iy * self.x_binning.bins + ix] += 1,
            _ => self.outside += 1,
        }
    }

    /// Count of one bin
    pub fn count(&self, ix: usize, iy: usize) -> u64 {
        self.counts[iy * self.x_binning.bins + ix]
    }

    /// Largest bin count
    pub fn max_count(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Fills that fell outside of the axis ranges
    pub fn outside(&self) -> u64 {
        self.outside
    }

    /// Number of fill calls
    pub fn fills(&self) -> u64 {
        self.fills
    }

    /// Sum of the regular bins
    pub fn integral(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Truth that the histogram was finalized
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Freeze the histogram
    pub fn finalize(&mut self) {
        self.frozen = true;
    }
}

/// 2D histogram as read back from a store, before validation
#[derive(Deserialize)]
struct StoredHist2D {
    name: String,
    labels: Labels,
    x_binning: Binning,
    y_binning: Binning,
    counts: Vec<u64>,
    outside: u64,
    fills: u64,
    frozen: bool,
}
//
impl TryFrom<StoredHist2D> for Hist2D {
    type Error = String;

    fn try_from(h: StoredHist2D) -> Result<Self, String> {
        let expected = h.x_binning.bins * h.y_binning.bins;
        if h.counts.len() != expected {
            return Err(format!(
                "histogram {} has {} counts for {expected} bins",
                h.name,
                h.counts.len()
            ));
        }
        if wide_sum(&h.counts) + u128::from(h.outside) != u128::from(h.fills) {
            return Err(format!("histogram {} loses track of some fills", h.name));
        }
        Ok(Self {
            name: h.name,
            labels: h.labels,
            x_binning: h.x_binning,
            y_binning: h.y_binning,
            counts: h.counts,
            outside: h.outside,
            fills: h.fills,
            frozen: h.frozen,
        })
    }
}
