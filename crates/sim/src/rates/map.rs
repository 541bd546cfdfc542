//! Compiled rate maps ready for sampling.

use crate::base::Position;
use crate::errors::Result;

use super::lookup::{IntervalSpans, WeightedIntervalSampler, WeightedLookupTable};
use super::schedule::RateInterval;

/// Convert a probability of at least one event into the Poisson mean that
/// yields it: `1 - exp(-λ) = r`.
///
/// Coincident events are later merged, so drawing `Poisson(λ)` events and
/// deduplicating reproduces the requested per-site probability.
#[inline]
pub fn reparameterize(rate: f64) -> f64 {
    -(-rate).ln_1p()
}

/// Breakpoint spans: interval 0 covers `[1, end_0]` since no breakpoint can
/// precede base 0; interval `i` covers `(end_{i-1}, end_i]`.
impl IntervalSpans for [RateInterval] {
    fn span_count(&self) -> usize {
        self.len()
    }

    #[inline]
    fn span(&self, index: usize) -> (Position, Position) {
        let first = if index == 0 {
            1
        } else {
            self[index - 1].end_position + 1
        };
        (first, self[index].end_position)
    }
}

/// A compiled recombination map for one sex (or both).
#[derive(Debug, Clone)]
pub struct RecombinationMap {
    pub(crate) intervals: Vec<RateInterval>,
    pub(crate) table: WeightedLookupTable,
    /// Sum of reparameterized weights; the Poisson mean for breakpoint counts
    pub(crate) overall_rate: f64,
    pub(crate) exp_neg_overall_rate: f64,
    /// Sum of requested weights, as reported to users
    pub(crate) overall_rate_userlevel: f64,
}

impl RecombinationMap {
    pub fn intervals(&self) -> &[RateInterval] {
        &self.intervals
    }

    pub fn overall_rate(&self) -> f64 {
        self.overall_rate
    }

    pub fn exp_neg_overall_rate(&self) -> f64 {
        self.exp_neg_overall_rate
    }

    pub fn overall_rate_userlevel(&self) -> f64 {
        self.overall_rate_userlevel
    }

    pub fn sampler(&self) -> Result<WeightedIntervalSampler<'_, [RateInterval]>> {
        WeightedIntervalSampler::new(&self.table, self.intervals.as_slice())
    }

    /// Rate of the interval that contains breakpoint `position`.
    pub fn rate_at(&self, position: Position) -> Option<f64> {
        let idx = self
            .intervals
            .partition_point(|interval| interval.end_position < position);
        self.intervals.get(idx).map(|interval| interval.rate)
    }
}

/// A maximal run of positions inside one genomic element and one
/// constant-rate mutation interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenomicElementSubrange {
    /// Index of the owning element in the chromosome's sorted element list
    pub element_index: usize,
    pub start: Position,
    pub end: Position,
    /// Requested rate times length
    pub requested_weight: f64,
    /// Reparameterized rate times length, used for sampling
    pub adjusted_weight: f64,
}

impl IntervalSpans for [GenomicElementSubrange] {
    fn span_count(&self) -> usize {
        self.len()
    }

    #[inline]
    fn span(&self, index: usize) -> (Position, Position) {
        (self[index].start, self[index].end)
    }
}

/// A compiled mutation map for one sex (or both).
#[derive(Debug, Clone)]
pub struct MutationMap {
    pub(crate) subranges: Vec<GenomicElementSubrange>,
    pub(crate) table: WeightedLookupTable,
    pub(crate) overall_rate: f64,
    pub(crate) exp_neg_overall_rate: f64,
    pub(crate) overall_rate_userlevel: f64,
}

impl MutationMap {
    pub fn subranges(&self) -> &[GenomicElementSubrange] {
        &self.subranges
    }

    pub fn overall_rate(&self) -> f64 {
        self.overall_rate
    }

    pub fn exp_neg_overall_rate(&self) -> f64 {
        self.exp_neg_overall_rate
    }

    pub fn overall_rate_userlevel(&self) -> f64 {
        self.overall_rate_userlevel
    }

    pub fn sampler(&self) -> Result<WeightedIntervalSampler<'_, [GenomicElementSubrange]>> {
        WeightedIntervalSampler::new(&self.table, self.subranges.as_slice())
    }

    /// Total number of positions covered by the subranges.
    pub fn covered_length(&self) -> Position {
        self.subranges.iter().map(|s| s.end - s.start + 1).sum()
    }
}
