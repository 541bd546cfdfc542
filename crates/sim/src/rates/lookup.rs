//! Weighted index tables and the interval sampler built on them.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

use crate::base::Position;
use crate::errors::{GeneticsError, Result};

/// A discrete distribution over interval indices, proportional to weight.
///
/// Built once from a weight vector and replaced wholesale when the weights
/// change. Tables whose weights are all zero are valid; they never yield an
/// index.
#[derive(Debug, Clone)]
pub struct WeightedLookupTable {
    index: Option<WeightedIndex<f64>>,
    len: usize,
    total_weight: f64,
}

impl WeightedLookupTable {
    pub fn new(weights: &[f64]) -> Result<Self> {
        if let Some((i, w)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !(w.is_finite() && **w >= 0.0))
        {
            return Err(GeneticsError::internal(format!(
                "lookup table weight {i} is {w}; weights must be finite and non-negative"
            )));
        }

        let total_weight: f64 = weights.iter().sum();
        let index = if total_weight > 0.0 {
            Some(WeightedIndex::new(weights).map_err(|e| {
                GeneticsError::internal(format!("failed to build lookup table: {e}"))
            })?)
        } else {
            None
        };

        Ok(Self {
            index,
            len: weights.len(),
            total_weight,
        })
    }

    /// Number of entries (including zero-weight ones).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Draw an index with probability proportional to its weight, or `None`
    /// when every weight is zero.
    #[inline]
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        self.index.as_ref().map(|idx| idx.sample(rng))
    }
}

/// Something that can report the inclusive span of positions eligible for
/// a draw inside interval `index`.
pub trait IntervalSpans {
    fn span_count(&self) -> usize;

    /// Inclusive `(first, last)` positions for interval `index`.
    fn span(&self, index: usize) -> (Position, Position);
}

/// Draws an interval by weight, then a uniform position inside it.
pub struct WeightedIntervalSampler<'a, S: IntervalSpans + ?Sized> {
    table: &'a WeightedLookupTable,
    spans: &'a S,
}

impl<'a, S: IntervalSpans + ?Sized> WeightedIntervalSampler<'a, S> {
    pub fn new(table: &'a WeightedLookupTable, spans: &'a S) -> Result<Self> {
        if table.len() != spans.span_count() {
            return Err(GeneticsError::internal(format!(
                "lookup table has {} entries for {} intervals",
                table.len(),
                spans.span_count()
            )));
        }
        Ok(Self { table, spans })
    }

    /// Returns `(interval index, position)`, or `None` if all weights are zero.
    #[inline]
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(usize, Position)> {
        let index = self.table.draw(rng)?;
        let (first, last) = self.spans.span(index);
        // Only zero-weight intervals can have empty spans, and those are never drawn
        let position = if first >= last {
            last
        } else {
            rng.random_range(first..=last)
        };
        Some((index, position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    struct Fixed(Vec<(Position, Position)>);

    impl IntervalSpans for Fixed {
        fn span_count(&self) -> usize {
            self.0.len()
        }
        fn span(&self, index: usize) -> (Position, Position) {
            self.0[index]
        }
    }

    #[test]
    fn test_zero_weights_never_drawn() {
        let table = WeightedLookupTable::new(&[0.0, 3.0, 0.0]).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        for _ in 0..1000 {
            assert_eq!(table.draw(&mut rng), Some(1));
        }
    }

    #[test]
    fn test_all_zero_table() {
        let table = WeightedLookupTable::new(&[0.0, 0.0]).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        assert_eq!(table.draw(&mut rng), None);
        assert_eq!(table.len(), 2);
        assert_eq!(table.total_weight(), 0.0);
    }

    #[test]
    fn test_invalid_weights_rejected() {
        assert!(WeightedLookupTable::new(&[1.0, -0.5]).is_err());
        assert!(WeightedLookupTable::new(&[f64::NAN]).is_err());
    }

    #[test]
    fn test_proportional_draws() {
        let table = WeightedLookupTable::new(&[1.0, 3.0]).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let trials = 40_000;
        let ones = (0..trials)
            .filter(|_| table.draw(&mut rng) == Some(1))
            .count();
        let frequency = ones as f64 / trials as f64;
        assert!((frequency - 0.75).abs() < 0.02, "frequency {frequency}");
    }

    #[test]
    fn test_sampler_positions_stay_in_span() {
        let table = WeightedLookupTable::new(&[1.0, 1.0]).unwrap();
        let spans = Fixed(vec![(1, 10), (11, 11)]);
        let sampler = WeightedIntervalSampler::new(&table, &spans).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        for _ in 0..1000 {
            let (index, position) = sampler.draw(&mut rng).unwrap();
            let (first, last) = spans.span(index);
            assert!((first..=last).contains(&position));
        }
    }

    #[test]
    fn test_sampler_size_mismatch() {
        let table = WeightedLookupTable::new(&[1.0]).unwrap();
        let spans = Fixed(vec![(1, 10), (11, 20)]);
        assert!(WeightedIntervalSampler::new(&table, &spans).is_err());
    }
}
