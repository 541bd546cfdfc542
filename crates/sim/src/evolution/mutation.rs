//! Mutation position sampling.
//!
//! Positions are drawn only inside genomic elements, weighted by the
//! hotspot-adjusted mutation rate of each subrange, and returned in
//! ascending order with duplicates merged.

use crate::base::{Position, RandomContext};
use crate::errors::Result;
use crate::rates::MutationMap;

/// A drawn mutation site and the genomic element it falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MutationPosition {
    pub position: Position,
    pub element_index: usize,
}

/// Draws mutation positions from a compiled [`MutationMap`].
#[derive(Debug, Clone, Copy)]
pub struct MutationPositionSampler<'a> {
    map: &'a MutationMap,
}

impl<'a> MutationPositionSampler<'a> {
    pub fn new(map: &'a MutationMap) -> Self {
        Self { map }
    }

    /// Draw `count` positions into `out`, sorted and unique.
    ///
    /// Maps with no subranges or zero total weight yield nothing.
    pub fn draw_into(
        &self,
        count: usize,
        ctx: &mut RandomContext,
        out: &mut Vec<MutationPosition>,
    ) -> Result<()> {
        out.clear();
        if count == 0 || self.map.subranges().is_empty() {
            return Ok(());
        }

        let sampler = self.map.sampler()?;
        let rng = ctx.rng();
        let mut draw = || {
            sampler.draw(&mut *rng).map(|(index, position)| MutationPosition {
                position,
                element_index: self.map.subranges()[index].element_index,
            })
        };

        match count {
            1 => out.extend(draw()),
            2 => {
                if let (Some(a), Some(b)) = (draw(), draw()) {
                    match a.position.cmp(&b.position) {
                        std::cmp::Ordering::Less => out.extend([a, b]),
                        std::cmp::Ordering::Greater => out.extend([b, a]),
                        std::cmp::Ordering::Equal => out.push(a),
                    }
                }
            }
            _ => {
                out.reserve(count);
                for _ in 0..count {
                    match draw() {
                        Some(m) => out.push(m),
                        None => break,
                    }
                }
                out.sort_unstable_by_key(|m| m.position);
                out.dedup_by_key(|m| m.position);
            }
        }

        Ok(())
    }

    pub fn draw(&self, count: usize, ctx: &mut RandomContext) -> Result<Vec<MutationPosition>> {
        let mut out = Vec::with_capacity(count);
        self.draw_into(count, ctx, &mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::GenomicElement;
    use crate::rates::{RateMapBuilder, RateSchedule};

    fn map_for(elements: &[GenomicElement], rate: f64, last: Position) -> MutationMap {
        RateMapBuilder::new(last)
            .mutation_map(elements, &RateSchedule::uniform(rate), &RateSchedule::uniform(1.0))
            .unwrap()
    }

    #[test]
    fn test_positions_inside_elements() {
        let elements = [GenomicElement::new(1, 10, 19), GenomicElement::new(2, 50, 54)];
        let map = map_for(&elements, 1e-3, 99);
        let sampler = MutationPositionSampler::new(&map);
        let mut ctx = RandomContext::seed_from_u64(42);

        for count in 1..30 {
            let positions = sampler.draw(count, &mut ctx).unwrap();
            assert!(!positions.is_empty());
            assert!(positions.windows(2).all(|w| w[0].position < w[1].position));
            for m in &positions {
                assert!(elements[m.element_index].contains(m.position));
            }
        }
    }

    #[test]
    fn test_zero_rate_yields_nothing() {
        let elements = [GenomicElement::new(1, 0, 99)];
        let map = map_for(&elements, 0.0, 99);
        let mut ctx = RandomContext::seed_from_u64(1);
        assert!(MutationPositionSampler::new(&map)
            .draw(5, &mut ctx)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_no_elements_yields_nothing() {
        let map = map_for(&[], 1e-3, 99);
        let mut ctx = RandomContext::seed_from_u64(1);
        assert!(MutationPositionSampler::new(&map)
            .draw(3, &mut ctx)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_single_site_element_merges_duplicates() {
        let elements = [GenomicElement::new(7, 5, 5)];
        let map = map_for(&elements, 1e-2, 9);
        let mut ctx = RandomContext::seed_from_u64(3);
        let positions = MutationPositionSampler::new(&map).draw(10, &mut ctx).unwrap();
        assert_eq!(
            positions,
            vec![MutationPosition {
                position: 5,
                element_index: 0
            }]
        );
    }

    #[test]
    fn test_hotspot_concentrates_draws() {
        let elements = [GenomicElement::new(1, 0, 99)];
        let hotspots = RateSchedule::new(vec![1.0, 100.0, 1.0], vec![49, 59, 99]);
        let map = RateMapBuilder::new(99)
            .mutation_map(&elements, &RateSchedule::uniform(1e-5), &hotspots)
            .unwrap();
        let sampler = MutationPositionSampler::new(&map);
        let mut ctx = RandomContext::seed_from_u64(8);

        let trials = 5000;
        let in_hotspot = (0..trials)
            .filter(|_| {
                let p = sampler.draw(1, &mut ctx).unwrap()[0].position;
                (50..=59).contains(&p)
            })
            .count();
        // 10 * 100 / (90 + 10 * 100) of the weight sits in the hotspot
        let frequency = in_hotspot as f64 / trials as f64;
        assert!(frequency > 0.88, "hotspot frequency {frequency}");
    }
}
