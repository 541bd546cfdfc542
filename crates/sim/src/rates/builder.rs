//! Compiles rate schedules into sampling tables.
//!
//! Every rebuild constructs fresh maps from the full schedules; there is no
//! incremental update.

use tracing::debug;

use crate::base::{GenomicElement, Position};
use crate::errors::{GeneticsError, Result};

use super::lookup::WeightedLookupTable;
use super::map::{reparameterize, GenomicElementSubrange, MutationMap, RecombinationMap};
use super::schedule::{RateCategory, RateInterval, RateSchedule, SexSpecific};

/// Builds compiled maps for a chromosome whose last valid position is
/// `last_position`.
#[derive(Debug, Clone, Copy)]
pub struct RateMapBuilder {
    last_position: Position,
}

impl RateMapBuilder {
    pub fn new(last_position: Position) -> Self {
        Self { last_position }
    }

    pub fn last_position(&self) -> Position {
        self.last_position
    }

    /// Compile one recombination map from a schedule.
    pub fn recombination_map(&self, schedule: &RateSchedule) -> Result<RecombinationMap> {
        let intervals = schedule.resolve(RateCategory::Recombination, self.last_position)?;
        self.recombination_map_from_intervals(intervals)
    }

    fn recombination_map_from_intervals(
        &self,
        intervals: Vec<RateInterval>,
    ) -> Result<RecombinationMap> {
        let mut weights = Vec::with_capacity(intervals.len());
        let mut overall_rate = 0.0;
        let mut overall_rate_userlevel = 0.0;
        let mut previous_end: Position = 0;

        for interval in &intervals {
            // The first interval spans [1, end_0]; nothing precedes base 0
            let length = (interval.end_position - previous_end) as f64;
            let weight = reparameterize(interval.rate) * length;

            weights.push(weight);
            overall_rate += weight;
            overall_rate_userlevel += interval.rate * length;
            previous_end = interval.end_position;
        }

        let table = WeightedLookupTable::new(&weights)?;
        debug!(
            intervals = intervals.len(),
            overall_rate, overall_rate_userlevel, "rebuilt recombination lookup table"
        );

        Ok(RecombinationMap {
            intervals,
            table,
            overall_rate,
            exp_neg_overall_rate: (-overall_rate).exp(),
            overall_rate_userlevel,
        })
    }

    /// Compile recombination maps for one or both sexes.
    pub fn recombination_maps(
        &self,
        schedules: &SexSpecific<&RateSchedule>,
    ) -> Result<SexSpecific<RecombinationMap>> {
        schedules.try_map(|s| self.recombination_map(s))
    }

    /// Compile one mutation map, intersecting `elements` (sorted,
    /// non-overlapping) with the mutation schedule and the hotspot schedule.
    pub fn mutation_map(
        &self,
        elements: &[GenomicElement],
        mutation: &RateSchedule,
        hotspots: &RateSchedule,
    ) -> Result<MutationMap> {
        let mutation_intervals = mutation.resolve(RateCategory::Mutation, self.last_position)?;
        let hotspot_intervals = hotspots.resolve(RateCategory::Hotspot, self.last_position)?;
        let combined = combine_with_hotspots(&mutation_intervals, &hotspot_intervals)?;

        self.mutation_map_from_intervals(elements, &combined)
    }

    /// `intervals` must be resolved and must reach past the last element.
    fn mutation_map_from_intervals(
        &self,
        elements: &[GenomicElement],
        intervals: &[RateInterval],
    ) -> Result<MutationMap> {
        if let Some(last) = elements.last() {
            if last.end > self.last_position {
                return Err(GeneticsError::config(format!(
                    "genomic element ends at {} beyond the chromosome end {}",
                    last.end, self.last_position
                )));
            }
        }

        let mut subranges = Vec::new();
        let mut weights = Vec::new();
        let mut overall_rate = 0.0;
        let mut overall_rate_userlevel = 0.0;
        let mut rate_index = 0;

        for (element_index, element) in elements.iter().enumerate() {
            let mut start = element.start;

            loop {
                let interval = *intervals.get(rate_index).ok_or_else(|| {
                    GeneticsError::internal(format!(
                        "mutation intervals end before genomic element [{}, {}]",
                        element.start, element.end
                    ))
                })?;
                if interval.end_position < start {
                    rate_index += 1;
                    continue;
                }

                let end = element.end.min(interval.end_position);
                let length = (end - start + 1) as f64;
                let requested_weight = interval.rate * length;
                let adjusted_weight = reparameterize(interval.rate) * length;

                subranges.push(GenomicElementSubrange {
                    element_index,
                    start,
                    end,
                    requested_weight,
                    adjusted_weight,
                });
                weights.push(adjusted_weight);
                overall_rate += adjusted_weight;
                overall_rate_userlevel += requested_weight;

                if end == element.end {
                    break;
                }
                start = end + 1;
                rate_index += 1;
            }
        }

        let table = WeightedLookupTable::new(&weights)?;
        if table.len() != subranges.len() {
            return Err(GeneticsError::internal(
                "mutation lookup table size does not match its subranges",
            ));
        }
        debug!(
            elements = elements.len(),
            subranges = subranges.len(),
            overall_rate,
            overall_rate_userlevel,
            "rebuilt mutation lookup table"
        );

        Ok(MutationMap {
            subranges,
            table,
            overall_rate,
            exp_neg_overall_rate: (-overall_rate).exp(),
            overall_rate_userlevel,
        })
    }

    /// Compile mutation maps for one or both sexes. Either schedule may be
    /// sex-specific; a unisex one is applied to both sexes.
    pub fn mutation_maps(
        &self,
        elements: &[GenomicElement],
        mutation: &SexSpecific<&RateSchedule>,
        hotspots: &SexSpecific<&RateSchedule>,
    ) -> Result<SexSpecific<MutationMap>> {
        mutation.try_zip(hotspots, |m, h| self.mutation_map(elements, m, h))
    }
}

/// Merge a mutation interval list with a hotspot multiplier list, both
/// ending at the same last position, into one list of effective rates.
fn combine_with_hotspots(
    mutation: &[RateInterval],
    hotspots: &[RateInterval],
) -> Result<Vec<RateInterval>> {
    let mut combined = Vec::with_capacity(mutation.len() + hotspots.len());
    let (mut i, mut j) = (0, 0);

    while i < mutation.len() && j < hotspots.len() {
        let end = mutation[i].end_position.min(hotspots[j].end_position);
        let rate = mutation[i].rate * hotspots[j].rate;
        if !(rate < 1.0) {
            return Err(GeneticsError::config(format!(
                "mutation rate {} times hotspot multiplier {} ending at {end} is not below 1",
                mutation[i].rate, hotspots[j].rate
            )));
        }
        combined.push(RateInterval::new(end, rate));

        if mutation[i].end_position == end {
            i += 1;
        }
        if hotspots[j].end_position == end {
            j += 1;
        }
    }

    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_recombination_userlevel_rate() {
        let builder = RateMapBuilder::new(99);
        let map = builder.recombination_map(&RateSchedule::uniform(0.1)).unwrap();
        // 99 gaps between 100 bases
        assert_relative_eq!(map.overall_rate_userlevel(), 0.1 * 99.0, epsilon = 1e-12);
        assert_relative_eq!(
            map.overall_rate(),
            reparameterize(0.1) * 99.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            map.exp_neg_overall_rate(),
            (-map.overall_rate()).exp(),
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_recombination_weights_per_interval() {
        let builder = RateMapBuilder::new(100);
        let schedule = RateSchedule::new(vec![0.0, 0.5, 0.01], vec![10, 20, 100]);
        let map = builder.recombination_map(&schedule).unwrap();
        let expected = 0.5 * 10.0 + 0.01 * 80.0;
        assert_relative_eq!(map.overall_rate_userlevel(), expected, epsilon = 1e-12);
        assert_eq!(map.rate_at(5), Some(0.0));
        assert_eq!(map.rate_at(11), Some(0.5));
        assert_eq!(map.rate_at(20), Some(0.5));
        assert_eq!(map.rate_at(21), Some(0.01));
    }

    #[test]
    fn test_recombination_end_must_match_chromosome() {
        let builder = RateMapBuilder::new(100);
        let schedule = RateSchedule::new(vec![0.1], vec![90]);
        assert!(builder.recombination_map(&schedule).unwrap_err().is_configuration());
    }

    #[test]
    fn test_mutation_intersection() {
        let builder = RateMapBuilder::new(99);
        let elements = [GenomicElement::new(1, 0, 19), GenomicElement::new(2, 40, 79)];
        let mutation = RateSchedule::new(vec![1e-3, 2e-3], vec![49, 99]);
        let map = builder
            .mutation_map(&elements, &mutation, &RateSchedule::uniform(1.0))
            .unwrap();

        let spans: Vec<_> = map
            .subranges()
            .iter()
            .map(|s| (s.element_index, s.start, s.end))
            .collect();
        assert_eq!(spans, vec![(0, 0, 19), (1, 40, 49), (1, 50, 79)]);

        let expected = 1e-3 * 20.0 + 1e-3 * 10.0 + 2e-3 * 30.0;
        assert_relative_eq!(map.overall_rate_userlevel(), expected, epsilon = 1e-15);
        assert!(map.overall_rate() > map.overall_rate_userlevel());
        assert_eq!(map.covered_length(), 60);
    }

    #[test]
    fn test_hotspots_split_subranges() {
        let builder = RateMapBuilder::new(99);
        let elements = [GenomicElement::new(1, 0, 99)];
        let hotspots = RateSchedule::new(vec![1.0, 10.0, 1.0], vec![29, 39, 99]);
        let map = builder
            .mutation_map(&elements, &RateSchedule::uniform(1e-4), &hotspots)
            .unwrap();
        assert_eq!(map.subranges().len(), 3);
        assert_relative_eq!(
            map.overall_rate_userlevel(),
            1e-4 * 90.0 + 1e-3 * 10.0,
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_hotspot_cannot_push_rate_to_one() {
        let builder = RateMapBuilder::new(99);
        let elements = [GenomicElement::new(1, 0, 99)];
        let err = builder
            .mutation_map(&elements, &RateSchedule::uniform(0.2), &RateSchedule::uniform(5.0))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_element_beyond_chromosome_end() {
        let builder = RateMapBuilder::new(50);
        let elements = [GenomicElement::new(1, 0, 60)];
        assert!(builder
            .mutation_map(&elements, &RateSchedule::uniform(1e-4), &RateSchedule::uniform(1.0))
            .is_err());
    }

    #[test]
    fn test_no_elements_gives_empty_map() {
        let builder = RateMapBuilder::new(50);
        let map = builder
            .mutation_map(&[], &RateSchedule::uniform(1e-4), &RateSchedule::uniform(1.0))
            .unwrap();
        assert!(map.subranges().is_empty());
        assert_eq!(map.overall_rate(), 0.0);
    }

    #[test]
    fn test_short_mutation_intervals_are_an_error() {
        let builder = RateMapBuilder::new(99);
        let elements = [GenomicElement::new(1, 0, 99)];
        let err = builder
            .mutation_map_from_intervals(&elements, &[RateInterval::new(49, 1e-3)])
            .unwrap_err();
        assert!(matches!(err, GeneticsError::Internal(_)));

        // A schedule that stops short is caught before compiling
        let short = RateSchedule::new(vec![1e-3], vec![49]);
        assert!(builder
            .mutation_map(&elements, &short, &RateSchedule::uniform(1.0))
            .unwrap_err()
            .is_configuration());
    }
}
