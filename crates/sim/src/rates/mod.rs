//! Rate schedules and their compiled sampling maps.
//!
//! - **Schedules**: user-facing `(end_position, rate)` lists per category,
//!   unisex or per sex
//! - **Lookup tables**: weighted index draws plus uniform positions inside
//!   the chosen interval
//! - **Maps**: compiled recombination maps and genomic-element-aware
//!   mutation maps, with reparameterized and user-level totals

mod builder;
mod lookup;
mod map;
mod schedule;

pub use builder::RateMapBuilder;
pub use lookup::{IntervalSpans, WeightedIntervalSampler, WeightedLookupTable};
pub use map::{reparameterize, GenomicElementSubrange, MutationMap, RecombinationMap};
pub use schedule::{RateCategory, RateInterval, RateSchedule, ScheduleSet, SexSpecific};
