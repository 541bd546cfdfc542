//! Sampling of the genetic events applied when a gamete is produced.
//!
//! - **Mutation**: positions inside genomic elements, by hotspot-adjusted rate
//! - **Recombination**: crossover breakpoints, or double-strand breaks
//!   resolved into gene conversion tracts

pub mod mutation;
pub mod recombination;

pub use mutation::{MutationPosition, MutationPositionSampler};
pub use recombination::{
    BreakpointContext, BreakpointSampler, Breakpoints, GeneConversionParams,
    RecombinationCallback, RecombinationModel, MAX_DSB_ATTEMPTS,
};
