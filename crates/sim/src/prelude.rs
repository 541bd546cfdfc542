//! Commonly used imports for convenience.
//!
//! # Example
//!
//! ```
//! use meiosis_sim::prelude::*;
//!
//! let chromosome = GeneticsConfig::uniform(999, 1e-7, 1e-8)
//!     .build_chromosome()
//!     .unwrap();
//! let mut ctx = RandomContext::seed_from_u64(1);
//! let positions = chromosome
//!     .draw_mutation_positions(Sex::Hermaphrodite, 3, &mut ctx)
//!     .unwrap();
//! assert!(!positions.is_empty());
//! ```

pub use crate::base::{ChromosomeType, GenomicElement, Position, RandomContext, Sex};
pub use crate::errors::{self, GeneticsError};
pub use crate::evolution::{
    BreakpointContext, Breakpoints, GeneConversionParams, MutationPosition,
    RecombinationCallback, RecombinationModel,
};
pub use crate::genome::Chromosome;
pub use crate::rates::{RateCategory, RateSchedule, SexSpecific};
pub use crate::runs::{
    ExperimentReport, MutationRunLayout, MutationRunStorage, TuningPhase, MAX_RUN_COUNT,
};
pub use crate::simulation::{GameteEvents, GameteRequest, GeneticsConfig};
