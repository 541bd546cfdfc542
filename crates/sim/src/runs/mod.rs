//! Mutation-run layout and its adaptive tuning.

mod experiment;
mod layout;
pub mod stats;

pub use experiment::{
    AdaptiveTuningController, DisabledReason, ExperimentReport, MutationRunStorage, TuningPhase,
    EARLY_TERMINATION_ALPHA, EARLY_TERMINATION_SAMPLES, EXPERIMENT_LENGTH, INITIAL_STASIS_ALPHA,
    INITIAL_STASIS_LIMIT, TREND_ALPHA,
};
pub use layout::{MutationRunLayout, MAX_RUN_COUNT};
