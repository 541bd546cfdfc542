//! Online tuning of the mutation-run count.
//!
//! Each experiment measures per-tick wall-clock time at one run count and is
//! compared against the previous experiment with a Welch's t-test. The
//! controller doubles or halves the count while that keeps paying off, then
//! settles into stasis, retesting the settled count periodically. Stasis
//! re-entered at a recently visited count raises the bar for leaving it
//! again, which damps oscillation between two near-equal configurations.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::base::Position;
use crate::errors::{GeneticsError, Result};

use super::layout::{MutationRunLayout, MAX_RUN_COUNT};
use super::stats::welch_t_test;

/// Samples per experiment.
pub const EXPERIMENT_LENGTH: usize = 50;
/// Samples after which a clearly worse experiment is cut short.
pub const EARLY_TERMINATION_SAMPLES: usize = 10;
pub const EARLY_TERMINATION_ALPHA: f64 = 0.01;
pub const TREND_ALPHA: f64 = 0.05;
pub const INITIAL_STASIS_LIMIT: usize = 5;
pub const INITIAL_STASIS_ALPHA: f64 = 0.01;

/// Physical mutation-run storage that follows layout changes.
pub trait MutationRunStorage {
    /// Split every run in two, leaving `new_count` runs.
    fn split_runs(&mut self, new_count: usize) -> Result<()>;

    /// Join adjacent runs pairwise, leaving `new_count` runs.
    fn join_runs(&mut self, new_count: usize) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TuningPhase {
    Disabled,
    FirstExperiment,
    TrendSearch,
    Stasis,
}

/// Why tuning is off for a chromosome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisabledReason {
    ExplicitRunCount,
    NoGenetics,
    ChromosomeTooShort,
}

/// Summary of the tuning history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    /// Most frequent run count, bucketed by power of two
    pub modal_count: usize,
    /// Fraction of recorded ticks spent at `modal_count`
    pub modal_fraction: f64,
    pub stasis_limit: usize,
    pub stasis_alpha: f64,
    pub phase: TuningPhase,
    pub history_len: usize,
}

/// Drives a [`MutationRunLayout`] from per-tick timing samples.
#[derive(Debug, Clone)]
pub struct AdaptiveTuningController {
    layout: MutationRunLayout,
    last_position: Position,
    phase: TuningPhase,
    disabled_reason: Option<DisabledReason>,

    current_count: usize,
    previous_count: usize,
    current_runtimes: Vec<f64>,
    previous_runtimes: Vec<f64>,

    stasis_counter: usize,
    stasis_limit: usize,
    stasis_alpha: f64,
    continuing_trend: bool,
    recent_stasis_counts: (usize, usize),

    history: Vec<usize>,

    measurement_start: Option<Instant>,
    tick_elapsed: f64,
}

impl AdaptiveTuningController {
    /// Take ownership of `layout` and decide whether tuning is possible.
    pub fn new(
        layout: MutationRunLayout,
        last_position: Position,
        has_genetics: bool,
        explicit_count: bool,
    ) -> Self {
        let disabled_reason = if explicit_count {
            Some(DisabledReason::ExplicitRunCount)
        } else if !has_genetics || layout.is_empty() {
            Some(DisabledReason::NoGenetics)
        } else if last_position + 1 < MAX_RUN_COUNT as Position {
            Some(DisabledReason::ChromosomeTooShort)
        } else {
            None
        };

        match disabled_reason {
            Some(DisabledReason::ExplicitRunCount) => {
                debug!(run_count = layout.run_count(), "explicit mutation run count; tuning off")
            }
            Some(reason) => warn!(?reason, last_position, "mutation run tuning disabled"),
            None => {}
        }

        Self {
            layout,
            last_position,
            phase: if disabled_reason.is_some() {
                TuningPhase::Disabled
            } else {
                TuningPhase::FirstExperiment
            },
            disabled_reason,
            current_count: layout.run_count(),
            previous_count: 0,
            current_runtimes: Vec::with_capacity(EXPERIMENT_LENGTH),
            previous_runtimes: Vec::with_capacity(EXPERIMENT_LENGTH),
            stasis_counter: 0,
            stasis_limit: INITIAL_STASIS_LIMIT,
            stasis_alpha: INITIAL_STASIS_ALPHA,
            continuing_trend: false,
            recent_stasis_counts: (0, 0),
            history: Vec::new(),
            measurement_start: None,
            tick_elapsed: 0.0,
        }
    }

    pub fn layout(&self) -> &MutationRunLayout {
        &self.layout
    }

    pub fn phase(&self) -> TuningPhase {
        self.phase
    }

    pub fn is_enabled(&self) -> bool {
        self.phase != TuningPhase::Disabled
    }

    pub fn disabled_reason(&self) -> Option<DisabledReason> {
        self.disabled_reason
    }

    /// Run count the current experiment is measuring.
    pub fn current_count(&self) -> usize {
        self.current_count
    }

    pub fn stasis_limit(&self) -> usize {
        self.stasis_limit
    }

    pub fn stasis_alpha(&self) -> f64 {
        self.stasis_alpha
    }

    /// Run count of every recorded tick, oldest first.
    pub fn history(&self) -> &[usize] {
        &self.history
    }

    pub fn begin_measurement(&mut self) {
        self.measurement_start = Some(Instant::now());
    }

    pub fn end_measurement(&mut self) {
        if let Some(start) = self.measurement_start.take() {
            self.tick_elapsed += start.elapsed().as_secs_f64();
        }
    }

    /// Add an externally measured duration to the current tick.
    pub fn add_elapsed(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds >= 0.0 {
            self.tick_elapsed += seconds;
        }
    }

    /// Close the current tick. When `active`, its accumulated time becomes an
    /// experiment sample, and any change of run count it triggers is applied
    /// to the layout and to `storage`. Returns `true` if the layout changed.
    pub fn finish_tick(
        &mut self,
        active: bool,
        storage: &mut dyn MutationRunStorage,
    ) -> Result<bool> {
        let elapsed = std::mem::take(&mut self.tick_elapsed);
        self.measurement_start = None;

        if !self.is_enabled() || !active {
            return Ok(false);
        }

        self.record_sample(elapsed);
        self.history.push(self.current_count);
        self.apply_layout(storage)
    }

    fn record_sample(&mut self, seconds: f64) {
        self.current_runtimes.push(seconds);

        let mut early_end = false;
        if self.current_runtimes.len() == EARLY_TERMINATION_SAMPLES
            && self.current_count != self.previous_count
            && !self.previous_runtimes.is_empty()
        {
            let test = welch_t_test(&self.current_runtimes, &self.previous_runtimes);
            early_end = test.is_significant(EARLY_TERMINATION_ALPHA) && test.mean_a > test.mean_b;
        }

        if early_end || self.current_runtimes.len() >= EXPERIMENT_LENGTH {
            self.conclude_experiment();
        }
    }

    fn conclude_experiment(&mut self) {
        if self.previous_runtimes.is_empty() {
            self.conclude_first_experiment();
        } else if self.current_count == self.previous_count {
            self.conclude_stasis_experiment();
        } else {
            self.conclude_trend_experiment();
        }
    }

    fn conclude_first_experiment(&mut self) {
        match self.trial_count(self.current_count) {
            Some(next) => {
                self.transition_against_current(next);
                self.phase = TuningPhase::TrendSearch;
            }
            None => {
                self.transition_against_current(self.current_count);
                self.enter_stasis();
            }
        }
    }

    fn conclude_stasis_experiment(&mut self) {
        // The first repeat refreshes the comparison baseline
        if self.stasis_counter <= 1 {
            self.transition_against_current(self.current_count);
            self.stasis_counter += 1;
            return;
        }

        let test = welch_t_test(&self.current_runtimes, &self.previous_runtimes);
        if !test.is_significant(self.stasis_alpha) && self.stasis_counter < self.stasis_limit {
            self.transition_against_current(self.current_count);
            self.stasis_counter += 1;
            return;
        }

        // Either the limit was reached or performance shifted: try a neighbor
        match self.trial_count(self.current_count) {
            Some(next) => {
                self.continuing_trend = false;
                self.transition_against_current(next);
                self.phase = TuningPhase::TrendSearch;
            }
            None => {
                self.transition_against_current(self.current_count);
                self.stasis_counter = 1;
            }
        }
    }

    fn conclude_trend_experiment(&mut self) {
        let test = welch_t_test(&self.current_runtimes, &self.previous_runtimes);
        let significant = test.is_significant(TREND_ALPHA);
        let current_better = test.mean_a < test.mean_b;
        let moving_up = self.current_count > self.previous_count;

        if current_better || (!significant && !moving_up) {
            let next = if moving_up {
                self.current_count * 2
            } else {
                self.current_count / 2
            };

            if self.in_bounds(next) {
                self.continuing_trend = true;
                self.transition_against_current(next);
            } else {
                self.transition_against_current(self.current_count);
                self.enter_stasis();
            }
        } else if self.continuing_trend {
            // The second point on this side was worse; go back
            self.transition_against_previous(self.previous_count);
            self.enter_stasis();
        } else {
            let mirror = if moving_up {
                self.previous_count / 2
            } else {
                self.previous_count * 2
            };

            if self.in_bounds(mirror) {
                self.continuing_trend = true;
                self.transition_against_previous(mirror);
            } else {
                self.transition_against_previous(self.previous_count);
                self.enter_stasis();
            }
        }
    }

    /// Neighbor to try from `count`: doubled if allowed, else halved.
    fn trial_count(&self, count: usize) -> Option<usize> {
        [count * 2, count / 2]
            .into_iter()
            .find(|&c| self.in_bounds(c))
    }

    fn in_bounds(&self, count: usize) -> bool {
        let base = self.layout.run_count_base();
        count >= base && count <= MAX_RUN_COUNT && count % base == 0
    }

    /// Start measuring `new_count` against the experiment just finished.
    fn transition_against_current(&mut self, new_count: usize) {
        self.previous_count = self.current_count;
        std::mem::swap(&mut self.previous_runtimes, &mut self.current_runtimes);
        self.current_runtimes.clear();
        self.current_count = new_count;
    }

    /// Start measuring `new_count` against the same baseline as before,
    /// discarding the experiment just finished.
    fn transition_against_previous(&mut self, new_count: usize) {
        self.current_runtimes.clear();
        self.current_count = new_count;
    }

    fn enter_stasis(&mut self) {
        let count = self.current_count;
        let (latest, earlier) = self.recent_stasis_counts;

        if count == latest || count == earlier {
            self.stasis_limit *= 2;
            self.stasis_alpha /= 2.0;
        } else {
            self.recent_stasis_counts = (count, latest);
        }

        self.stasis_counter = 1;
        self.continuing_trend = false;
        self.phase = TuningPhase::Stasis;

        info!(
            run_count = count,
            stasis_limit = self.stasis_limit,
            stasis_alpha = self.stasis_alpha,
            "mutation run experiment entered stasis"
        );
    }

    fn apply_layout(&mut self, storage: &mut dyn MutationRunStorage) -> Result<bool> {
        let target = self.current_count;
        let mut changed = false;

        while self.layout.run_count() < target {
            self.layout.split(self.last_position)?;
            storage.split_runs(self.layout.run_count())?;
            changed = true;
        }
        while self.layout.run_count() > target {
            self.layout.join(self.last_position)?;
            storage.join_runs(self.layout.run_count())?;
            changed = true;
        }

        if self.layout.run_count() != target {
            return Err(GeneticsError::internal(format!(
                "layout settled at {} runs instead of {target}",
                self.layout.run_count()
            )));
        }

        if changed {
            info!(
                run_count = self.layout.run_count(),
                run_length = self.layout.run_length(),
                "mutation run layout changed"
            );
        }
        Ok(changed)
    }

    pub fn report(&self) -> ExperimentReport {
        let mut buckets: Vec<(u32, usize, usize)> = Vec::new();
        for &count in &self.history {
            let bucket = count.max(1).ilog2();
            match buckets.iter_mut().find(|(b, _, _)| *b == bucket) {
                Some(entry) => entry.2 += 1,
                None => buckets.push((bucket, count, 1)),
            }
        }

        let (modal_count, modal_ticks) = buckets
            .iter()
            .max_by_key(|&&(bucket, _, ticks)| (ticks, std::cmp::Reverse(bucket)))
            .map(|&(_, count, ticks)| (count, ticks))
            .unwrap_or((self.layout.run_count(), 0));

        let modal_fraction = if self.history.is_empty() {
            0.0
        } else {
            modal_ticks as f64 / self.history.len() as f64
        };

        ExperimentReport {
            modal_count,
            modal_fraction,
            stasis_limit: self.stasis_limit,
            stasis_alpha: self.stasis_alpha,
            phase: self.phase,
            history_len: self.history.len(),
        }
    }
}
