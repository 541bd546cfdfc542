//! Chunking of a chromosome's mutation storage into mutation runs.

use serde::{Deserialize, Serialize};

use crate::base::Position;
use crate::errors::{GeneticsError, Result};

/// Hard ceiling on the number of mutation runs per chromosome.
pub const MAX_RUN_COUNT: usize = 1024;

/// Run count and run length for one chromosome.
///
/// `run_count == run_count_base * run_count_multiplier` always holds, and so
/// does `run_count * run_length > last_position` for chromosomes carrying
/// genetics. Layouts without genetics are all zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MutationRunLayout {
    run_count: usize,
    run_length: Position,
    run_count_base: usize,
    run_count_multiplier: usize,
}

impl MutationRunLayout {
    /// The degenerate layout of a chromosome with no genomic elements.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Choose the starting layout.
    ///
    /// With `explicit_count`, the count is clipped to
    /// `[1, min(last_position + 1, MAX_RUN_COUNT)]` and must then be a
    /// multiple of `thread_count` or smaller than it. Otherwise the count
    /// starts at `min(thread_count, last_position + 1)` and the run length is
    /// rounded up to a multiple of [`MAX_RUN_COUNT`] so that later halving
    /// stays exact.
    pub fn choose_initial(
        last_position: Position,
        has_genetics: bool,
        thread_count: usize,
        explicit_count: Option<usize>,
    ) -> Result<Self> {
        if thread_count == 0 {
            return Err(GeneticsError::config("thread count must be at least 1"));
        }
        if !has_genetics {
            return Ok(Self::empty());
        }
        if last_position < 0 {
            return Err(GeneticsError::internal(format!(
                "chromosome last position {last_position} is negative"
            )));
        }

        let positions = last_position + 1;
        let max_count = usize::try_from(positions)
            .unwrap_or(usize::MAX)
            .min(MAX_RUN_COUNT);

        let layout = match explicit_count {
            Some(requested) => {
                let count = requested.clamp(1, max_count);
                if thread_count > 1 && count >= thread_count && count % thread_count != 0 {
                    return Err(GeneticsError::config(format!(
                        "mutation run count {count} must be a multiple of the thread count \
                         {thread_count}, or smaller than it"
                    )));
                }
                Self {
                    run_count: count,
                    run_length: div_ceil(positions, count as Position),
                    run_count_base: count,
                    run_count_multiplier: 1,
                }
            }
            None => {
                let base = thread_count.min(max_count);
                let length = div_ceil(positions, base as Position);
                let granule = MAX_RUN_COUNT as Position;
                Self {
                    run_count: base,
                    run_length: div_ceil(length, granule) * granule,
                    run_count_base: base,
                    run_count_multiplier: 1,
                }
            }
        };

        layout.check(last_position)?;
        Ok(layout)
    }

    pub fn run_count(&self) -> usize {
        self.run_count
    }

    pub fn run_length(&self) -> Position {
        self.run_length
    }

    pub fn run_count_base(&self) -> usize {
        self.run_count_base
    }

    pub fn run_count_multiplier(&self) -> usize {
        self.run_count_multiplier
    }

    pub fn is_empty(&self) -> bool {
        self.run_count == 0
    }

    /// Check the layout invariants against a chromosome ending at
    /// `last_position`.
    pub fn check(&self, last_position: Position) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        if self.run_count != self.run_count_base * self.run_count_multiplier {
            return Err(GeneticsError::internal(format!(
                "run count {} is not base {} times multiplier {}",
                self.run_count, self.run_count_base, self.run_count_multiplier
            )));
        }
        let covered = (self.run_count as Position).saturating_mul(self.run_length);
        if self.run_length < 1 || covered <= last_position {
            return Err(GeneticsError::internal(format!(
                "{} runs of length {} do not cover last position {last_position}",
                self.run_count, self.run_length
            )));
        }
        Ok(())
    }

    /// Double the run count, halving the run length.
    pub fn split(&mut self, last_position: Position) -> Result<()> {
        if self.run_length % 2 != 0 || self.run_count * 2 > MAX_RUN_COUNT {
            return Err(GeneticsError::internal(format!(
                "cannot split {} runs of length {}",
                self.run_count, self.run_length
            )));
        }
        self.run_count *= 2;
        self.run_count_multiplier *= 2;
        self.run_length /= 2;
        self.check(last_position)
    }

    /// Halve the run count, doubling the run length.
    pub fn join(&mut self, last_position: Position) -> Result<()> {
        if self.run_count_multiplier % 2 != 0 {
            return Err(GeneticsError::internal(format!(
                "cannot join {} runs at multiplier {}",
                self.run_count, self.run_count_multiplier
            )));
        }
        self.run_count /= 2;
        self.run_count_multiplier /= 2;
        self.run_length *= 2;
        self.check(last_position)
    }
}

#[inline]
fn div_ceil(numerator: Position, denominator: Position) -> Position {
    (numerator + denominator - 1) / denominator
}
