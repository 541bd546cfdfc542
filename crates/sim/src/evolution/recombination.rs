//! Recombination breakpoint sampling.
//!
//! Two mutually exclusive models are supported, chosen once per chromosome:
//! simple crossover, and the double-strand-break (DSB) model in which each
//! break may resolve as a gene conversion tract with or without crossover.

use rand::Rng;
use rand_distr::{Distribution, Geometric};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::base::{Position, RandomContext, Sex};
use crate::errors::{GeneticsError, Result};
use crate::rates::RecombinationMap;

/// Attempts allowed to place a non-colliding set of DSB tracts.
pub const MAX_DSB_ATTEMPTS: usize = 100;

/// Parameters of the DSB / gene conversion model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneConversionParams {
    /// Fraction of breaks resolved without crossover
    pub non_crossover_fraction: f64,
    /// Mean total tract length; below 2 tracts have zero length
    pub mean_tract_length: f64,
    /// Fraction of tracts that are simple (no heteroduplex)
    pub simple_conversion_fraction: f64,
    /// GC bias applied downstream during mismatch repair
    #[serde(default)]
    pub gc_bias: f64,
    /// On a collision, redraw tract lengths too instead of only positions
    #[serde(default)]
    pub redraw_lengths_on_failure: bool,
}

impl GeneConversionParams {
    /// Create validated gene conversion parameters.
    ///
    /// # Errors
    /// Returns a configuration error if a fraction is outside [0, 1], the
    /// mean tract length is negative or not finite, or `gc_bias` is outside
    /// [-1, 1].
    pub fn new(
        non_crossover_fraction: f64,
        mean_tract_length: f64,
        simple_conversion_fraction: f64,
        gc_bias: f64,
        redraw_lengths_on_failure: bool,
    ) -> Result<Self> {
        let params = Self {
            non_crossover_fraction,
            mean_tract_length,
            simple_conversion_fraction,
            gc_bias,
            redraw_lengths_on_failure,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        let fraction_ok = |f: f64| (0.0..=1.0).contains(&f);
        if !fraction_ok(self.non_crossover_fraction) {
            return Err(GeneticsError::config(format!(
                "non-crossover fraction {} must be in [0, 1]",
                self.non_crossover_fraction
            )));
        }
        if !fraction_ok(self.simple_conversion_fraction) {
            return Err(GeneticsError::config(format!(
                "simple conversion fraction {} must be in [0, 1]",
                self.simple_conversion_fraction
            )));
        }
        if !(self.mean_tract_length >= 0.0 && self.mean_tract_length.is_finite()) {
            return Err(GeneticsError::config(format!(
                "mean gene conversion tract length {} must be finite and non-negative",
                self.mean_tract_length
            )));
        }
        if !(-1.0..=1.0).contains(&self.gc_bias) {
            return Err(GeneticsError::config(format!(
                "GC bias {} must be in [-1, 1]",
                self.gc_bias
            )));
        }
        Ok(())
    }
}

/// Which breakpoint algorithm a chromosome uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RecombinationModel {
    Crossover,
    DoubleStrandBreak(GeneConversionParams),
}

impl Default for RecombinationModel {
    fn default() -> Self {
        Self::Crossover
    }
}

/// Breakpoints drawn for one gamete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Breakpoints {
    /// Strictly ascending positions in `[1, last_position]`
    pub crossovers: Vec<Position>,
    /// Inclusive `(start, end)` heteroduplex regions from complex tracts
    pub heteroduplex: Vec<(Position, Position)>,
}

impl Breakpoints {
    pub fn is_empty(&self) -> bool {
        self.crossovers.is_empty() && self.heteroduplex.is_empty()
    }

    pub fn clear(&mut self) {
        self.crossovers.clear();
        self.heteroduplex.clear();
    }
}

/// Information passed to recombination callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointContext {
    pub sex: Sex,
    pub parent: Option<u64>,
    pub haplosome_pair: Option<(u64, u64)>,
}

impl BreakpointContext {
    pub fn new(sex: Sex) -> Self {
        Self {
            sex,
            parent: None,
            haplosome_pair: None,
        }
    }
}

/// A hook that may rewrite the breakpoint set of a gamete.
pub trait RecombinationCallback {
    /// Modify `breakpoints` in place; return `true` if anything changed.
    fn modify(&mut self, ctx: &BreakpointContext, breakpoints: &mut Vec<Position>) -> bool;
}

impl<F> RecombinationCallback for F
where
    F: FnMut(&BreakpointContext, &mut Vec<Position>) -> bool,
{
    fn modify(&mut self, ctx: &BreakpointContext, breakpoints: &mut Vec<Position>) -> bool {
        self(ctx, breakpoints)
    }
}

/// Why a DSB layout attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TractRejection {
    TouchesChromosomeEnd,
    OverlapsPreviousTract,
}

/// Draws recombination breakpoints on one chromosome.
#[derive(Debug, Clone, Copy)]
pub struct BreakpointSampler {
    model: RecombinationModel,
    last_position: Position,
}

impl BreakpointSampler {
    pub fn new(model: RecombinationModel, last_position: Position) -> Self {
        Self {
            model,
            last_position,
        }
    }

    pub fn model(&self) -> RecombinationModel {
        self.model
    }

    pub fn last_position(&self) -> Position {
        self.last_position
    }

    /// Draw `count` breakpoints with the configured model.
    pub fn draw(
        &self,
        map: &RecombinationMap,
        count: usize,
        ctx: &mut RandomContext,
    ) -> Result<Breakpoints> {
        let mut out = Breakpoints::default();
        match self.model {
            RecombinationModel::Crossover => {
                self.draw_crossover_breakpoints(map, count, ctx, &mut out.crossovers)?
            }
            RecombinationModel::DoubleStrandBreak(params) => {
                self.draw_dsb_breakpoints(map, &params, count, ctx, &mut out)?
            }
        }
        Ok(out)
    }

    /// Draw `count` crossover positions from `map`; `out` receives them
    /// sorted and unique.
    pub fn draw_crossover_breakpoints(
        &self,
        map: &RecombinationMap,
        count: usize,
        ctx: &mut RandomContext,
        out: &mut Vec<Position>,
    ) -> Result<()> {
        out.clear();
        if count == 0 {
            return Ok(());
        }

        let sampler = map.sampler()?;
        let rng = ctx.rng();

        match count {
            1 => {
                if let Some((_, position)) = sampler.draw(rng) {
                    out.push(position);
                }
            }
            2 => {
                if let (Some((_, a)), Some((_, b))) = (sampler.draw(rng), sampler.draw(rng)) {
                    if a < b {
                        out.extend([a, b]);
                    } else if b < a {
                        out.extend([b, a]);
                    } else {
                        out.push(a);
                    }
                }
            }
            _ => {
                out.reserve(count);
                for _ in 0..count {
                    match sampler.draw(rng) {
                        Some((_, position)) => out.push(position),
                        None => break,
                    }
                }
                out.sort_unstable();
                out.dedup();
            }
        }

        Ok(())
    }

    /// Draw `count` double-strand breaks and resolve them into crossover
    /// breakpoints and heteroduplex regions.
    ///
    /// # Errors
    /// Returns [`GeneticsError::RecombinationLayout`] if no layout without
    /// colliding tracts is found in [`MAX_DSB_ATTEMPTS`] attempts.
    pub fn draw_dsb_breakpoints(
        &self,
        map: &RecombinationMap,
        params: &GeneConversionParams,
        count: usize,
        ctx: &mut RandomContext,
        out: &mut Breakpoints,
    ) -> Result<()> {
        out.clear();
        if count == 0 {
            return Ok(());
        }

        let sampler = map.sampler()?;
        let geometric = if params.mean_tract_length >= 2.0 {
            Some(
                Geometric::new(2.0 / params.mean_tract_length).map_err(|e| {
                    GeneticsError::internal(format!("invalid tract length distribution: {e}"))
                })?,
            )
        } else {
            None
        };

        let (rng, scratch) = ctx.parts();
        let mut redraw_lengths = true;

        for attempt in 1..=MAX_DSB_ATTEMPTS {
            if redraw_lengths {
                scratch.extents.clear();
                for _ in 0..count {
                    let extents = match &geometric {
                        // Geometric counts failures; tract extents start at 1
                        Some(g) => (g.sample(rng) as Position + 1, g.sample(rng) as Position + 1),
                        None => (0, 0),
                    };
                    scratch.extents.push(extents);
                }
                redraw_lengths = false;
            }

            scratch.anchors.clear();
            for _ in 0..count {
                if let Some((index, position)) = sampler.draw(rng) {
                    // Breaks in rate-0.5 intervals are plain crossovers
                    let allows_conversion = map.intervals()[index].rate != 0.5;
                    scratch.anchors.push((position, allows_conversion));
                }
            }
            scratch.anchors.sort_unstable_by_key(|&(position, _)| position);
            scratch.anchors.dedup_by_key(|&mut (position, _)| position);

            scratch.flags.clear();
            for _ in 0..scratch.anchors.len() {
                let noncrossover = rng.random_bool(params.non_crossover_fraction);
                let simple = rng.random_bool(params.simple_conversion_fraction);
                scratch.flags.push((noncrossover, simple));
            }

            match self.lay_out_tracts(&scratch.anchors, &scratch.extents, &scratch.flags, out) {
                Ok(()) => return Ok(()),
                Err(reason) => {
                    out.clear();
                    if attempt == MAX_DSB_ATTEMPTS / 2 {
                        warn!(
                            attempt,
                            ?reason,
                            mean_tract_length = params.mean_tract_length,
                            "gene conversion tracts keep colliding"
                        );
                    }
                    if params.redraw_lengths_on_failure {
                        redraw_lengths = true;
                    }
                }
            }
        }

        Err(GeneticsError::RecombinationLayout {
            attempts: MAX_DSB_ATTEMPTS,
            mean_tract_length: params.mean_tract_length,
            message: "the recombination rate and/or mean gene conversion tract length are \
                      probably too high; lower them, or enable redrawing tract lengths on failure"
                .to_string(),
        })
    }

    /// Convert sorted unique anchors into breakpoints, rejecting layouts in
    /// which tracts collide with each other or with the chromosome ends.
    fn lay_out_tracts(
        &self,
        anchors: &[(Position, bool)],
        extents: &[(Position, Position)],
        flags: &[(bool, bool)],
        out: &mut Breakpoints,
    ) -> std::result::Result<(), TractRejection> {
        // Breakpoints are >= 1, so 0 means nothing placed yet
        let mut last_used: Position = 0;

        for (i, &(anchor, allows_conversion)) in anchors.iter().enumerate() {
            let (noncrossover, simple) = flags[i];
            let (left, right) = if allows_conversion { extents[i] } else { (0, 0) };

            if !allows_conversion || (left == 0 && right == 0) {
                if anchor <= last_used {
                    return Err(TractRejection::OverlapsPreviousTract);
                }
                // A zero-length noncrossover tract leaves no trace
                if !allows_conversion || !noncrossover {
                    out.crossovers.push(anchor);
                }
                last_used = anchor;
                continue;
            }

            let tract_start = anchor - left;
            let tract_end = anchor + right;

            if tract_start <= 0 || tract_end >= self.last_position {
                return Err(TractRejection::TouchesChromosomeEnd);
            }
            if tract_start <= last_used {
                return Err(TractRejection::OverlapsPreviousTract);
            }

            out.crossovers.push(tract_start);
            if noncrossover {
                // Switch back after the converted stretch
                out.crossovers.push(tract_end);
            }
            if !simple {
                out.heteroduplex.push((tract_start, tract_end - 1));
            }
            last_used = tract_end;
        }

        Ok(())
    }

    /// Run `callbacks` on the drawn breakpoints, re-normalize if any of them
    /// changed the set, and check the final invariants.
    pub fn apply_callbacks(
        &self,
        breakpoints: &mut Breakpoints,
        ctx: &BreakpointContext,
        callbacks: &mut [&mut dyn RecombinationCallback],
    ) -> Result<()> {
        let mut changed = false;
        for callback in callbacks.iter_mut() {
            changed |= callback.modify(ctx, &mut breakpoints.crossovers);
        }

        if changed {
            breakpoints.crossovers.sort_unstable();
            breakpoints.crossovers.dedup();

            let crossovers = &breakpoints.crossovers;
            breakpoints
                .heteroduplex
                .retain(|&(start, _)| crossovers.binary_search(&start).is_ok());

            if let Some(&bad) = crossovers
                .iter()
                .find(|&&p| p < 1 || p > self.last_position)
            {
                return Err(GeneticsError::config(format!(
                    "recombination callback produced breakpoint {bad} outside [1, {}]",
                    self.last_position
                )));
            }
        }

        self.check_breakpoints(&breakpoints.crossovers)
    }

    /// Breakpoints must be strictly ascending and within `[1, last_position]`.
    pub fn check_breakpoints(&self, breakpoints: &[Position]) -> Result<()> {
        if let Some(pair) = breakpoints.windows(2).find(|w| w[0] >= w[1]) {
            return Err(GeneticsError::internal(format!(
                "breakpoints not strictly ascending ({} then {})",
                pair[0], pair[1]
            )));
        }
        match (breakpoints.first(), breakpoints.last()) {
            (Some(&first), Some(&last)) if first < 1 || last > self.last_position => {
                Err(GeneticsError::internal(format!(
                    "breakpoints [{first}, {last}] fall outside [1, {}]",
                    self.last_position
                )))
            }
            _ => Ok(()),
        }
    }
}
