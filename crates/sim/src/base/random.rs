//! Per-worker random state.
//!
//! Every sampling call takes a `RandomContext` explicitly. Each worker thread
//! owns one, so parallel sampling needs no shared mutable state.

use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson};
use rand_xoshiro::Xoshiro256PlusPlus;

use super::Position;
use crate::errors::{GeneticsError, Result};

/// Below this mean, Poisson draws use inversion seeded by the cached `exp(-λ)`.
const POISSON_INVERSION_LIMIT: f64 = 12.0;

/// Reusable buffers for the samplers, so hot-path draws do not reallocate.
#[derive(Debug, Default, Clone)]
pub struct SamplingScratch {
    /// DSB anchors with a flag telling whether gene conversion may occur there
    pub(crate) anchors: Vec<(Position, bool)>,
    /// Left/right tract extents, one pair per DSB
    pub(crate) extents: Vec<(Position, Position)>,
    /// (noncrossover, simple) flags, one pair per DSB
    pub(crate) flags: Vec<(bool, bool)>,
}

/// RNG handle plus scratch space for one worker.
#[derive(Debug, Clone)]
pub struct RandomContext {
    rng: Xoshiro256PlusPlus,
    pub(crate) scratch: SamplingScratch,
}

impl RandomContext {
    pub fn new(rng: Xoshiro256PlusPlus) -> Self {
        Self {
            rng,
            scratch: SamplingScratch::default(),
        }
    }

    pub fn seed_from_u64(seed: u64) -> Self {
        Self::new(Xoshiro256PlusPlus::seed_from_u64(seed))
    }

    /// A context for worker `index`, on a stream that does not overlap with
    /// the streams of other workers seeded from the same `base_seed`.
    pub fn for_worker(base_seed: u64, index: usize) -> Self {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(base_seed);
        for _ in 0..index {
            rng.jump();
        }
        Self::new(rng)
    }

    #[inline]
    pub fn rng(&mut self) -> &mut Xoshiro256PlusPlus {
        &mut self.rng
    }

    /// Split borrow of the generator and the scratch buffers.
    #[inline]
    pub(crate) fn parts(&mut self) -> (&mut Xoshiro256PlusPlus, &mut SamplingScratch) {
        (&mut self.rng, &mut self.scratch)
    }
}

/// Draw from Poisson(`lambda`), where `exp_neg_lambda` is the cached value of
/// `exp(-lambda)`.
///
/// # Errors
/// Returns [`GeneticsError::Internal`] when `lambda` is negative or not
/// finite. Compiled maps never hold such totals.
pub fn draw_poisson<R: Rng + ?Sized>(
    lambda: f64,
    exp_neg_lambda: f64,
    rng: &mut R,
) -> Result<usize> {
    if !(lambda >= 0.0 && lambda.is_finite()) {
        return Err(GeneticsError::internal(format!(
            "Poisson mean {lambda} is not a finite non-negative number"
        )));
    }
    if lambda == 0.0 {
        return Ok(0);
    }

    if lambda < POISSON_INVERSION_LIMIT {
        let u: f64 = rng.random();
        let mut k = 0usize;
        let mut p = exp_neg_lambda;
        let mut cdf = p;
        while u > cdf {
            k += 1;
            p *= lambda / k as f64;
            if p <= cdf * f64::EPSILON {
                break;
            }
            cdf += p;
        }
        return Ok(k);
    }

    let dist = Poisson::new(lambda)
        .map_err(|e| GeneticsError::internal(format!("Poisson mean {lambda}: {e}")))?;
    Ok(dist.sample(rng) as usize)
}
