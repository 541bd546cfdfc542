//! Batch drawing of per-gamete genetic events.

use rand::Rng;
use rayon::prelude::*;

use crate::base::{RandomContext, Sex};
use crate::errors::Result;
use crate::evolution::{BreakpointContext, Breakpoints, MutationPosition};
use crate::genome::Chromosome;

/// One gamete to be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameteRequest {
    pub sex: Sex,
    pub parent: Option<u64>,
    pub haplosome_pair: Option<(u64, u64)>,
}

impl GameteRequest {
    pub fn new(sex: Sex) -> Self {
        Self {
            sex,
            parent: None,
            haplosome_pair: None,
        }
    }

    fn context(&self) -> BreakpointContext {
        BreakpointContext {
            sex: self.sex,
            parent: self.parent,
            haplosome_pair: self.haplosome_pair,
        }
    }
}

/// Everything drawn for one gamete on one chromosome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameteEvents {
    pub breakpoints: Breakpoints,
    pub mutations: Vec<MutationPosition>,
}

/// Draw breakpoints and new mutations for one gamete, with counts drawn
/// from the chromosome's maps.
pub fn draw_gamete_events(
    chromosome: &Chromosome,
    request: &GameteRequest,
    ctx: &mut RandomContext,
) -> Result<GameteEvents> {
    let breakpoints = chromosome.draw_breakpoints(&request.context(), None, ctx, &mut [])?;
    let count = chromosome.draw_mutation_count(request.sex, ctx)?;
    let mutations = chromosome.draw_mutation_positions(request.sex, count, ctx)?;
    Ok(GameteEvents {
        breakpoints,
        mutations,
    })
}

/// Requests are split into at most this many chunks, one RNG stream each.
const MAX_WORKER_STREAMS: usize = 64;

/// Draw events for every request in parallel.
///
/// One base seed is taken from `ctx`. Requests are cut into contiguous
/// chunks and chunk `i` draws from worker stream `i` of that seed, so the
/// result depends only on `ctx` and not on how rayon schedules the work.
pub fn draw_gamete_events_parallel(
    chromosome: &Chromosome,
    requests: &[GameteRequest],
    ctx: &mut RandomContext,
) -> Result<Vec<GameteEvents>> {
    let base_seed: u64 = ctx.rng().random();
    let chunk_len = chunk_len(requests.len());

    let chunks: Vec<Vec<GameteEvents>> = requests
        .par_chunks(chunk_len)
        .enumerate()
        .map(|(index, chunk)| {
            let mut local = RandomContext::for_worker(base_seed, index);
            chunk
                .iter()
                .map(|request| draw_gamete_events(chromosome, request, &mut local))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<_>>()?;

    Ok(chunks.into_iter().flatten().collect())
}

fn chunk_len(requests: usize) -> usize {
    requests.div_ceil(MAX_WORKER_STREAMS).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::GeneticsConfig;

    #[test]
    fn test_parallel_matches_sequential() {
        let chromosome = GeneticsConfig::uniform(99_999, 1e-5, 1e-5)
            .build_chromosome()
            .unwrap();
        let requests = vec![GameteRequest::new(Sex::Hermaphrodite); 130];

        let mut ctx = RandomContext::seed_from_u64(2024);
        let parallel = draw_gamete_events_parallel(&chromosome, &requests, &mut ctx).unwrap();

        let mut ctx = RandomContext::seed_from_u64(2024);
        let base_seed: u64 = ctx.rng().random();
        let sequential: Vec<GameteEvents> = requests
            .chunks(chunk_len(requests.len()))
            .enumerate()
            .flat_map(|(index, chunk)| {
                let mut local = RandomContext::for_worker(base_seed, index);
                chunk
                    .iter()
                    .map(|request| draw_gamete_events(&chromosome, request, &mut local).unwrap())
                    .collect::<Vec<_>>()
            })
            .collect();

        assert_eq!(parallel, sequential);
        assert!(parallel.iter().any(|g| !g.mutations.is_empty()));
    }

    #[test]
    fn test_chunking_bounds_stream_count() {
        assert_eq!(chunk_len(0), 1);
        assert_eq!(chunk_len(10), 1);
        assert_eq!(chunk_len(64), 1);
        assert_eq!(chunk_len(65), 2);
        assert_eq!(10_000usize.div_ceil(chunk_len(10_000)), MAX_WORKER_STREAMS);
    }
}
