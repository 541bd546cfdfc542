//! Convergence tests for the adaptive mutation-run controller, driven by
//! synthetic per-tick costs.

use meiosis_sim::errors::Result;
use meiosis_sim::genome::Chromosome;
use meiosis_sim::runs::{MutationRunStorage, TuningPhase, INITIAL_STASIS_LIMIT};
use meiosis_sim::simulation::GeneticsConfig;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Storage stand-in that records every split and join.
#[derive(Debug)]
struct RecordingStorage {
    run_count: usize,
    changes: Vec<(usize, usize)>,
    tick: usize,
}

impl RecordingStorage {
    fn new(run_count: usize) -> Self {
        Self {
            run_count,
            changes: Vec::new(),
            tick: 0,
        }
    }

    fn changes_since(&self, tick: usize) -> usize {
        self.changes.iter().filter(|&&(t, _)| t >= tick).count()
    }
}

impl MutationRunStorage for RecordingStorage {
    fn split_runs(&mut self, new_count: usize) -> Result<()> {
        assert_eq!(new_count, self.run_count * 2);
        self.run_count = new_count;
        self.changes.push((self.tick, new_count));
        Ok(())
    }

    fn join_runs(&mut self, new_count: usize) -> Result<()> {
        assert_eq!(new_count * 2, self.run_count);
        self.run_count = new_count;
        self.changes.push((self.tick, new_count));
        Ok(())
    }
}

fn tunable_chromosome() -> Chromosome {
    GeneticsConfig::uniform(999_999, 1e-8, 1e-8)
        .build_chromosome()
        .unwrap()
}

fn run_ticks(
    chromosome: &mut Chromosome,
    storage: &mut RecordingStorage,
    ticks: usize,
    mut cost: impl FnMut(usize) -> f64,
) {
    for _ in 0..ticks {
        storage.tick += 1;
        let run_count = chromosome.mutation_run_layout().unwrap().run_count();
        chromosome.add_elapsed(cost(run_count));
        chromosome.finish_tick(true, storage).unwrap();
        assert_eq!(storage.run_count, chromosome.mutation_run_layout().unwrap().run_count());
    }
}

#[test]
fn constant_cost_settles_into_stasis() {
    init_tracing();
    let mut chromosome = tunable_chromosome();
    let mut storage = RecordingStorage::new(1);
    assert!(chromosome.tuning().unwrap().is_enabled());

    run_ticks(&mut chromosome, &mut storage, 40_000, |_| 1.0);

    let tuning = chromosome.tuning().unwrap();
    assert_eq!(tuning.phase(), TuningPhase::Stasis);
    // Repeated returns to the same count keep raising the bar
    assert!(tuning.stasis_limit() >= INITIAL_STASIS_LIMIT * 32);
    assert!(storage.changes_since(20_000) <= 4, "{:?}", storage.changes);

    let report = chromosome.experiment_report().unwrap();
    assert_eq!(report.modal_count, 1);
    assert!(report.modal_fraction > 0.95);
    assert_eq!(report.history_len, 40_000);
}

#[test]
fn noisy_cost_finds_the_optimum() {
    init_tracing();
    let mut chromosome = tunable_chromosome();
    let mut storage = RecordingStorage::new(1);

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(2025);
    let noise = Normal::new(0.0, 0.01).unwrap();
    // Cheapest at 8 runs, 0.1 worse per doubling or halving away from it
    let cost = |run_count: usize| {
        let distance = (run_count.ilog2() as f64 - 3.0).abs();
        1.0 + 0.1 * distance + noise.sample(&mut rng)
    };

    run_ticks(&mut chromosome, &mut storage, 20_000, cost);

    let report = chromosome.experiment_report().unwrap();
    assert_eq!(report.modal_count, 8);
    assert!(report.modal_fraction > 0.5, "{report:?}");

    let layout = chromosome.mutation_run_layout().unwrap();
    assert!(layout.run_count() as i64 * layout.run_length() > chromosome.last_position());
}

#[test]
fn inactive_chromosome_is_not_tuned() {
    let mut chromosome = tunable_chromosome();
    let mut storage = RecordingStorage::new(1);
    for _ in 0..500 {
        chromosome.begin_measurement();
        chromosome.end_measurement();
        assert!(!chromosome.finish_tick(false, &mut storage).unwrap());
    }
    assert!(storage.changes.is_empty());
    assert_eq!(chromosome.experiment_report().unwrap().history_len, 0);
}

#[test]
fn explicit_run_count_is_never_changed() {
    let mut config = GeneticsConfig::uniform(999_999, 1e-8, 1e-8);
    config.mutation_run_count = Some(16);
    let mut chromosome = config.build_chromosome().unwrap();
    let mut storage = RecordingStorage::new(16);

    run_ticks(&mut chromosome, &mut storage, 1_000, |n| n as f64);

    assert!(storage.changes.is_empty());
    assert_eq!(chromosome.tuning().unwrap().phase(), TuningPhase::Disabled);
}
