use std::sync::Arc;

use tracing::debug;

use crate::base::{
    draw_poisson, sort_and_check_elements, ChromosomeType, GenomicElement, Position,
    RandomContext, Sex, MAX_BASE_POSITION,
};
use crate::errors::{GeneticsError, Result};
use crate::evolution::{
    BreakpointContext, BreakpointSampler, Breakpoints, GeneConversionParams, MutationPosition,
    MutationPositionSampler, RecombinationCallback, RecombinationModel,
};
use crate::rates::{
    MutationMap, RateCategory, RateMapBuilder, RateSchedule, RecombinationMap, ScheduleSet,
    SexSpecific,
};
use crate::runs::{
    AdaptiveTuningController, ExperimentReport, MutationRunLayout, MutationRunStorage,
};

/// Compiled sampling maps, rebuilt wholesale whenever a schedule changes.
#[derive(Debug, Clone)]
struct CompiledMaps {
    recombination: SexSpecific<RecombinationMap>,
    mutation: SexSpecific<MutationMap>,
}

/// The genetic architecture of one chromosome.
///
/// A `Chromosome` collects genomic elements and rate schedules, compiles
/// them into sampling maps on [`Chromosome::initialize`], and then serves
/// the per-gamete draws of mutation positions and recombination
/// breakpoints. It also owns the mutation-run layout and the controller
/// that tunes it.
///
/// Draws take `&self` and an explicit [`RandomContext`], so one chromosome
/// can be shared by many sampling threads. Every mutator takes `&mut self`
/// and, once initialized, recompiles the affected maps before returning.
///
/// # Examples
///
/// ```rust
/// # use meiosis_sim::prelude::*;
/// let mut chr = Chromosome::new("1", ChromosomeType::Autosome, None);
/// chr.set_genomic_elements(vec![GenomicElement::new(1, 0, 99)]).unwrap();
/// let herm = Sex::Hermaphrodite;
/// chr.set_rate_schedule(RateCategory::Mutation, RateSchedule::uniform(1e-3), herm).unwrap();
/// chr.set_rate_schedule(RateCategory::Recombination, RateSchedule::uniform(0.1), herm).unwrap();
/// chr.initialize(1, None).unwrap();
///
/// assert_eq!(chr.last_position(), 99);
/// let rate = chr.overall_rate(RateCategory::Recombination, Sex::Hermaphrodite).unwrap();
/// assert!((rate - 0.1 * 99.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct Chromosome {
    id: Arc<str>,
    chromosome_type: ChromosomeType,
    declared_last_position: Option<Position>,
    last_position: Position,
    elements: Vec<GenomicElement>,

    mutation_schedules: ScheduleSet,
    recombination_schedules: ScheduleSet,
    hotspot_schedules: ScheduleSet,
    model: RecombinationModel,

    compiled: Option<CompiledMaps>,
    tuning: Option<AdaptiveTuningController>,
}

impl Chromosome {
    /// Create an uninitialized chromosome. Without `last_position`, the last
    /// position is inferred on initialization from the genomic elements and
    /// the explicit schedule end positions.
    pub fn new(
        id: impl Into<Arc<str>>,
        chromosome_type: ChromosomeType,
        last_position: Option<Position>,
    ) -> Self {
        Self {
            id: id.into(),
            chromosome_type,
            declared_last_position: last_position,
            last_position: last_position.unwrap_or(0),
            elements: Vec::new(),
            mutation_schedules: ScheduleSet::default(),
            recombination_schedules: ScheduleSet::default(),
            hotspot_schedules: ScheduleSet::default(),
            model: RecombinationModel::Crossover,
            compiled: None,
            tuning: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn chromosome_type(&self) -> ChromosomeType {
        self.chromosome_type
    }

    /// Last valid position; meaningful once initialized or when declared.
    pub fn last_position(&self) -> Position {
        self.last_position
    }

    /// Genomic elements, sorted by start once initialized.
    pub fn elements(&self) -> &[GenomicElement] {
        &self.elements
    }

    pub fn has_genetics(&self) -> bool {
        !self.elements.is_empty()
    }

    pub fn is_initialized(&self) -> bool {
        self.compiled.is_some()
    }

    pub fn recombination_model(&self) -> RecombinationModel {
        self.model
    }

    /// GC bias for downstream mismatch repair; 0 outside the DSB model.
    pub fn gc_bias(&self) -> f64 {
        match self.model {
            RecombinationModel::DoubleStrandBreak(params) => params.gc_bias,
            RecombinationModel::Crossover => 0.0,
        }
    }

    pub fn schedules(&self, category: RateCategory) -> &ScheduleSet {
        match category {
            RateCategory::Mutation => &self.mutation_schedules,
            RateCategory::Recombination => &self.recombination_schedules,
            RateCategory::Hotspot => &self.hotspot_schedules,
        }
    }

    fn schedules_mut(&mut self, category: RateCategory) -> &mut ScheduleSet {
        match category {
            RateCategory::Mutation => &mut self.mutation_schedules,
            RateCategory::Recombination => &mut self.recombination_schedules,
            RateCategory::Hotspot => &mut self.hotspot_schedules,
        }
    }

    /// Replace the genomic elements. Only allowed before initialization.
    pub fn set_genomic_elements(&mut self, elements: Vec<GenomicElement>) -> Result<()> {
        if self.is_initialized() {
            return Err(GeneticsError::config(format!(
                "genomic elements of chromosome {} cannot change after initialization",
                self.id
            )));
        }
        self.elements = elements;
        Ok(())
    }

    /// Set the schedule of `category` for `sex`
    /// ([`Sex::Hermaphrodite`] meaning both sexes).
    ///
    /// On an initialized chromosome the maps are rebuilt at once; if the
    /// rebuild fails the previous schedule is kept.
    pub fn set_rate_schedule(
        &mut self,
        category: RateCategory,
        schedule: RateSchedule,
        sex: Sex,
    ) -> Result<()> {
        let mut candidate = self.schedules(category).clone();
        candidate.set(category, sex, schedule)?;
        let previous = std::mem::replace(self.schedules_mut(category), candidate);

        if self.is_initialized() {
            if let Err(e) = self.rebuild_maps() {
                *self.schedules_mut(category) = previous;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Set hotspot multipliers, ending at `ends` (or covering the whole
    /// chromosome when `ends` is `None` and a single multiplier is given).
    pub fn set_hotspot_map(
        &mut self,
        multipliers: Vec<f64>,
        ends: Option<Vec<Position>>,
        sex: Sex,
    ) -> Result<()> {
        let schedule = RateSchedule {
            rates: multipliers,
            ends,
        };
        self.set_rate_schedule(RateCategory::Hotspot, schedule, sex)
    }

    /// Switch to the DSB model, or update its parameters.
    ///
    /// The model is fixed by initialization: a chromosome initialized with
    /// simple crossovers cannot switch to the DSB model later.
    pub fn set_gene_conversion_parameters(&mut self, params: GeneConversionParams) -> Result<()> {
        params.validate()?;
        if self.is_initialized() && self.model == RecombinationModel::Crossover {
            return Err(GeneticsError::config(format!(
                "chromosome {} was initialized without gene conversion; its recombination \
                 model cannot change",
                self.id
            )));
        }
        self.model = RecombinationModel::DoubleStrandBreak(params);
        Ok(())
    }

    /// Resolve the last position, compile every map and choose the initial
    /// mutation-run layout.
    pub fn initialize(
        &mut self,
        thread_count: usize,
        explicit_run_count: Option<usize>,
    ) -> Result<()> {
        sort_and_check_elements(&mut self.elements)?;

        let inferred = self
            .elements
            .iter()
            .map(|e| e.end)
            .chain(
                [
                    &self.mutation_schedules,
                    &self.recombination_schedules,
                    &self.hotspot_schedules,
                ]
                .into_iter()
                .filter_map(ScheduleSet::max_end),
            )
            .max()
            .unwrap_or(0);
        let last_position = self.declared_last_position.unwrap_or(inferred);

        if !(0..=MAX_BASE_POSITION).contains(&last_position) {
            return Err(GeneticsError::config(format!(
                "last position {last_position} of chromosome {} is outside [0, {MAX_BASE_POSITION}]",
                self.id
            )));
        }
        if let Some(last) = self.elements.last() {
            if last.end > last_position {
                return Err(GeneticsError::config(format!(
                    "genomic element ending at {} lies beyond the last position {last_position} \
                     of chromosome {}",
                    last.end, self.id
                )));
            }
        }
        self.last_position = last_position;

        self.rebuild_maps()?;

        let has_genetics = self.has_genetics();
        let layout = MutationRunLayout::choose_initial(
            last_position,
            has_genetics,
            thread_count,
            explicit_run_count,
        )?;
        self.tuning = Some(AdaptiveTuningController::new(
            layout,
            last_position,
            has_genetics,
            explicit_run_count.is_some(),
        ));

        debug!(
            id = %self.id,
            chromosome_type = %self.chromosome_type,
            last_position,
            run_count = layout.run_count(),
            run_length = layout.run_length(),
            "chromosome initialized"
        );
        Ok(())
    }

    fn rebuild_maps(&mut self) -> Result<()> {
        let builder = RateMapBuilder::new(self.last_position);

        let recombination_schedules = self
            .recombination_schedules
            .resolve(RateCategory::Recombination)?;
        let recombination = match recombination_schedules {
            Some(schedules) => builder.recombination_maps(&schedules)?,
            None if self.chromosome_type.info().defaults_to_zero_recombination => {
                SexSpecific::Unisex(builder.recombination_map(&RateSchedule::uniform(0.0))?)
            }
            None => {
                return Err(GeneticsError::config(format!(
                    "no recombination rate set for chromosome {} of type {}",
                    self.id, self.chromosome_type
                )))
            }
        };

        let zero_mutation = RateSchedule::uniform(0.0);
        let mutation = match self.mutation_schedules.resolve(RateCategory::Mutation)? {
            Some(schedules) => schedules,
            None if self.elements.is_empty() => SexSpecific::Unisex(&zero_mutation),
            None => {
                return Err(GeneticsError::config(format!(
                    "no mutation rate set for chromosome {}",
                    self.id
                )))
            }
        };

        let unit_hotspots = RateSchedule::uniform(1.0);
        let hotspots = self
            .hotspot_schedules
            .resolve(RateCategory::Hotspot)?
            .unwrap_or(SexSpecific::Unisex(&unit_hotspots));

        let mutation = builder.mutation_maps(&self.elements, &mutation, &hotspots)?;

        self.compiled = Some(CompiledMaps {
            recombination,
            mutation,
        });
        Ok(())
    }

    fn compiled(&self) -> Result<&CompiledMaps> {
        self.compiled.as_ref().ok_or_else(|| {
            GeneticsError::internal(format!("chromosome {} used before initialization", self.id))
        })
    }

    pub fn recombination_map(&self, sex: Sex) -> Result<&RecombinationMap> {
        self.compiled()?.recombination.get(sex)
    }

    pub fn mutation_map(&self, sex: Sex) -> Result<&MutationMap> {
        self.compiled()?.mutation.get(sex)
    }

    /// The user-facing (not reparameterized) overall rate of `category` for
    /// gametes produced by `sex`.
    pub fn overall_rate(&self, category: RateCategory, sex: Sex) -> Result<f64> {
        match category {
            RateCategory::Recombination => {
                Ok(self.recombination_map(sex)?.overall_rate_userlevel())
            }
            RateCategory::Mutation => Ok(self.mutation_map(sex)?.overall_rate_userlevel()),
            RateCategory::Hotspot => Err(GeneticsError::config(
                "hotspot multipliers have no overall rate",
            )),
        }
    }

    pub fn draw_mutation_count(&self, sex: Sex, ctx: &mut RandomContext) -> Result<usize> {
        let map = self.mutation_map(sex)?;
        draw_poisson(map.overall_rate(), map.exp_neg_overall_rate(), ctx.rng())
    }

    pub fn draw_breakpoint_count(&self, sex: Sex, ctx: &mut RandomContext) -> Result<usize> {
        if !self.chromosome_type.recombines_in(sex) {
            return Ok(0);
        }
        let map = self.recombination_map(sex)?;
        draw_poisson(map.overall_rate(), map.exp_neg_overall_rate(), ctx.rng())
    }

    /// Draw `count` mutation positions for a gamete produced by `sex`:
    /// sorted, unique, each tagged with its genomic element.
    pub fn draw_mutation_positions(
        &self,
        sex: Sex,
        count: usize,
        ctx: &mut RandomContext,
    ) -> Result<Vec<MutationPosition>> {
        MutationPositionSampler::new(self.mutation_map(sex)?).draw(count, ctx)
    }

    /// Draw recombination breakpoints for a gamete.
    ///
    /// With `count == None` the number of breaks is drawn from the
    /// recombination map. `callbacks` may rewrite the result. Chromosome
    /// types that do not recombine, and sex chromosomes in the sex that
    /// carries a single copy, always yield no breakpoints.
    pub fn draw_breakpoints(
        &self,
        info: &BreakpointContext,
        count: Option<usize>,
        ctx: &mut RandomContext,
        callbacks: &mut [&mut dyn RecombinationCallback],
    ) -> Result<Breakpoints> {
        if !self.chromosome_type.recombines_in(info.sex) {
            return Ok(Breakpoints::default());
        }

        let map = self.recombination_map(info.sex)?;
        let count = match count {
            Some(n) => n,
            None => draw_poisson(map.overall_rate(), map.exp_neg_overall_rate(), ctx.rng())?,
        };

        let sampler = BreakpointSampler::new(self.model, self.last_position);
        let mut breakpoints = sampler.draw(map, count, ctx)?;

        if callbacks.is_empty() {
            sampler.check_breakpoints(&breakpoints.crossovers)?;
        } else {
            sampler.apply_callbacks(&mut breakpoints, info, callbacks)?;
        }
        Ok(breakpoints)
    }

    pub fn mutation_run_layout(&self) -> Option<&MutationRunLayout> {
        self.tuning.as_ref().map(AdaptiveTuningController::layout)
    }

    pub fn tuning(&self) -> Option<&AdaptiveTuningController> {
        self.tuning.as_ref()
    }

    pub fn experiment_report(&self) -> Option<ExperimentReport> {
        self.tuning.as_ref().map(AdaptiveTuningController::report)
    }

    pub fn begin_measurement(&mut self) {
        if let Some(tuning) = &mut self.tuning {
            tuning.begin_measurement();
        }
    }

    pub fn end_measurement(&mut self) {
        if let Some(tuning) = &mut self.tuning {
            tuning.end_measurement();
        }
    }

    pub fn add_elapsed(&mut self, seconds: f64) {
        if let Some(tuning) = &mut self.tuning {
            tuning.add_elapsed(seconds);
        }
    }

    /// Close the tick; see [`AdaptiveTuningController::finish_tick`].
    pub fn finish_tick(
        &mut self,
        active: bool,
        storage: &mut dyn MutationRunStorage,
    ) -> Result<bool> {
        match &mut self.tuning {
            Some(tuning) => tuning.finish_tick(active, storage),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const HERM: Sex = Sex::Hermaphrodite;

    fn autosome(last: Option<Position>, mutation: f64, recombination: f64) -> Chromosome {
        let mut chr = Chromosome::new("1", ChromosomeType::Autosome, last);
        chr.set_genomic_elements(vec![GenomicElement::new(1, 0, 99)])
            .unwrap();
        chr.set_rate_schedule(RateCategory::Mutation, RateSchedule::uniform(mutation), HERM)
            .unwrap();
        chr.set_rate_schedule(
            RateCategory::Recombination,
            RateSchedule::uniform(recombination),
            HERM,
        )
        .unwrap();
        chr
    }

    #[test]
    fn test_draw_before_initialize_is_internal_error() {
        let chr = autosome(None, 1e-3, 0.1);
        let mut ctx = RandomContext::seed_from_u64(1);
        let err = chr.draw_mutation_positions(HERM, 1, &mut ctx).unwrap_err();
        assert!(matches!(err, GeneticsError::Internal(_)));
    }

    #[test]
    fn test_last_position_inferred_from_elements() {
        let mut chr = autosome(None, 1e-3, 0.1);
        chr.initialize(1, None).unwrap();
        assert_eq!(chr.last_position(), 99);
        assert!(chr.has_genetics());
    }

    #[test]
    fn test_missing_recombination_rate() {
        let mut chr = Chromosome::new("1", ChromosomeType::Autosome, Some(99));
        chr.set_genomic_elements(vec![GenomicElement::new(1, 0, 99)])
            .unwrap();
        chr.set_rate_schedule(RateCategory::Mutation, RateSchedule::uniform(1e-3), HERM)
            .unwrap();
        assert!(chr.initialize(1, None).unwrap_err().is_configuration());
    }

    #[test]
    fn test_haploid_defaults_to_no_recombination() {
        let mut chr = Chromosome::new("mt", ChromosomeType::HaploidFemaleInherited, Some(99));
        chr.set_genomic_elements(vec![GenomicElement::new(1, 0, 99)])
            .unwrap();
        chr.set_rate_schedule(RateCategory::Mutation, RateSchedule::uniform(1e-3), HERM)
            .unwrap();
        chr.initialize(1, None).unwrap();

        let mut ctx = RandomContext::seed_from_u64(4);
        let info = BreakpointContext::new(Sex::Female);
        let bp = chr.draw_breakpoints(&info, Some(5), &mut ctx, &mut []).unwrap();
        assert!(bp.is_empty());
        assert_eq!(chr.draw_breakpoint_count(Sex::Female, &mut ctx).unwrap(), 0);
    }

    #[test]
    fn test_x_chromosome_recombines_only_in_females() {
        let mut chr = Chromosome::new("X", ChromosomeType::X, Some(999));
        chr.set_genomic_elements(vec![GenomicElement::new(1, 0, 999)])
            .unwrap();
        chr.set_rate_schedule(RateCategory::Mutation, RateSchedule::uniform(1e-3), HERM)
            .unwrap();
        chr.set_rate_schedule(RateCategory::Recombination, RateSchedule::uniform(0.01), HERM)
            .unwrap();
        chr.initialize(1, None).unwrap();

        let mut ctx = RandomContext::seed_from_u64(6);
        let male = BreakpointContext::new(Sex::Male);
        let female = BreakpointContext::new(Sex::Female);
        for _ in 0..50 {
            assert!(chr.draw_breakpoints(&male, Some(3), &mut ctx, &mut []).unwrap().is_empty());
            assert_eq!(chr.draw_breakpoint_count(Sex::Male, &mut ctx).unwrap(), 0);
            assert!(!chr
                .draw_breakpoints(&female, Some(3), &mut ctx, &mut [])
                .unwrap()
                .is_empty());
        }
        // Mutation is unaffected
        assert!(chr.draw_mutation_count(Sex::Male, &mut ctx).is_ok());
    }

    #[test]
    fn test_schedule_change_rebuilds_maps() {
        let mut chr = autosome(None, 1e-3, 0.1);
        chr.initialize(1, None).unwrap();
        chr.set_rate_schedule(RateCategory::Recombination, RateSchedule::uniform(0.2), HERM)
            .unwrap();
        assert_relative_eq!(
            chr.overall_rate(RateCategory::Recombination, HERM).unwrap(),
            0.2 * 99.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_schedule() {
        let mut chr = autosome(None, 1e-3, 0.1);
        chr.initialize(1, None).unwrap();
        let bad = RateSchedule::new(vec![0.1], vec![50]);
        assert!(chr
            .set_rate_schedule(RateCategory::Recombination, bad, HERM)
            .is_err());
        assert_eq!(
            chr.schedules(RateCategory::Recombination).unisex,
            Some(RateSchedule::uniform(0.1))
        );
    }

    #[test]
    fn test_sex_specific_recombination() {
        let mut chr = Chromosome::new("1", ChromosomeType::Autosome, Some(99));
        chr.set_genomic_elements(vec![GenomicElement::new(1, 0, 99)])
            .unwrap();
        chr.set_rate_schedule(RateCategory::Mutation, RateSchedule::uniform(1e-3), HERM)
            .unwrap();
        chr.set_rate_schedule(RateCategory::Recombination, RateSchedule::uniform(0.0), Sex::Male)
            .unwrap();
        chr.set_rate_schedule(RateCategory::Recombination, RateSchedule::uniform(0.1), Sex::Female)
            .unwrap();
        chr.initialize(1, None).unwrap();

        assert_eq!(chr.overall_rate(RateCategory::Recombination, Sex::Male).unwrap(), 0.0);
        assert!(chr.overall_rate(RateCategory::Recombination, Sex::Female).unwrap() > 0.0);
        assert!(matches!(
            chr.overall_rate(RateCategory::Recombination, HERM),
            Err(GeneticsError::Internal(_))
        ));
        // Mutation stays unisex
        assert!(chr.overall_rate(RateCategory::Mutation, Sex::Male).unwrap() > 0.0);
    }

    #[test]
    fn test_gene_conversion_mode_fixed_after_initialize() {
        let params = GeneConversionParams::new(0.5, 10.0, 0.5, 0.1, false).unwrap();

        let mut chr = autosome(None, 1e-3, 0.01);
        chr.initialize(1, None).unwrap();
        assert!(chr.set_gene_conversion_parameters(params).unwrap_err().is_configuration());

        let mut chr = autosome(None, 1e-3, 0.01);
        chr.set_gene_conversion_parameters(params).unwrap();
        chr.initialize(1, None).unwrap();
        assert_relative_eq!(chr.gc_bias(), 0.1);

        let updated = GeneConversionParams::new(0.2, 4.0, 1.0, 0.0, true).unwrap();
        chr.set_gene_conversion_parameters(updated).unwrap();
        assert_eq!(
            chr.recombination_model(),
            RecombinationModel::DoubleStrandBreak(updated)
        );
    }

    #[test]
    fn test_explicit_run_count_disables_tuning() {
        let mut chr = autosome(Some(9_999), 1e-3, 0.1);
        chr.initialize(4, Some(8)).unwrap();
        assert_eq!(chr.mutation_run_layout().unwrap().run_count(), 8);
        assert!(!chr.tuning().unwrap().is_enabled());

        let mut chr = autosome(Some(9_999), 1e-3, 0.1);
        assert!(chr.initialize(4, Some(6)).unwrap_err().is_configuration());
    }

    #[test]
    fn test_hotspot_rate_has_no_overall_rate() {
        let mut chr = autosome(None, 1e-3, 0.1);
        chr.set_hotspot_map(vec![2.0], None, HERM).unwrap();
        chr.initialize(1, None).unwrap();
        assert_relative_eq!(
            chr.overall_rate(RateCategory::Mutation, HERM).unwrap(),
            2e-3 * 100.0,
            epsilon = 1e-12
        );
        assert!(chr.overall_rate(RateCategory::Hotspot, HERM).is_err());
    }
}
