//! Serializable genetics configuration.
//!
//! A [`GeneticsConfig`] describes one chromosome completely and can be
//! deserialized from JSON to reproduce a setup exactly.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::base::{ChromosomeType, GenomicElement, Position, Sex};
use crate::errors::{GeneticsError, Result};
use crate::evolution::GeneConversionParams;
use crate::genome::Chromosome;
use crate::rates::{RateCategory, RateSchedule, ScheduleSet};

/// The genetic architecture of one chromosome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneticsConfig {
    #[serde(default = "default_id")]
    pub id: String,
    #[serde(default)]
    pub chromosome_type: ChromosomeType,
    /// Inferred from elements and schedules when absent
    #[serde(default)]
    pub last_position: Option<Position>,
    #[serde(default)]
    pub elements: Vec<GenomicElement>,
    #[serde(default)]
    pub mutation: ScheduleSet,
    #[serde(default)]
    pub recombination: ScheduleSet,
    /// Multipliers of the mutation rate; 1.0 everywhere when empty
    #[serde(default)]
    pub hotspots: ScheduleSet,
    /// Selects the DSB recombination model when present
    #[serde(default)]
    pub gene_conversion: Option<GeneConversionParams>,
    /// Fixes the mutation-run count and turns tuning off
    #[serde(default)]
    pub mutation_run_count: Option<usize>,
    #[serde(default = "default_thread_count")]
    pub thread_count: usize,
}

fn default_id() -> String {
    "1".to_string()
}

fn default_thread_count() -> usize {
    1
}

impl Default for GeneticsConfig {
    fn default() -> Self {
        Self {
            id: default_id(),
            chromosome_type: ChromosomeType::default(),
            last_position: None,
            elements: Vec::new(),
            mutation: ScheduleSet::default(),
            recombination: ScheduleSet::default(),
            hotspots: ScheduleSet::default(),
            gene_conversion: None,
            mutation_run_count: None,
            thread_count: default_thread_count(),
        }
    }
}

impl GeneticsConfig {
    /// A unisex chromosome with one element spanning `[0, last_position]`
    /// and uniform rates.
    pub fn uniform(last_position: Position, mutation_rate: f64, recombination_rate: f64) -> Self {
        Self {
            last_position: Some(last_position),
            elements: vec![GenomicElement::new(1, 0, last_position)],
            mutation: ScheduleSet {
                unisex: Some(RateSchedule::uniform(mutation_rate)),
                ..ScheduleSet::default()
            },
            recombination: ScheduleSet {
                unisex: Some(RateSchedule::uniform(recombination_rate)),
                ..ScheduleSet::default()
            },
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            GeneticsError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build and initialize the described chromosome.
    pub fn build_chromosome(&self) -> Result<Chromosome> {
        let mut chromosome =
            Chromosome::new(self.id.as_str(), self.chromosome_type, self.last_position);
        chromosome.set_genomic_elements(self.elements.clone())?;

        for (category, set) in [
            (RateCategory::Mutation, &self.mutation),
            (RateCategory::Recombination, &self.recombination),
            (RateCategory::Hotspot, &self.hotspots),
        ] {
            apply_schedule_set(&mut chromosome, category, set)?;
        }

        if let Some(params) = self.gene_conversion {
            chromosome.set_gene_conversion_parameters(params)?;
        }

        chromosome.initialize(self.thread_count, self.mutation_run_count)?;
        Ok(chromosome)
    }
}

fn apply_schedule_set(
    chromosome: &mut Chromosome,
    category: RateCategory,
    set: &ScheduleSet,
) -> Result<()> {
    for (sex, schedule) in [
        (Sex::Hermaphrodite, &set.unisex),
        (Sex::Male, &set.male),
        (Sex::Female, &set.female),
    ] {
        if let Some(schedule) = schedule {
            chromosome.set_rate_schedule(category, schedule.clone(), sex)?;
        }
    }
    Ok(())
}
