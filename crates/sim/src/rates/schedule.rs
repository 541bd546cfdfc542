//! Raw rate schedules as supplied by the user, and their per-sex storage.

use serde::{Deserialize, Serialize};

use crate::base::{Position, Sex, MAX_BASE_POSITION};
use crate::errors::{GeneticsError, Result};

/// Which kind of schedule a rate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateCategory {
    Mutation,
    Recombination,
    Hotspot,
}

impl RateCategory {
    /// Check one rate against the domain of this category.
    pub fn validate_rate(self, rate: f64) -> Result<()> {
        let ok = match self {
            // -ln(1 - r) diverges at r = 1
            Self::Mutation => (0.0..1.0).contains(&rate),
            Self::Recombination => (0.0..=0.5).contains(&rate),
            Self::Hotspot => rate >= 0.0 && rate.is_finite(),
        };
        if ok {
            Ok(())
        } else {
            let domain = match self {
                Self::Mutation => "[0, 1)",
                Self::Recombination => "[0, 0.5]",
                Self::Hotspot => "[0, inf)",
            };
            Err(GeneticsError::config(format!(
                "{self:?} rate {rate} is outside the valid range {domain}"
            )))
        }
    }
}

/// One constant-rate interval; covers `(previous end, end_position]`,
/// or `[0, end_position]` for the first interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateInterval {
    pub end_position: Position,
    pub rate: f64,
}

impl RateInterval {
    pub fn new(end_position: Position, rate: f64) -> Self {
        Self { end_position, rate }
    }
}

/// A user-supplied rate schedule.
///
/// With `ends == None` the schedule holds a single rate covering the whole
/// chromosome; the end position is filled in by [`RateSchedule::resolve`]
/// once the chromosome length is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSchedule {
    pub rates: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends: Option<Vec<Position>>,
}

impl RateSchedule {
    /// A single rate over the whole chromosome.
    pub fn uniform(rate: f64) -> Self {
        Self {
            rates: vec![rate],
            ends: None,
        }
    }

    pub fn new(rates: Vec<f64>, ends: Vec<Position>) -> Self {
        Self {
            rates,
            ends: Some(ends),
        }
    }

    /// Validate the parts of the schedule that do not depend on the
    /// chromosome length.
    pub fn validate(&self, category: RateCategory) -> Result<()> {
        if self.rates.is_empty() {
            return Err(GeneticsError::config(format!(
                "{category:?} schedule must contain at least one rate"
            )));
        }
        for &rate in &self.rates {
            category.validate_rate(rate)?;
        }

        match &self.ends {
            None if self.rates.len() != 1 => Err(GeneticsError::config(format!(
                "{category:?} schedule with {} rates requires end positions",
                self.rates.len()
            ))),
            None => Ok(()),
            Some(ends) => {
                if ends.len() != self.rates.len() {
                    return Err(GeneticsError::config(format!(
                        "{category:?} schedule has {} rates but {} end positions",
                        self.rates.len(),
                        ends.len()
                    )));
                }
                if ends[0] < 0 {
                    return Err(GeneticsError::config(format!(
                        "{category:?} end position {} is negative",
                        ends[0]
                    )));
                }
                if let Some(pair) = ends.windows(2).find(|w| w[1] <= w[0]) {
                    return Err(GeneticsError::config(format!(
                        "{category:?} end positions must be strictly ascending ({} then {})",
                        pair[0], pair[1]
                    )));
                }
                if let Some(&last) = ends.last() {
                    if last > MAX_BASE_POSITION {
                        return Err(GeneticsError::config(format!(
                            "{category:?} end position {last} exceeds the maximum base position"
                        )));
                    }
                }
                Ok(())
            }
        }
    }

    /// Last explicit end position, if any.
    pub fn last_end(&self) -> Option<Position> {
        self.ends.as_ref().and_then(|e| e.last().copied())
    }

    /// Produce the interval list for a chromosome whose last position is
    /// `last_position`.
    pub fn resolve(&self, category: RateCategory, last_position: Position) -> Result<Vec<RateInterval>> {
        self.validate(category)?;

        match &self.ends {
            None => Ok(vec![RateInterval::new(last_position, self.rates[0])]),
            Some(ends) => {
                let last = ends[ends.len() - 1];
                if last != last_position {
                    return Err(GeneticsError::config(format!(
                        "{category:?} schedule ends at {last} but the chromosome ends at {last_position}"
                    )));
                }
                Ok(ends
                    .iter()
                    .zip(&self.rates)
                    .map(|(&end, &rate)| RateInterval::new(end, rate))
                    .collect())
            }
        }
    }
}

/// A value that is either shared by both sexes or held separately for
/// males and females; never a mix.
#[derive(Debug, Clone, PartialEq)]
pub enum SexSpecific<T> {
    Unisex(T),
    BySex { male: T, female: T },
}

impl<T> SexSpecific<T> {
    pub fn is_sex_specific(&self) -> bool {
        matches!(self, Self::BySex { .. })
    }

    /// The value used for gametes produced by `sex`.
    pub fn get(&self, sex: Sex) -> Result<&T> {
        match (self, sex) {
            (Self::Unisex(v), _) => Ok(v),
            (Self::BySex { male, .. }, Sex::Male) => Ok(male),
            (Self::BySex { female, .. }, Sex::Female) => Ok(female),
            (Self::BySex { .. }, Sex::Hermaphrodite) => Err(GeneticsError::internal(
                "sex-specific map requested for a hermaphrodite",
            )),
        }
    }

    pub fn try_map<U>(&self, mut f: impl FnMut(&T) -> Result<U>) -> Result<SexSpecific<U>> {
        Ok(match self {
            Self::Unisex(v) => SexSpecific::Unisex(f(v)?),
            Self::BySex { male, female } => SexSpecific::BySex {
                male: f(male)?,
                female: f(female)?,
            },
        })
    }

    /// Combine two values, splitting by sex if either side is sex-specific.
    pub fn try_zip<U, V>(
        &self,
        other: &SexSpecific<U>,
        mut f: impl FnMut(&T, &U) -> Result<V>,
    ) -> Result<SexSpecific<V>> {
        match (self, other) {
            (Self::Unisex(a), SexSpecific::Unisex(b)) => Ok(SexSpecific::Unisex(f(a, b)?)),
            _ => Ok(SexSpecific::BySex {
                male: f(self.get(Sex::Male)?, other.get(Sex::Male)?)?,
                female: f(self.get(Sex::Female)?, other.get(Sex::Female)?)?,
            }),
        }
    }

    /// Iterate over the stored values (one or two).
    pub fn values(&self) -> impl Iterator<Item = &T> {
        let (a, b) = match self {
            Self::Unisex(v) => (v, None),
            Self::BySex { male, female } => (male, Some(female)),
        };
        std::iter::once(a).chain(b)
    }
}

/// The schedules set for one category, before compilation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unisex: Option<RateSchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub male: Option<RateSchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub female: Option<RateSchedule>,
}

impl ScheduleSet {
    pub fn is_empty(&self) -> bool {
        self.unisex.is_none() && self.male.is_none() && self.female.is_none()
    }

    /// Store `schedule` for `sex`. Switching between unisex and sex-specific
    /// schedules within one category is rejected.
    pub fn set(&mut self, category: RateCategory, sex: Sex, schedule: RateSchedule) -> Result<()> {
        schedule.validate(category)?;

        match sex {
            Sex::Hermaphrodite => {
                if self.male.is_some() || self.female.is_some() {
                    return Err(GeneticsError::config(format!(
                        "cannot set a unisex {category:?} schedule after sex-specific schedules"
                    )));
                }
                self.unisex = Some(schedule);
            }
            Sex::Male | Sex::Female => {
                if self.unisex.is_some() {
                    return Err(GeneticsError::config(format!(
                        "cannot set a sex-specific {category:?} schedule after a unisex schedule"
                    )));
                }
                if sex == Sex::Male {
                    self.male = Some(schedule);
                } else {
                    self.female = Some(schedule);
                }
            }
        }
        Ok(())
    }

    /// The configured schedules, or `None` when nothing was set.
    pub fn resolve(&self, category: RateCategory) -> Result<Option<SexSpecific<&RateSchedule>>> {
        match (&self.unisex, &self.male, &self.female) {
            (None, None, None) => Ok(None),
            (Some(u), None, None) => Ok(Some(SexSpecific::Unisex(u))),
            (None, Some(male), Some(female)) => Ok(Some(SexSpecific::BySex { male, female })),
            (None, Some(_), None) | (None, None, Some(_)) => Err(GeneticsError::config(format!(
                "{category:?} schedules must be given for both sexes when either is sex-specific"
            ))),
            _ => Err(GeneticsError::internal(format!(
                "{category:?} schedule set holds both unisex and sex-specific schedules"
            ))),
        }
    }

    /// Largest explicit end position across stored schedules.
    pub fn max_end(&self) -> Option<Position> {
        [&self.unisex, &self.male, &self.female]
            .into_iter()
            .flatten()
            .filter_map(RateSchedule::last_end)
            .max()
    }
}
