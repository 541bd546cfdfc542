use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Sex;
use crate::errors::GeneticsError;

/// Which of an individual's two haplosome slots for a chromosome are
/// null regardless of sex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullPolicy {
    /// Neither slot is intrinsically null.
    None,
    /// The first slot is always null (e.g. `-Y`).
    First,
    /// The second slot is always null (e.g. `H-`).
    Second,
}

/// Plain data describing how a chromosome type behaves.
///
/// Built once per type and consulted wherever behaviour depends on the
/// chromosome type, instead of switching on the type at each site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromosomeTypeInfo {
    /// Number of haplosomes that an individual carries for this chromosome
    /// (1 for haploid types, 2 otherwise).
    pub ploidy: u8,
    pub always_null: NullPolicy,
    pub is_sex_chromosome: bool,
    /// Whether a missing recombination schedule means "no recombination"
    /// rather than a configuration error.
    pub defaults_to_zero_recombination: bool,
}

/// The supported chromosome types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChromosomeType {
    /// Diploid autosome.
    #[serde(rename = "A")]
    Autosome,
    /// Haploid autosome.
    #[serde(rename = "H")]
    HaploidAutosome,
    #[serde(rename = "X")]
    X,
    #[serde(rename = "Y")]
    Y,
    #[serde(rename = "Z")]
    Z,
    #[serde(rename = "W")]
    W,
    /// Haploid, inherited from the female parent (mitochondria-like).
    #[serde(rename = "HF")]
    HaploidFemaleInherited,
    /// Female line: present only in females, inherited from the mother.
    #[serde(rename = "FL")]
    FemaleLine,
    /// Haploid, inherited from the male parent.
    #[serde(rename = "HM")]
    HaploidMaleInherited,
    /// Male line: present only in males, inherited from the father.
    #[serde(rename = "ML")]
    MaleLine,
    /// Haploid autosome carried in the first slot of a diploid pair.
    #[serde(rename = "H-")]
    HaploidAutosomeNullSecond,
    /// Y chromosome carried in the second slot of a diploid pair.
    #[serde(rename = "-Y")]
    YNullFirst,
}

const fn info(
    ploidy: u8,
    always_null: NullPolicy,
    is_sex_chromosome: bool,
    defaults_to_zero_recombination: bool,
) -> ChromosomeTypeInfo {
    ChromosomeTypeInfo {
        ploidy,
        always_null,
        is_sex_chromosome,
        defaults_to_zero_recombination,
    }
}

// Indexed by `ChromosomeType::index`.
const TYPE_TABLE: [ChromosomeTypeInfo; 12] = [
    info(2, NullPolicy::None, false, false),   // A
    info(1, NullPolicy::None, false, true),    // H
    info(2, NullPolicy::None, true, false),    // X
    info(1, NullPolicy::None, true, true),     // Y
    info(2, NullPolicy::None, true, false),    // Z
    info(1, NullPolicy::None, true, true),     // W
    info(1, NullPolicy::None, false, true),    // HF
    info(1, NullPolicy::None, true, true),     // FL
    info(1, NullPolicy::None, false, true),    // HM
    info(1, NullPolicy::None, true, true),     // ML
    info(2, NullPolicy::Second, false, true),  // H-
    info(2, NullPolicy::First, true, true),    // -Y
];

impl ChromosomeType {
    pub const ALL: [ChromosomeType; 12] = [
        Self::Autosome,
        Self::HaploidAutosome,
        Self::X,
        Self::Y,
        Self::Z,
        Self::W,
        Self::HaploidFemaleInherited,
        Self::FemaleLine,
        Self::HaploidMaleInherited,
        Self::MaleLine,
        Self::HaploidAutosomeNullSecond,
        Self::YNullFirst,
    ];

    #[inline(always)]
    const fn index(self) -> usize {
        match self {
            Self::Autosome => 0,
            Self::HaploidAutosome => 1,
            Self::X => 2,
            Self::Y => 3,
            Self::Z => 4,
            Self::W => 5,
            Self::HaploidFemaleInherited => 6,
            Self::FemaleLine => 7,
            Self::HaploidMaleInherited => 8,
            Self::MaleLine => 9,
            Self::HaploidAutosomeNullSecond => 10,
            Self::YNullFirst => 11,
        }
    }

    #[inline]
    pub const fn info(self) -> ChromosomeTypeInfo {
        TYPE_TABLE[self.index()]
    }

    /// Haploid types (ploidy 1, or one slot intrinsically null) never
    /// recombine.
    #[inline]
    pub const fn recombines(self) -> bool {
        let info = self.info();
        info.ploidy == 2 && matches!(info.always_null, NullPolicy::None)
    }

    /// For sex chromosomes, the sex that carries a single copy (males for
    /// an XY system, females for ZW).
    pub const fn heterogametic_sex(self) -> Option<Sex> {
        if !self.info().is_sex_chromosome {
            return None;
        }
        match self {
            Self::X | Self::Y | Self::MaleLine | Self::YNullFirst => Some(Sex::Male),
            Self::Z | Self::W | Self::FemaleLine => Some(Sex::Female),
            _ => None,
        }
    }

    /// Whether gametes produced by `sex` can carry crossovers on this type.
    #[inline]
    pub const fn recombines_in(self, sex: Sex) -> bool {
        match (self.heterogametic_sex(), sex) {
            (Some(Sex::Male), Sex::Male) | (Some(Sex::Female), Sex::Female) => false,
            _ => self.recombines(),
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Autosome => "A",
            Self::HaploidAutosome => "H",
            Self::X => "X",
            Self::Y => "Y",
            Self::Z => "Z",
            Self::W => "W",
            Self::HaploidFemaleInherited => "HF",
            Self::FemaleLine => "FL",
            Self::HaploidMaleInherited => "HM",
            Self::MaleLine => "ML",
            Self::HaploidAutosomeNullSecond => "H-",
            Self::YNullFirst => "-Y",
        }
    }
}

impl Default for ChromosomeType {
    fn default() -> Self {
        Self::Autosome
    }
}

impl fmt::Display for ChromosomeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ChromosomeType {
    type Err = GeneticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.symbol() == s)
            .ok_or_else(|| GeneticsError::config(format!("unknown chromosome type '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_round_trip() {
        for t in ChromosomeType::ALL {
            assert_eq!(t.symbol().parse::<ChromosomeType>().unwrap(), t);
        }
        assert!("Q".parse::<ChromosomeType>().is_err());
    }

    #[test]
    fn test_autosome_recombines() {
        assert!(ChromosomeType::Autosome.recombines());
        assert!(ChromosomeType::X.recombines());
        assert!(!ChromosomeType::Y.recombines());
        assert!(!ChromosomeType::HaploidAutosomeNullSecond.recombines());
    }

    #[test]
    fn test_sex_chromosomes_skip_heterogametic_sex() {
        assert!(ChromosomeType::X.recombines_in(Sex::Female));
        assert!(ChromosomeType::X.recombines_in(Sex::Hermaphrodite));
        assert!(!ChromosomeType::X.recombines_in(Sex::Male));
        assert!(ChromosomeType::Z.recombines_in(Sex::Male));
        assert!(!ChromosomeType::Z.recombines_in(Sex::Female));
        assert!(ChromosomeType::Autosome.recombines_in(Sex::Male));
        assert!(!ChromosomeType::Y.recombines_in(Sex::Female));
        assert_eq!(ChromosomeType::Autosome.heterogametic_sex(), None);
        assert_eq!(ChromosomeType::W.heterogametic_sex(), Some(Sex::Female));
    }

    #[test]
    fn test_zero_recombination_defaults() {
        assert!(!ChromosomeType::Autosome.info().defaults_to_zero_recombination);
        assert!(ChromosomeType::HaploidFemaleInherited
            .info()
            .defaults_to_zero_recombination);
        assert_eq!(ChromosomeType::YNullFirst.info().always_null, NullPolicy::First);
    }

    #[test]
    fn test_serde_uses_symbols() {
        let json = serde_json::to_string(&ChromosomeType::YNullFirst).unwrap();
        assert_eq!(json, "\"-Y\"");
        let t: ChromosomeType = serde_json::from_str("\"HF\"").unwrap();
        assert_eq!(t, ChromosomeType::HaploidFemaleInherited);
    }
}
