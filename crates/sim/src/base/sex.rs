use core::fmt;

use serde::{Deserialize, Serialize};

/// The sex of the individual producing a gamete.
///
/// `Hermaphrodite` is used for models without separate sexes and selects the
/// unisex rate maps; `Male` and `Female` select the sex-specific maps when
/// those are configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Sex {
    Hermaphrodite = 0,
    Male = 1,
    Female = 2,
}

impl Sex {
    #[inline(always)]
    pub const fn code(self) -> char {
        match self {
            Self::Hermaphrodite => '*',
            Self::Male => 'M',
            Self::Female => 'F',
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
