//! The chromosome facade: configuration, compiled maps and per-gamete draws.

mod chromosome;

pub use chromosome::Chromosome;
