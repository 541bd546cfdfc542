//! # Meiosis Simulation Crate
//!
//! The genetic-architecture engine of a forward population-genetics
//! simulator. It compiles mutation, recombination and hotspot rate schedules
//! into weighted sampling maps, draws the mutation positions and
//! recombination breakpoints of each gamete (with optional gene conversion),
//! and tunes the chunking of mutation storage online from timing data.

pub mod base;
pub mod errors;
pub mod evolution;
pub mod genome;
pub mod prelude;
pub mod rates;
pub mod runs;
pub mod simulation;

pub use errors::{GeneticsError, Result};
