//! Configuration and batch sampling on top of [`crate::genome::Chromosome`].
//!
//! - `GeneticsConfig`: serde-loadable description of a chromosome, turned
//!   into an initialized `Chromosome` by `build_chromosome`.
//! - `draw_gamete_events_parallel`: per-gamete draws spread over rayon
//!   workers, each with its own random stream.

pub mod configs;
pub mod gametes;

pub use configs::GeneticsConfig;
pub use gametes::{draw_gamete_events, draw_gamete_events_parallel, GameteEvents, GameteRequest};
