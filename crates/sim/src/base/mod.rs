//! Base types shared by the rate maps, samplers and run-layout code.
//!
//! Positions are zero-based base indices. A breakpoint at position `p`
//! falls between bases `p - 1` and `p`, so no breakpoint can sit at 0.

mod chromosome_type;
mod element;
pub mod random;
mod sex;

pub use chromosome_type::{ChromosomeType, ChromosomeTypeInfo, NullPolicy};
pub use element::{sort_and_check_elements, GenomicElement};
pub use random::{draw_poisson, RandomContext, SamplingScratch};
pub use sex::Sex;

/// A base position on a chromosome.
pub type Position = i64;

/// Largest position any chromosome may use.
pub const MAX_BASE_POSITION: Position = 1_000_000_000;
