//! The seam to the graph-storage collaborator.
//!
//! The engine never talks to a database directly; everything goes through
//! the [`Repository`] trait. The real graph store lives outside this
//! crate. [`MemoryRepository`] is the reference implementation used by
//! tests and embedded callers.

mod filters;
mod memory;
mod traits;

pub use filters::{FuzzyPrefilter, SuggestionFilter};
pub use memory::MemoryRepository;
pub use traits::{MergePlan, Repository};
