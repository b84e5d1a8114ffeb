//! Conflict classification, resolution policy, and application.
//!
//! The conflict subsystem is responsible for:
//! 1. **Modeling** -- turning raw merge-index rows and diff entries into
//!    [`Change`](crate::models::Change) records.
//! 2. **Deciding** -- choosing a strategy per change, consulting content
//!    equivalence and upstream provenance.
//! 3. **Applying** -- writing, staging, or deleting paths, one at a time.
//! 4. **Batching** -- fanning the above out over a worker pool.

pub mod batch;
pub mod determiner;
pub mod equivalence;
pub mod factory;
pub mod provenance;
pub mod resolver;

pub use batch::{BatchProcessor, ProgressTracker, PROGRESS_STEP};
pub use determiner::{DiffDeterminer, EquivalenceCheck, MergeConflictDeterminer, OverwriteCheck};
pub use equivalence::ContentEquivalence;
pub use factory::ChangeFactory;
pub use provenance::ProvenanceChecker;
pub use resolver::ConflictResolver;
