//! Resolution pass over the paths a merge left conflicted.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::{info, instrument};

use crate::conflict::{
    BatchProcessor, ChangeFactory, ConflictResolver, ContentEquivalence, MergeConflictDeterminer,
    ProvenanceChecker,
};
use crate::errors::ResolveError;
use crate::models::{Change, ConflictResolutionStrategy};
use crate::vcs::VcsBackend;

use super::{log_progress, ProgressSink};

/// Outcome of a merge-conflict pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConflictSummary {
    /// Conflicts resolved without human input.
    pub auto_resolved: usize,
    /// Changes left for manual resolution, sorted by path.
    pub manual: Vec<Change>,
}

pub struct MergeConflictResolver<'a> {
    backend: &'a dyn VcsBackend,
    processor: &'a BatchProcessor,
    progress: ProgressSink,
}

impl<'a> MergeConflictResolver<'a> {
    pub fn new(backend: &'a dyn VcsBackend, processor: &'a BatchProcessor) -> Self {
        Self {
            backend,
            processor,
            progress: log_progress("merge conflicts"),
        }
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Resolve every conflict that policy allows and return the changes
    /// that still need a human.
    pub fn resolve_merge_conflicts(&self, upstream_remote: &str) -> Result<Vec<Change>, ResolveError> {
        Ok(self.resolve(upstream_remote)?.manual)
    }

    /// Same as [`resolve_merge_conflicts`](Self::resolve_merge_conflicts),
    /// also reporting how many conflicts were auto-resolved.
    #[instrument(skip(self))]
    pub fn resolve(&self, upstream_remote: &str) -> Result<ConflictSummary, ResolveError> {
        let conflicts = self.backend.conflicts()?;
        if conflicts.is_empty() {
            info!("no merge conflicts to resolve");
            return Ok(ConflictSummary::default());
        }
        let entries = self.backend.index_entries()?;
        let changes = ChangeFactory::from_conflicts(&conflicts, &entries);
        info!(count = changes.len(), "resolving merge conflicts");

        let provenance = ProvenanceChecker::new(self.backend, upstream_remote);
        let equivalence = ContentEquivalence::new(self.backend);
        let resolver = ConflictResolver::new(self.backend);
        let apply_lock = Mutex::new(());

        let strategies = self.processor.process(
            &changes,
            |change| {
                let strategy = MergeConflictDeterminer::determine(change, &provenance, &equivalence)?;
                let _guard = apply_lock.lock().unwrap_or_else(PoisonError::into_inner);
                resolver.apply(change, strategy)?;
                Ok::<_, ResolveError>(strategy)
            },
            |milestone| (self.progress)(milestone),
        )?;

        let total = changes.len();
        let mut manual: Vec<Change> = changes
            .into_iter()
            .zip(strategies)
            .filter(|(_, strategy)| *strategy == ConflictResolutionStrategy::ManualResolutionRequired)
            .map(|(change, _)| change)
            .collect();
        manual.sort_by(|a, b| a.path.cmp(&b.path));

        let auto_resolved = total - manual.len();
        info!(
            auto_resolved,
            manual = manual.len(),
            "merge conflict resolution complete"
        );
        Ok(ConflictSummary {
            auto_resolved,
            manual,
        })
    }
}
