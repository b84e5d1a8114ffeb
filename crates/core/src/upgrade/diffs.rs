//! Resolution pass over paths that differ from the release branch without a
//! merge conflict.

use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, instrument};

use crate::conflict::{BatchProcessor, ChangeFactory, ConflictResolver, DiffDeterminer, ProvenanceChecker};
use crate::errors::ResolveError;
use crate::models::ConflictResolutionStrategy;
use crate::vcs::VcsBackend;

use super::{log_progress, ProgressSink};

pub struct DiffResolver<'a> {
    backend: &'a dyn VcsBackend,
    processor: &'a BatchProcessor,
    progress: ProgressSink,
}

impl<'a> DiffResolver<'a> {
    pub fn new(backend: &'a dyn VcsBackend, processor: &'a BatchProcessor) -> Self {
        Self {
            backend,
            processor,
            progress: log_progress("diffs"),
        }
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Take upstream's version of every diverging path whose local content
    /// is known upstream. Returns the number of paths updated.
    ///
    /// Paths still conflicted in the index are skipped.
    #[instrument(skip(self))]
    pub fn resolve_diffs(&self, reference: &str, upstream_remote: &str) -> Result<usize, ResolveError> {
        let conflicted = self.backend.conflicts()?;
        let entries = self.backend.diff_against(reference)?;
        let changes: Vec<_> = ChangeFactory::from_diff(&entries)
            .into_iter()
            .filter(|change| {
                let skip = conflicted.contains_key(&change.path);
                if skip {
                    debug!(path = %change.path, "skipping conflicted path");
                }
                !skip
            })
            .collect();
        if changes.is_empty() {
            info!("no diffs to resolve");
            return Ok(0);
        }
        info!(count = changes.len(), "resolving diffs against release branch");

        let provenance = ProvenanceChecker::new(self.backend, upstream_remote);
        let resolver = ConflictResolver::new(self.backend);
        let apply_lock = Mutex::new(());

        let strategies = self.processor.process(
            &changes,
            |change| {
                let strategy = DiffDeterminer::determine(change, &provenance)?;
                if strategy == ConflictResolutionStrategy::AcceptTheirs {
                    let _guard = apply_lock.lock().unwrap_or_else(PoisonError::into_inner);
                    resolver.apply(change, strategy)?;
                }
                Ok::<_, ResolveError>(strategy)
            },
            |milestone| (self.progress)(milestone),
        )?;

        let resolved = strategies
            .iter()
            .filter(|s| **s == ConflictResolutionStrategy::AcceptTheirs)
            .count();
        info!(
            resolved,
            kept = changes.len() - resolved,
            "diff resolution complete"
        );
        Ok(resolved)
    }
}
