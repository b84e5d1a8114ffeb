//! Applying a resolution strategy to the working tree.
//!
//! The [`ConflictResolver`] writes, stages, or deletes a single path through
//! the backend. Callers are responsible for serializing calls, since the
//! working tree and index are shared.

use tracing::{debug, info};

use crate::errors::ResolveError;
use crate::models::{Change, ChangeType, ConflictResolutionStrategy};
use crate::vcs::VcsBackend;

pub struct ConflictResolver<'a> {
    backend: &'a dyn VcsBackend,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(backend: &'a dyn VcsBackend) -> Self {
        Self { backend }
    }

    /// Apply `strategy` to `change`.
    pub fn apply(
        &self,
        change: &Change,
        strategy: ConflictResolutionStrategy,
    ) -> Result<(), ResolveError> {
        match strategy {
            ConflictResolutionStrategy::AcceptOurs => self.accept_ours(change),
            ConflictResolutionStrategy::AcceptTheirs => self.accept_theirs(change),
            ConflictResolutionStrategy::ManualResolutionRequired => {
                debug!(path = %change.path, "left for manual resolution");
                Ok(())
            }
        }
    }

    /// Rewrite the path from the local version and stage it.
    ///
    /// Only created or updated local files are rewritten. Permissions on disk
    /// are left as they are.
    pub fn accept_ours(&self, change: &Change) -> Result<(), ResolveError> {
        if !matches!(
            change.our_change_type,
            Some(ChangeType::Created) | Some(ChangeType::Updated)
        ) {
            debug!(path = %change.path, ours = ?change.our_change_type, "nothing to apply for ours");
            return Ok(());
        }

        let version = change
            .our_version
            .as_deref()
            .ok_or_else(|| ResolveError::MissingVersion {
                path: change.path.clone(),
                side: "our",
            })?;
        let contents = self.backend.read_blob(version)?;
        self.backend.write_file(&change.path, &contents, None)?;
        self.backend.stage(&change.path)?;
        info!(path = %change.path, "resolved: accept ours");
        Ok(())
    }

    /// Take the incoming version of the path.
    ///
    /// Upstream deletions, and paths upstream never had before we created
    /// them, are removed outright. Everything else is rewritten from the
    /// incoming version with its permissions restored, then staged.
    pub fn accept_theirs(&self, change: &Change) -> Result<(), ResolveError> {
        if change.their_change_type == Some(ChangeType::Deleted)
            || change.our_change_type == Some(ChangeType::Created)
        {
            self.backend.delete(&change.path)?;
            info!(path = %change.path, "resolved: accept theirs (delete)");
            return Ok(());
        }

        let version = change
            .their_version
            .as_deref()
            .ok_or_else(|| ResolveError::MissingVersion {
                path: change.path.clone(),
                side: "their",
            })?;
        let contents = self.backend.read_blob(version)?;
        self.backend
            .write_file(&change.path, &contents, change.their_permissions)?;
        self.backend.stage(&change.path)?;
        info!(path = %change.path, "resolved: accept theirs");
        Ok(())
    }
}
