//! "Safe to overwrite" check.
//!
//! A path is safe to overwrite when its current local content is identical
//! to some version of that path published on any branch of the upstream
//! remote. Such a path carries no local customization.

use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::errors::ResolveError;
use crate::vcs::VcsBackend;

/// Compares local content against upstream history.
pub struct ProvenanceChecker<'a> {
    backend: &'a dyn VcsBackend,
    upstream_remote: String,
}

impl<'a> ProvenanceChecker<'a> {
    pub fn new(backend: &'a dyn VcsBackend, upstream_remote: impl Into<String>) -> Self {
        Self {
            backend,
            upstream_remote: upstream_remote.into(),
        }
    }

    /// Whether the latest local content of `path` ever existed upstream.
    ///
    /// Upstream commits whose content cannot be resolved are left out of the
    /// comparison, so a lookup failure can only ever make this return false.
    #[instrument(skip(self), fields(remote = %self.upstream_remote))]
    pub fn safe_to_overwrite(&self, path: &str) -> Result<bool, ResolveError> {
        let Some(local_commit) = self.backend.latest_commit_for_path(path)? else {
            debug!("no local commit touches path");
            return Ok(false);
        };

        let local_id = match self.backend.content_id_at_commit(path, &local_commit) {
            Ok(Some(id)) => id,
            Ok(None) => {
                debug!(commit = %local_commit, "path absent at latest local commit");
                return Ok(false);
            }
            Err(e) => {
                debug!(commit = %local_commit, error = %e, "local content lookup failed");
                return Ok(false);
            }
        };

        let upstream_commits = self
            .backend
            .commits_touching_path(path, &self.upstream_remote)?;
        let upstream_ids: HashSet<String> = upstream_commits
            .iter()
            .zip(self.backend.content_ids_at_commits(path, &upstream_commits)?)
            .filter_map(|(commit, lookup)| match lookup {
                Ok(id) => id,
                Err(e) => {
                    debug!(commit = %commit, error = %e, "skipping upstream commit");
                    None
                }
            })
            .collect();

        let safe = upstream_ids.contains(&local_id);
        debug!(
            upstream_commits = upstream_commits.len(),
            safe, "provenance checked"
        );
        Ok(safe)
    }
}
