//! Version-control backend capability.
//!
//! Everything the resolution engine needs from version control goes through
//! [`VcsBackend`]. [`GitClient`] is the production adapter built on `git2`;
//! [`InMemoryBackend`] is a scriptable double for tests and dry runs.

pub mod git;
pub mod memory;

use std::collections::BTreeMap;

use crate::errors::VcsError;
use crate::models::{CommitId, ConflictState, ContentId, FilePermissions, IndexEntry, RawDiffEntry};

pub use git::GitClient;
pub use memory::InMemoryBackend;

/// Operations the resolution engine performs against version control.
///
/// Implementations must be shareable across worker threads: history queries
/// are issued concurrently, while working-tree mutations (`write_file`,
/// `stage`, `delete`) are serialized by the caller.
pub trait VcsBackend: Send + Sync {
    /// Conflicting paths in the merge index, keyed by path.
    fn conflicts(&self) -> Result<BTreeMap<String, ConflictState>, VcsError>;

    /// Every entry of the merge index, including conflict stages.
    fn index_entries(&self) -> Result<Vec<IndexEntry>, VcsError>;

    /// Diff from the local index (old side) to the tree of `reference`
    /// (new side).
    fn diff_against(&self, reference: &str) -> Result<Vec<RawDiffEntry>, VcsError>;

    /// Raw bytes of a blob.
    fn read_blob(&self, id: &str) -> Result<Vec<u8>, VcsError>;

    /// Most recent local commit touching `path`.
    fn latest_commit_for_path(&self, path: &str) -> Result<Option<CommitId>, VcsError>;

    /// Content id of `path` as of `commit`, or `None` if the path does not
    /// exist there.
    fn content_id_at_commit(&self, path: &str, commit: &str)
        -> Result<Option<ContentId>, VcsError>;

    /// Content ids of `path` at each of `commits`, in order.
    ///
    /// The outer error is a backend failure; an inner error only affects
    /// that commit.
    fn content_ids_at_commits(
        &self,
        path: &str,
        commits: &[CommitId],
    ) -> Result<Vec<Result<Option<ContentId>, VcsError>>, VcsError> {
        Ok(commits
            .iter()
            .map(|commit| self.content_id_at_commit(path, commit))
            .collect())
    }

    /// Every commit reachable from any branch of `remote` that touches `path`.
    fn commits_touching_path(&self, path: &str, remote: &str) -> Result<Vec<CommitId>, VcsError>;

    /// Write `contents` to `path` in the working tree, creating parent
    /// directories and applying `permissions` when given.
    fn write_file(
        &self,
        path: &str,
        contents: &[u8],
        permissions: Option<FilePermissions>,
    ) -> Result<(), VcsError>;

    /// Stage `path`, marking any conflict on it as resolved.
    fn stage(&self, path: &str) -> Result<(), VcsError>;

    /// Remove `path` from the working tree and the index.
    fn delete(&self, path: &str) -> Result<(), VcsError>;
}
