//! Scriptable in-memory [`VcsBackend`].
//!
//! Used by unit tests and by callers that want to run the classification
//! passes without touching a real repository.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::errors::VcsError;
use crate::models::{
    CommitId, ConflictState, ContentId, FilePermissions, IndexEntry, RawDiffEntry,
};
use crate::vcs::VcsBackend;

#[derive(Default)]
struct State {
    conflicts: BTreeMap<String, ConflictState>,
    index: Vec<IndexEntry>,
    diffs: HashMap<String, Vec<RawDiffEntry>>,
    blobs: HashMap<ContentId, Vec<u8>>,
    /// Local history per path, oldest first.
    local_history: HashMap<String, Vec<(CommitId, Option<ContentId>)>>,
    /// Upstream history per (remote, path).
    upstream_history: HashMap<(String, String), Vec<CommitId>>,
    contents_at: HashMap<(CommitId, String), Option<ContentId>>,
    failing_commits: HashSet<CommitId>,
    files: BTreeMap<String, (Vec<u8>, Option<FilePermissions>)>,
    written: BTreeSet<String>,
    staged: BTreeSet<String>,
    deleted: BTreeSet<String>,
}

/// In-memory repository state.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
    active_mutations: AtomicUsize,
    max_concurrent_mutations: AtomicUsize,
    mutation_delay: Option<Duration>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every mutation open for `delay`, making overlapping mutations
    /// observable through [`max_concurrent_mutations`](Self::max_concurrent_mutations).
    pub fn with_mutation_delay(mut self, delay: Duration) -> Self {
        self.mutation_delay = Some(delay);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Setup
    // -----------------------------------------------------------------------

    /// Store a blob and return its content id.
    pub fn add_blob(&self, contents: &[u8]) -> ContentId {
        let id = hex::encode(Sha256::digest(contents));
        self.state().blobs.insert(id.clone(), contents.to_vec());
        id
    }

    pub fn add_conflict(&self, path: &str, state: ConflictState) {
        self.state().conflicts.insert(path.to_string(), state);
    }

    pub fn add_index_entry(&self, entry: IndexEntry) {
        self.state().index.push(entry);
    }

    pub fn set_diff(&self, reference: &str, entries: Vec<RawDiffEntry>) {
        self.state().diffs.insert(reference.to_string(), entries);
    }

    /// Record a local commit touching `path`. Later calls are newer.
    pub fn add_local_commit(&self, path: &str, commit: &str, content: Option<ContentId>) {
        let mut state = self.state();
        state
            .contents_at
            .insert((commit.to_string(), path.to_string()), content.clone());
        state
            .local_history
            .entry(path.to_string())
            .or_default()
            .push((commit.to_string(), content));
    }

    /// Record an upstream commit on `remote` touching `path`.
    pub fn add_upstream_commit(
        &self,
        remote: &str,
        path: &str,
        commit: &str,
        content: Option<ContentId>,
    ) {
        let mut state = self.state();
        state
            .contents_at
            .insert((commit.to_string(), path.to_string()), content);
        state
            .upstream_history
            .entry((remote.to_string(), path.to_string()))
            .or_default()
            .push(commit.to_string());
    }

    /// Make content lookups at `commit` fail.
    pub fn fail_content_lookup(&self, commit: &str) {
        self.state().failing_commits.insert(commit.to_string());
    }

    /// Seed a working-tree file.
    pub fn put_file(&self, path: &str, contents: &[u8]) {
        self.state()
            .files
            .insert(path.to_string(), (contents.to_vec(), None));
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state().files.get(path).map(|(bytes, _)| bytes.clone())
    }

    pub fn permissions(&self, path: &str) -> Option<FilePermissions> {
        self.state().files.get(path).and_then(|(_, perms)| *perms)
    }

    pub fn is_staged(&self, path: &str) -> bool {
        self.state().staged.contains(path)
    }

    pub fn is_deleted(&self, path: &str) -> bool {
        self.state().deleted.contains(path)
    }

    /// Number of paths written, staged, or deleted.
    pub fn touched_paths(&self) -> usize {
        let state = self.state();
        state
            .written
            .iter()
            .chain(state.staged.iter())
            .chain(state.deleted.iter())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Highest number of mutations observed in flight at once.
    pub fn max_concurrent_mutations(&self) -> usize {
        self.max_concurrent_mutations.load(Ordering::SeqCst)
    }

    fn track_mutation<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let active = self.active_mutations.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_mutations
            .fetch_max(active, Ordering::SeqCst);
        if let Some(delay) = self.mutation_delay {
            std::thread::sleep(delay);
        }
        let result = f(&mut self.state());
        self.active_mutations.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl VcsBackend for InMemoryBackend {
    fn conflicts(&self) -> Result<BTreeMap<String, ConflictState>, VcsError> {
        Ok(self.state().conflicts.clone())
    }

    fn index_entries(&self) -> Result<Vec<IndexEntry>, VcsError> {
        Ok(self.state().index.clone())
    }

    fn diff_against(&self, reference: &str) -> Result<Vec<RawDiffEntry>, VcsError> {
        self.state()
            .diffs
            .get(reference)
            .cloned()
            .ok_or_else(|| VcsError::RefNotFound(reference.to_string()))
    }

    fn read_blob(&self, id: &str) -> Result<Vec<u8>, VcsError> {
        self.state()
            .blobs
            .get(id)
            .cloned()
            .ok_or_else(|| VcsError::BlobNotFound(id.to_string()))
    }

    fn latest_commit_for_path(&self, path: &str) -> Result<Option<CommitId>, VcsError> {
        Ok(self
            .state()
            .local_history
            .get(path)
            .and_then(|history| history.last())
            .map(|(commit, _)| commit.clone()))
    }

    fn content_id_at_commit(
        &self,
        path: &str,
        commit: &str,
    ) -> Result<Option<ContentId>, VcsError> {
        let state = self.state();
        if state.failing_commits.contains(commit) {
            return Err(VcsError::RefNotFound(commit.to_string()));
        }
        Ok(state
            .contents_at
            .get(&(commit.to_string(), path.to_string()))
            .cloned()
            .flatten())
    }

    fn commits_touching_path(&self, path: &str, remote: &str) -> Result<Vec<CommitId>, VcsError> {
        Ok(self
            .state()
            .upstream_history
            .get(&(remote.to_string(), path.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn write_file(
        &self,
        path: &str,
        contents: &[u8],
        permissions: Option<FilePermissions>,
    ) -> Result<(), VcsError> {
        self.track_mutation(|state| {
            let previous = state.files.get(path).and_then(|(_, perms)| *perms);
            state.deleted.remove(path);
            state.written.insert(path.to_string());
            state.files.insert(
                path.to_string(),
                (contents.to_vec(), permissions.or(previous)),
            );
        });
        Ok(())
    }

    fn stage(&self, path: &str) -> Result<(), VcsError> {
        self.track_mutation(|state| {
            state.conflicts.remove(path);
            state.staged.insert(path.to_string());
        });
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), VcsError> {
        self.track_mutation(|state| {
            state.conflicts.remove(path);
            state.files.remove(path);
            state.staged.remove(path);
            state.deleted.insert(path.to_string());
        });
        Ok(())
    }
}
