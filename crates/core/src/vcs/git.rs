//! Local Git repository operations via `git2`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use git2::{
    Commit, Delta, DiffOptions, ObjectType, Oid, Repository, ResetType, Signature, Sort,
    StatusOptions, Tree,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::errors::VcsError;
use crate::models::{
    CommitId, ConflictState, ContentId, DiffKind, FileMode, FilePermissions, IndexEntry,
    RawDiffEntry, Stage,
};
use crate::vcs::VcsBackend;

const STAGE_MASK: u16 = 0x3000;
const STAGE_SHIFT: u16 = 12;

/// High-level Git client wrapping a `git2::Repository`.
///
/// Index and working-tree mutations go through a single guarded handle.
/// History queries open their own short-lived handle so they can run on
/// several threads at once.
pub struct GitClient {
    repo: Mutex<Repository>,
    repo_path: PathBuf,
    workdir: PathBuf,
}

/// A configured remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteInfo {
    pub name: String,
    pub url: String,
}

/// Summary of a single commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSummary {
    pub sha: CommitId,
    pub summary: String,
    pub parent_count: usize,
}

/// What a merge left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// HEAD already contains the merged branch.
    UpToDate,
    /// The merge was clean and committed.
    Committed(CommitId),
    /// The merge stopped with conflicts in the index.
    Conflicted,
}

impl GitClient {
    /// Open an existing, non-bare Git repository at `repo_path`.
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Result<Self, VcsError> {
        let path = repo_path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)
            .map_err(|_| VcsError::RepositoryNotFound(path.display().to_string()))?;
        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| VcsError::RepositoryNotFound(path.display().to_string()))?;
        Ok(Self {
            repo: Mutex::new(repo),
            repo_path: path.to_path_buf(),
            workdir,
        })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn writer(&self) -> MutexGuard<'_, Repository> {
        self.repo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reader(&self) -> Result<Repository, VcsError> {
        Ok(Repository::open(&self.repo_path)?)
    }

    // -----------------------------------------------------------------------
    // Remotes and branches
    // -----------------------------------------------------------------------

    /// List configured remotes with their fetch URLs.
    pub fn remotes(&self) -> Result<Vec<RemoteInfo>, VcsError> {
        let repo = self.reader()?;
        let names = repo.remotes()?;
        let mut remotes = Vec::new();
        for name in names.iter().flatten() {
            let remote = repo.find_remote(name)?;
            remotes.push(RemoteInfo {
                name: name.to_string(),
                url: remote.url().unwrap_or("").to_string(),
            });
        }
        Ok(remotes)
    }

    /// Resolve `refs/remotes/<remote>/<branch>` and return its full name.
    pub fn release_branch(&self, remote: &str, branch: &str) -> Result<String, VcsError> {
        let refname = format!("refs/remotes/{}/{}", remote, branch);
        let repo = self.reader()?;
        let found = repo.find_reference(&refname).map(|_| ());
        match found {
            Ok(()) => Ok(refname),
            Err(e) if e.code() == git2::ErrorCode::NotFound => {
                Err(VcsError::ReleaseBranchNotFound {
                    remote: remote.to_string(),
                    version: branch.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the working tree has tracked or untracked changes.
    pub fn working_directory_has_changes(&self) -> Result<bool, VcsError> {
        let repo = self.reader()?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .include_ignored(false)
            .recurse_untracked_dirs(true);
        let statuses = repo.statuses(Some(&mut opts))?;
        Ok(!statuses.is_empty())
    }

    // -----------------------------------------------------------------------
    // Merge / revert
    // -----------------------------------------------------------------------

    /// Merge `refname` into HEAD without fast-forwarding.
    ///
    /// A clean merge is committed with both parents. A conflicting merge is
    /// left in progress for the resolution passes.
    #[instrument(skip(self))]
    pub fn merge(&self, refname: &str) -> Result<MergeOutcome, VcsError> {
        let repo = self.writer();
        let reference = repo
            .find_reference(refname)
            .map_err(|_| VcsError::RefNotFound(refname.to_string()))?;
        let incoming = repo.reference_to_annotated_commit(&reference)?;
        let head = repo.head()?.peel_to_commit()?;

        if repo.merge_base(head.id(), incoming.id()).is_err() {
            reset_hard(&repo)?;
            return Err(VcsError::NoCommonAncestor(refname.to_string()));
        }

        let (analysis, _) = repo.merge_analysis(&[&incoming])?;
        if analysis.is_up_to_date() {
            info!("already up to date");
            return Ok(MergeOutcome::UpToDate);
        }

        repo.merge(&[&incoming], None, None)?;

        let mut index = repo.index()?;
        if index.has_conflicts() {
            info!("merge stopped with conflicts");
            return Ok(MergeOutcome::Conflicted);
        }

        let tree = repo.find_tree(index.write_tree()?)?;
        let signature = signature(&repo)?;
        let incoming_commit = repo.find_commit(incoming.id())?;
        let message = format!(
            "Merge '{}' into HEAD",
            reference.shorthand().unwrap_or(refname)
        );
        let oid = repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            &message,
            &tree,
            &[&head, &incoming_commit],
        )?;
        repo.cleanup_state()?;
        info!(sha = %oid, "merge committed");
        Ok(MergeOutcome::Committed(oid.to_string()))
    }

    /// Revert a single-parent commit and commit the result.
    ///
    /// On conflicts the repository is reset to HEAD and an error is returned.
    #[instrument(skip(self))]
    pub fn revert(&self, sha: &str) -> Result<CommitId, VcsError> {
        let repo = self.writer();
        let oid = Oid::from_str(sha).map_err(|_| VcsError::InvalidContentId(sha.to_string()))?;
        let commit = repo.find_commit(oid)?;

        if let Err(e) = repo.revert(&commit, None) {
            reset_hard(&repo)?;
            return Err(VcsError::RevertFailed {
                sha: sha.to_string(),
                detail: e.message().to_string(),
            });
        }

        let mut index = repo.index()?;
        if index.has_conflicts() {
            reset_hard(&repo)?;
            return Err(VcsError::RevertFailed {
                sha: sha.to_string(),
                detail: "revert produced conflicts".into(),
            });
        }

        let tree = repo.find_tree(index.write_tree()?)?;
        let head = repo.head()?.peel_to_commit()?;
        let signature = signature(&repo)?;
        let message = format!(
            "Revert \"{}\"\n\nThis reverts commit {}.",
            commit.summary().unwrap_or(""),
            sha
        );
        let new_oid = repo.commit(Some("HEAD"), &signature, &signature, &message, &tree, &[&head])?;
        repo.cleanup_state()?;
        debug!(reverted = sha, sha = %new_oid, "revert committed");
        Ok(new_oid.to_string())
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Commits reachable from HEAD, newest first.
    pub fn local_commits(&self) -> Result<Vec<CommitSummary>, VcsError> {
        let repo = self.reader()?;
        let mut revwalk = repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        collect_summaries(&repo, revwalk)
    }

    /// Commits reachable from `refname`, newest first.
    pub fn branch_commits(&self, refname: &str) -> Result<Vec<CommitSummary>, VcsError> {
        let repo = self.reader()?;
        let mut revwalk = repo.revwalk()?;
        revwalk
            .push_ref(refname)
            .map_err(|_| VcsError::RefNotFound(refname.to_string()))?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        collect_summaries(&repo, revwalk)
    }

    /// SHA-256 over what a commit changed, independent of its metadata and
    /// position in history.
    ///
    /// Two commits carrying the same patch (same paths, same before/after
    /// content) produce the same hash.
    pub fn commit_content_hash(&self, sha: &str) -> Result<String, VcsError> {
        let repo = self.reader()?;
        let oid = Oid::from_str(sha).map_err(|_| VcsError::InvalidContentId(sha.to_string()))?;
        let commit = repo.find_commit(oid)?;
        let tree = commit.tree()?;
        let mut hasher = Sha256::new();

        if commit.parent_count() == 0 {
            tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
                if entry.kind() == Some(ObjectType::Blob) {
                    let name = entry.name().unwrap_or("");
                    hasher.update(format!("{}{}", root, name).as_bytes());
                    hasher.update(entry.id().to_string().as_bytes());
                }
                git2::TreeWalkResult::Ok
            })?;
        } else {
            let parent_tree = commit.parent(0)?.tree()?;
            let diff = repo.diff_tree_to_tree(Some(&parent_tree), Some(&tree), None)?;
            for delta in diff.deltas() {
                let Some(kind) = diff_kind(delta.status()) else {
                    continue;
                };
                hasher.update(kind.name().as_bytes());
                hasher.update(side_path(&delta.old_file(), kind == DiffKind::Add).as_bytes());
                hasher.update(side_path(&delta.new_file(), kind == DiffKind::Delete).as_bytes());
                for id in [delta.new_file().id(), delta.old_file().id()] {
                    if id.is_zero() {
                        continue;
                    }
                    // Missing objects are skipped rather than failing the hash.
                    if let Ok(blob) = repo.find_blob(id) {
                        hasher.update(blob.content());
                    }
                }
            }
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Diff from the index to the working tree (unstaged changes).
    pub fn working_diff(&self) -> Result<Vec<RawDiffEntry>, VcsError> {
        let repo = self.reader()?;
        let index = repo.index()?;
        let diff = repo.diff_index_to_workdir(Some(&index), None)?;
        Ok(raw_entries(&diff))
    }
}

impl VcsBackend for GitClient {
    fn conflicts(&self) -> Result<BTreeMap<String, ConflictState>, VcsError> {
        let repo = self.reader()?;
        let index = repo.index()?;
        let mut conflicts = BTreeMap::new();
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            let path = [&conflict.our, &conflict.their, &conflict.ancestor]
                .into_iter()
                .flatten()
                .next()
                .map(|entry| String::from_utf8_lossy(&entry.path).into_owned());
            let state = ConflictState::from_stages(
                conflict.ancestor.is_some(),
                conflict.our.is_some(),
                conflict.their.is_some(),
            );
            if let (Some(path), Some(state)) = (path, state) {
                conflicts.insert(path, state);
            }
        }
        debug!(count = conflicts.len(), "collected conflicts");
        Ok(conflicts)
    }

    fn index_entries(&self) -> Result<Vec<IndexEntry>, VcsError> {
        let repo = self.reader()?;
        let index = repo.index()?;
        let entries = index
            .iter()
            .filter_map(|entry| {
                let stage = Stage::from_number((entry.flags & STAGE_MASK) >> STAGE_SHIFT)?;
                Some(IndexEntry::new(
                    String::from_utf8_lossy(&entry.path).into_owned(),
                    stage,
                    entry.id.to_string(),
                ))
            })
            .collect();
        Ok(entries)
    }

    #[instrument(skip(self))]
    fn diff_against(&self, reference: &str) -> Result<Vec<RawDiffEntry>, VcsError> {
        let repo = self.reader()?;
        let tree = repo
            .revparse_single(reference)
            .and_then(|object| object.peel_to_tree())
            .map_err(|_| VcsError::RefNotFound(reference.to_string()))?;
        let index = repo.index()?;
        let mut opts = DiffOptions::new();
        // Old side is the index, new side is the reference tree.
        opts.reverse(true);
        let diff = repo.diff_tree_to_index(Some(&tree), Some(&index), Some(&mut opts))?;
        let entries = raw_entries(&diff);
        debug!(count = entries.len(), "computed diff against reference");
        Ok(entries)
    }

    fn read_blob(&self, id: &str) -> Result<Vec<u8>, VcsError> {
        let repo = self.reader()?;
        let oid = Oid::from_str(id).map_err(|_| VcsError::InvalidContentId(id.to_string()))?;
        let blob = repo
            .find_blob(oid)
            .map_err(|_| VcsError::BlobNotFound(id.to_string()))?;
        Ok(blob.content().to_vec())
    }

    fn latest_commit_for_path(&self, path: &str) -> Result<Option<CommitId>, VcsError> {
        let repo = self.reader()?;
        let mut revwalk = repo.revwalk()?;
        if revwalk.push_head().is_err() {
            // Unborn HEAD: no local history at all.
            return Ok(None);
        }
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        for oid in revwalk {
            let commit = repo.find_commit(oid?)?;
            if commit_touches_path(&commit, Path::new(path))? {
                return Ok(Some(commit.id().to_string()));
            }
        }
        Ok(None)
    }

    fn content_id_at_commit(
        &self,
        path: &str,
        commit: &str,
    ) -> Result<Option<ContentId>, VcsError> {
        content_id_in(&self.reader()?, path, commit)
    }

    fn content_ids_at_commits(
        &self,
        path: &str,
        commits: &[CommitId],
    ) -> Result<Vec<Result<Option<ContentId>, VcsError>>, VcsError> {
        let repo = self.reader()?;
        Ok(commits
            .iter()
            .map(|commit| content_id_in(&repo, path, commit))
            .collect())
    }

    fn commits_touching_path(&self, path: &str, remote: &str) -> Result<Vec<CommitId>, VcsError> {
        let repo = self.reader()?;
        let mut revwalk = repo.revwalk()?;
        let mut heads = 0usize;
        for reference in repo.references_glob(&format!("refs/remotes/{}/*", remote))? {
            let reference = reference?.resolve()?;
            if let Some(target) = reference.target() {
                revwalk.push(target)?;
                heads += 1;
            }
        }
        if heads == 0 {
            warn!(remote, "no branches found under upstream remote");
            return Ok(Vec::new());
        }

        let mut commits = Vec::new();
        for oid in revwalk {
            let commit = repo.find_commit(oid?)?;
            if commit_touches_path(&commit, Path::new(path))? {
                commits.push(commit.id().to_string());
            }
        }
        Ok(commits)
    }

    fn write_file(
        &self,
        path: &str,
        contents: &[u8],
        permissions: Option<FilePermissions>,
    ) -> Result<(), VcsError> {
        let target = self.workdir.join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, contents)?;
        if let Some(permissions) = permissions {
            apply_permissions(&target, permissions)?;
        }
        Ok(())
    }

    fn stage(&self, path: &str) -> Result<(), VcsError> {
        let repo = self.writer();
        let mut index = repo.index()?;
        index.add_path(Path::new(path))?;
        index.write()?;
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), VcsError> {
        let repo = self.writer();
        match std::fs::remove_file(self.workdir.join(path)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let mut index = repo.index()?;
        index.remove_path(Path::new(path))?;
        index.write()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn signature(repo: &Repository) -> Result<Signature<'static>, VcsError> {
    match repo.signature() {
        Ok(sig) => Ok(sig.to_owned()),
        Err(_) => Ok(Signature::now("upmerge", "upmerge@localhost")?),
    }
}

/// Drop any in-progress merge/revert and restore HEAD.
fn reset_hard(repo: &Repository) -> Result<(), VcsError> {
    repo.cleanup_state()?;
    let head = repo.head()?.peel(ObjectType::Commit)?;
    repo.reset(&head, ResetType::Hard, None)?;
    Ok(())
}

fn content_id_in(repo: &Repository, path: &str, commit: &str) -> Result<Option<ContentId>, VcsError> {
    let oid = Oid::from_str(commit).map_err(|_| VcsError::InvalidContentId(commit.to_string()))?;
    let tree = repo.find_commit(oid)?.tree()?;
    Ok(entry_id(&tree, Path::new(path)).map(|id| id.to_string()))
}

fn entry_id(tree: &Tree<'_>, path: &Path) -> Option<Oid> {
    tree.get_path(path).ok().map(|entry| entry.id())
}

/// Whether `commit` changed `path` relative to its parents.
///
/// A merge commit counts only if it differs from every parent.
fn commit_touches_path(commit: &Commit<'_>, path: &Path) -> Result<bool, git2::Error> {
    let current = entry_id(&commit.tree()?, path);
    if commit.parent_count() == 0 {
        return Ok(current.is_some());
    }
    for parent in commit.parents() {
        if entry_id(&parent.tree()?, path) == current {
            return Ok(false);
        }
    }
    Ok(true)
}

fn collect_summaries(
    repo: &Repository,
    revwalk: git2::Revwalk<'_>,
) -> Result<Vec<CommitSummary>, VcsError> {
    let mut commits = Vec::new();
    for oid in revwalk {
        let commit = repo.find_commit(oid?)?;
        commits.push(CommitSummary {
            sha: commit.id().to_string(),
            summary: commit.summary().unwrap_or("").to_string(),
            parent_count: commit.parent_count(),
        });
    }
    Ok(commits)
}

fn diff_kind(status: Delta) -> Option<DiffKind> {
    match status {
        Delta::Added => Some(DiffKind::Add),
        Delta::Copied => Some(DiffKind::Copy),
        Delta::Modified | Delta::Typechange => Some(DiffKind::Modify),
        Delta::Deleted => Some(DiffKind::Delete),
        Delta::Renamed => Some(DiffKind::Rename),
        _ => None,
    }
}

fn file_mode(mode: git2::FileMode) -> Option<FileMode> {
    match mode {
        git2::FileMode::Unreadable => None,
        git2::FileMode::Blob | git2::FileMode::BlobGroupWritable => Some(FileMode::Regular),
        git2::FileMode::BlobExecutable => Some(FileMode::Executable),
        git2::FileMode::Link => Some(FileMode::Symlink),
        git2::FileMode::Commit => Some(FileMode::Gitlink),
        git2::FileMode::Tree => Some(FileMode::Tree),
    }
}

fn side_path(file: &git2::DiffFile<'_>, absent: bool) -> String {
    if absent {
        return "/dev/null".to_string();
    }
    file.path()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn non_zero(oid: Oid) -> Option<ContentId> {
    (!oid.is_zero()).then(|| oid.to_string())
}

fn raw_entries(diff: &git2::Diff<'_>) -> Vec<RawDiffEntry> {
    let mut entries = Vec::new();
    for delta in diff.deltas() {
        let Some(kind) = diff_kind(delta.status()) else {
            if delta.status() == Delta::Conflicted {
                debug!(
                    path = ?delta.old_file().path(),
                    "skipping conflicted path in diff"
                );
            }
            continue;
        };
        let old = delta.old_file();
        let new = delta.new_file();
        entries.push(RawDiffEntry {
            kind,
            old_path: side_path(&old, false),
            new_path: side_path(&new, false),
            old_id: non_zero(old.id()),
            new_id: non_zero(new.id()),
            new_mode: file_mode(new.mode()),
        });
    }
    entries
}

#[cfg(unix)]
fn apply_permissions(path: &Path, permissions: FilePermissions) -> Result<(), VcsError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(permissions.mode_bits()))?;
    Ok(())
}

#[cfg(not(unix))]
fn apply_permissions(path: &Path, permissions: FilePermissions) -> Result<(), VcsError> {
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_readonly(!permissions.writable);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test").unwrap();
        config.set_str("user.email", "test@test.com").unwrap();
        repo
    }

    fn commit_file(repo: &Repository, path: &str, content: &str, message: &str) -> Oid {
        let workdir = repo.workdir().unwrap();
        let full = workdir.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(&full, content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(path)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = repo.signature().unwrap();
        let parents = match repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap()],
            Err(_) => Vec::new(),
        };
        let parent_refs: Vec<&Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    #[test]
    fn test_repo_not_found() {
        assert!(matches!(
            GitClient::new("/nonexistent"),
            Err(VcsError::RepositoryNotFound(_))
        ));
    }

    #[test]
    fn test_latest_commit_and_content_id() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        commit_file(&repo, "a.txt", "one", "first");
        let second = commit_file(&repo, "a.txt", "two", "second");
        commit_file(&repo, "b.txt", "other", "third");

        let client = GitClient::new(dir.path()).unwrap();
        let latest = client.latest_commit_for_path("a.txt").unwrap();
        assert_eq!(latest, Some(second.to_string()));

        let content = client
            .content_id_at_commit("a.txt", &second.to_string())
            .unwrap()
            .unwrap();
        assert_eq!(client.read_blob(&content).unwrap(), b"two");
        assert_eq!(
            client
                .content_id_at_commit("missing.txt", &second.to_string())
                .unwrap(),
            None
        );
        assert_eq!(client.latest_commit_for_path("missing.txt").unwrap(), None);
    }

    #[test]
    fn test_write_stage_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        commit_file(&repo, "keep.txt", "k", "init");

        let client = GitClient::new(dir.path()).unwrap();
        client
            .write_file("nested/dir/new.sh", b"#!/bin/sh\n", Some(FilePermissions::EXECUTABLE))
            .unwrap();
        client.stage("nested/dir/new.sh").unwrap();
        assert_eq!(
            std::fs::read(dir.path().join("nested/dir/new.sh")).unwrap(),
            b"#!/bin/sh\n"
        );
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(dir.path().join("nested/dir/new.sh"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o755);
        }

        let repo = Repository::open(dir.path()).unwrap();
        assert!(repo
            .index()
            .unwrap()
            .get_path(Path::new("nested/dir/new.sh"), 0)
            .is_some());

        client.delete("keep.txt").unwrap();
        assert!(!dir.path().join("keep.txt").exists());
        let repo = Repository::open(dir.path()).unwrap();
        assert!(repo.index().unwrap().get_path(Path::new("keep.txt"), 0).is_none());
    }

    #[test]
    fn test_working_directory_has_changes() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        commit_file(&repo, "a.txt", "a", "init");
        let client = GitClient::new(dir.path()).unwrap();
        assert!(!client.working_directory_has_changes().unwrap());

        std::fs::write(dir.path().join("untracked.txt"), "u").unwrap();
        assert!(client.working_directory_has_changes().unwrap());
    }

    #[test]
    fn test_commit_content_hash_matches_same_patch() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        commit_file(&repo, "a.txt", "base", "init");
        let first = commit_file(&repo, "a.txt", "patched", "fix a");

        let other = tempfile::tempdir().unwrap();
        let other_repo = init_repo(other.path());
        commit_file(&other_repo, "a.txt", "base", "different init message");
        let second = commit_file(&other_repo, "a.txt", "patched", "same fix, new message");

        let hash_a = GitClient::new(dir.path())
            .unwrap()
            .commit_content_hash(&first.to_string())
            .unwrap();
        let hash_b = GitClient::new(other.path())
            .unwrap()
            .commit_content_hash(&second.to_string())
            .unwrap();
        assert_eq!(hash_a, hash_b);
        assert_eq!(hash_a.len(), 64);
    }

    #[test]
    fn test_release_branch_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        let head = commit_file(&repo, "a.txt", "one", "init");
        repo.reference("refs/remotes/upstream/release/2.0.0", head, true, "test")
            .unwrap();

        let client = GitClient::new(dir.path()).unwrap();
        assert_eq!(
            client.release_branch("upstream", "release/2.0.0").unwrap(),
            "refs/remotes/upstream/release/2.0.0"
        );
        assert!(matches!(
            client.release_branch("upstream", "release/9.9.9"),
            Err(VcsError::ReleaseBranchNotFound { .. })
        ));
    }

    #[test]
    fn test_content_ids_at_commits_isolates_bad_commits() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        let first = commit_file(&repo, "a.txt", "one", "first");
        let second = commit_file(&repo, "b.txt", "other", "second");

        let client = GitClient::new(dir.path()).unwrap();
        let commits = vec![
            first.to_string(),
            "not-a-sha".to_string(),
            second.to_string(),
        ];
        let ids = client.content_ids_at_commits("a.txt", &commits).unwrap();
        assert_eq!(ids.len(), 3);
        let expected = client.content_id_at_commit("a.txt", &commits[0]).unwrap();
        assert!(expected.is_some());
        assert_eq!(ids[0].as_ref().unwrap(), &expected);
        assert!(matches!(ids[1], Err(VcsError::InvalidContentId(_))));
        assert_eq!(ids[2].as_ref().unwrap(), &expected);
    }

    #[test]
    fn test_file_mode_mapping() {
        assert_eq!(file_mode(git2::FileMode::Unreadable), None);
        assert_eq!(file_mode(git2::FileMode::Blob), Some(FileMode::Regular));
        assert_eq!(
            file_mode(git2::FileMode::BlobExecutable),
            Some(FileMode::Executable)
        );
        assert_eq!(file_mode(git2::FileMode::Link), Some(FileMode::Symlink));
        assert_eq!(file_mode(git2::FileMode::Commit), Some(FileMode::Gitlink));
        assert_eq!(file_mode(git2::FileMode::Tree), Some(FileMode::Tree));
    }
}
