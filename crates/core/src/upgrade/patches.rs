//! Reverting local patches that upstream has since shipped.
//!
//! A local commit is considered shipped when a non-release commit on the
//! release branch (merges included, against their first parent) changes the
//! same paths in the same way, as measured by
//! [`GitClient::commit_content_hash`]. Reverting those commits before the
//! merge avoids conflicting with our own backports.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex_lite::Regex;
use tracing::{debug, info, instrument, warn};

use crate::conflict::BatchProcessor;
use crate::errors::{UpgradeError, VcsError};
use crate::vcs::git::CommitSummary;
use crate::vcs::GitClient;

use super::{log_progress, ProgressSink};

pub struct PatchReverter<'a> {
    client: &'a GitClient,
    progress: ProgressSink,
}

impl<'a> PatchReverter<'a> {
    pub fn new(client: &'a GitClient) -> Self {
        Self {
            client,
            progress: log_progress("patch revert"),
        }
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Revert every local patch already present on `release_ref`, newest
    /// first. Returns how many were reverted.
    #[instrument(skip(self))]
    pub fn revert_patches(&self, release_ref: &str) -> Result<usize, UpgradeError> {
        let release = self.client.branch_commits(release_ref)?;
        let release_ids: HashSet<&str> = release.iter().map(|c| c.sha.as_str()).collect();

        let upstream_hashes = release
            .iter()
            .filter(|c| !is_release_commit(&c.summary))
            .map(|c| self.client.commit_content_hash(&c.sha))
            .collect::<Result<HashSet<String>, VcsError>>()?;
        debug!(count = upstream_hashes.len(), "hashed upstream patches");

        let candidates: Vec<CommitSummary> = self
            .client
            .local_commits()?
            .into_iter()
            .filter(|c| is_patch(c) && !release_ids.contains(c.sha.as_str()))
            .collect();
        if candidates.is_empty() {
            info!("no local patches to check");
            return Ok(0);
        }
        info!(count = candidates.len(), "checking local patches against release branch");

        let reverted = BatchProcessor::process_serially(
            &candidates,
            |commit| {
                let hash = self.client.commit_content_hash(&commit.sha)?;
                if !upstream_hashes.contains(&hash) {
                    return Ok::<_, UpgradeError>(false);
                }
                match self.client.revert(&commit.sha) {
                    Ok(_) => {
                        info!(sha = %commit.sha, summary = %commit.summary, "reverted patch shipped upstream");
                        Ok(true)
                    }
                    Err(e) => {
                        warn!(sha = %commit.sha, error = %e, "could not revert patch, skipping");
                        Ok(false)
                    }
                }
            },
            |milestone| (self.progress)(milestone),
        )?;

        let count = reverted.into_iter().filter(|r| *r).count();
        info!(count, "patch revert complete");
        Ok(count)
    }
}

/// Single-parent commits that are not release markers.
fn is_patch(commit: &CommitSummary) -> bool {
    commit.parent_count == 1 && !is_release_commit(&commit.summary)
}

/// Whether `summary` marks a release: `Initial commit`, or a leading
/// `major.minor.patch` version.
pub fn is_release_commit(summary: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^(\d+\.\d+\.\d+|Initial commit)").expect("release pattern is valid")
        })
        .is_match(summary)
}
