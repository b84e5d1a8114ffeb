//! Upgrade orchestration.
//!
//! The [`UpgradeController`] drives one upgrade to an upstream release:
//!
//! 1. locate the upstream remote and the release branch
//! 2. refuse to run on a dirty working tree
//! 3. revert local patches upstream already shipped
//! 4. merge the release branch
//! 5. resolve merge conflicts by policy
//! 6. resolve remaining diffs against the release branch
//!
//! Each step after the lookup can be switched off in configuration.

pub mod diffs;
pub mod merge_conflicts;
pub mod patches;
pub mod remote;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::conflict::BatchProcessor;
use crate::config::UpgradeConfig;
use crate::errors::UpgradeError;
use crate::models::Change;
use crate::vcs::git::MergeOutcome;
use crate::vcs::{GitClient, VcsBackend};

pub use diffs::DiffResolver;
pub use merge_conflicts::{ConflictSummary, MergeConflictResolver};
pub use patches::PatchReverter;
pub use remote::UpstreamRemoteManager;

/// Receives progress milestones (percent complete).
pub type ProgressSink = Arc<dyn Fn(u32) + Send + Sync>;

/// Sink that logs milestones at `info`.
pub fn log_progress(step: &'static str) -> ProgressSink {
    Arc::new(move |percent| info!(step, "progress: {}%", percent))
}

/// What an upgrade run did.
#[derive(Debug, Clone, Serialize)]
pub struct UpgradeReport {
    pub version: String,
    pub upstream_remote: String,
    pub release_branch: String,
    pub reverted_patches: usize,
    /// Whether the merge created or left a merge in progress.
    pub merged: bool,
    pub conflicts_auto_resolved: usize,
    pub manual_resolution: Vec<Change>,
    pub diffs_auto_resolved: usize,
}

pub struct UpgradeController<'a> {
    client: &'a GitClient,
    config: &'a UpgradeConfig,
    progress: Option<ProgressSink>,
}

impl<'a> UpgradeController<'a> {
    pub fn new(client: &'a GitClient, config: &'a UpgradeConfig) -> Self {
        Self {
            client,
            config,
            progress: None,
        }
    }

    /// Route every pass's progress to `progress` instead of the log.
    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    #[instrument(skip(self))]
    pub fn perform_upgrade(&self, version: &str) -> Result<UpgradeReport, UpgradeError> {
        let steps = &self.config.steps;
        let remotes = UpstreamRemoteManager::new(self.client, &self.config.upstream);
        let upstream_remote = remotes.upstream_remote()?;
        let release_branch =
            remotes.release_branch(&upstream_remote, &self.config.release_branch_name(version))?;

        let mut report = UpgradeReport {
            version: version.to_string(),
            upstream_remote: upstream_remote.clone(),
            release_branch: release_branch.clone(),
            reverted_patches: 0,
            merged: false,
            conflicts_auto_resolved: 0,
            manual_resolution: Vec::new(),
            diffs_auto_resolved: 0,
        };

        if steps.clean_working_directory_check && self.client.working_directory_has_changes()? {
            return Err(UpgradeError::DirtyWorkingDirectory(
                self.client.workdir().display().to_string(),
            ));
        }

        if steps.revert_patches {
            let mut reverter = PatchReverter::new(self.client);
            if let Some(progress) = &self.progress {
                reverter = reverter.with_progress(Arc::clone(progress));
            }
            report.reverted_patches = reverter.revert_patches(&release_branch)?;
        }

        if steps.merge {
            report.merged = match self.client.merge(&release_branch)? {
                MergeOutcome::UpToDate => false,
                MergeOutcome::Committed(sha) => {
                    info!(sha = %sha, "release branch merged cleanly");
                    true
                }
                MergeOutcome::Conflicted => true,
            };
            self.stage_mode_changes()?;
        }

        if steps.resolve_conflicts || steps.resolve_diffs {
            let processor = BatchProcessor::new(self.config.resolution.parallelism)?;

            if steps.resolve_conflicts {
                let mut resolver = MergeConflictResolver::new(self.client, &processor);
                if let Some(progress) = &self.progress {
                    resolver = resolver.with_progress(Arc::clone(progress));
                }
                let summary = resolver.resolve(&upstream_remote)?;
                report.conflicts_auto_resolved = summary.auto_resolved;
                report.manual_resolution = summary.manual;
            }

            if steps.resolve_diffs {
                let mut resolver = DiffResolver::new(self.client, &processor);
                if let Some(progress) = &self.progress {
                    resolver = resolver.with_progress(Arc::clone(progress));
                }
                report.diffs_auto_resolved =
                    resolver.resolve_diffs(&release_branch, &upstream_remote)?;
            }
        }

        if report.manual_resolution.is_empty() {
            info!(version, "upgrade complete; review and commit the result");
        } else {
            warn!(
                count = report.manual_resolution.len(),
                "some conflicts need manual resolution"
            );
            for change in &report.manual_resolution {
                warn!("  {}", change);
            }
            info!(
                "resolve the remaining conflicts, for example with:\n\n\
                 git mergetool\n\
                 git add -A .\n\
                 git commit"
            );
        }

        Ok(report)
    }

    /// Stage paths left differing between index and working tree by the
    /// merge, typically file-mode-only changes.
    fn stage_mode_changes(&self) -> Result<(), UpgradeError> {
        let conflicted = self.client.conflicts()?;
        for entry in self.client.working_diff()? {
            let path = &entry.new_path;
            if conflicted.contains_key(path) || !self.client.workdir().join(path).exists() {
                continue;
            }
            debug!(path = %path, "staging leftover working tree change");
            self.client.stage(path)?;
        }
        Ok(())
    }
}
