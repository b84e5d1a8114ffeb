//! Error types for the upmerge core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Upgrade(#[from] UpgradeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// VCS backend errors
// ---------------------------------------------------------------------------

/// Errors raised by a [`VcsBackend`](crate::vcs::VcsBackend) implementation.
#[derive(Debug, Error)]
pub enum VcsError {
    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// A ref (branch, tag, SHA) could not be resolved.
    #[error("git ref not found: {0}")]
    RefNotFound(String),

    /// The upstream release branch for a version does not exist.
    #[error("no release branch for version {version} found in remote repository '{remote}'")]
    ReleaseBranchNotFound {
        remote: String,
        version: String,
    },

    /// A content identifier is not a well-formed object id.
    #[error("malformed content id '{0}'")]
    InvalidContentId(String),

    /// No blob is stored under the given content identifier.
    #[error("blob not found: {0}")]
    BlobNotFound(String),

    /// The merge engine could not find a merge base.
    #[error(
        "git merge failed: no common ancestor between HEAD and '{0}'. \
         The branch being upgraded must share history with the upstream release branch."
    )]
    NoCommonAncestor(String),

    /// Reverting a commit produced conflicts or otherwise failed.
    #[error("revert of commit {sha} failed: {detail}")]
    RevertFailed {
        sha: String,
        detail: String,
    },

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Resolution errors
// ---------------------------------------------------------------------------

/// Errors from the conflict classification / resolution subsystem.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A side of the change has no content id, but its content is needed.
    #[error("no {side} version recorded for '{path}'")]
    MissingVersion {
        path: String,
        side: &'static str,
    },

    /// The worker pool could not be created.
    #[error("failed to build resolution worker pool: {0}")]
    WorkerPool(String),

    /// Underlying backend error.
    #[error("resolution VCS error: {0}")]
    VcsError(#[from] VcsError),
}

// ---------------------------------------------------------------------------
// Upgrade orchestration errors
// ---------------------------------------------------------------------------

/// Errors from the upgrade controller and its preflight checks.
#[derive(Debug, Error)]
pub enum UpgradeError {
    /// The working tree has uncommitted or untracked changes.
    #[error(
        "the working directory {0} currently has changes.\n\
         Please ensure the working directory is clean before re-running this tool.\n\
         For example, to keep current changes:\n\n\
         git add -A .\n\
         git commit\n\n\
         To remove current changes and restore the working directory to the latest commit:\n\n\
         git reset --hard HEAD\n\
         git clean -f -d"
    )]
    DirtyWorkingDirectory(String),

    /// No configured remote points at the upstream repository.
    #[error(
        "no upstream repository found in git configuration. \
         Please add the remote via the following commands:\n\n\
         git remote add {suggested_name} {url}\n\
         git fetch --all"
    )]
    UpstreamRemoteMissing {
        url: String,
        suggested_name: String,
    },

    /// Underlying backend error.
    #[error("upgrade VCS error: {0}")]
    VcsError(#[from] VcsError),

    /// Underlying resolution error.
    #[error("upgrade resolution error: {0}")]
    ResolveError(#[from] ResolveError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = VcsError::RepositoryNotFound("/tmp/repo".into());
        assert_eq!(err.to_string(), "git repository not found at '/tmp/repo'");

        let err = VcsError::ReleaseBranchNotFound {
            remote: "upstream".into(),
            version: "8.5.0".into(),
        };
        assert!(err.to_string().contains("8.5.0"));

        let err = ResolveError::MissingVersion {
            path: "a.txt".into(),
            side: "their",
        };
        assert_eq!(err.to_string(), "no their version recorded for 'a.txt'");

        let err = UpgradeError::UpstreamRemoteMissing {
            url: "git@example.com:vendor/platform.git".into(),
            suggested_name: "upstream-releases".into(),
        };
        assert!(err
            .to_string()
            .contains("git remote add upstream-releases git@example.com:vendor/platform.git"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let vcs_err = VcsError::BlobNotFound("abc".into());
        let core_err: CoreError = vcs_err.into();
        assert!(matches!(core_err, CoreError::Vcs(_)));

        let resolve_err: ResolveError = VcsError::RefNotFound("HEAD".into()).into();
        assert!(matches!(resolve_err, ResolveError::VcsError(_)));
        let core_err: CoreError = resolve_err.into();
        assert!(matches!(core_err, CoreError::Resolve(_)));
    }
}
