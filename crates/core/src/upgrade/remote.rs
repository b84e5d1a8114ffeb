//! Locating the upstream remote and its release branch.

use tracing::{debug, info};

use crate::config::UpstreamConfig;
use crate::errors::UpgradeError;
use crate::vcs::git::RemoteInfo;
use crate::vcs::GitClient;

/// Finds the remote that tracks the upstream repository.
pub struct UpstreamRemoteManager<'a> {
    client: &'a GitClient,
    upstream: &'a UpstreamConfig,
}

impl<'a> UpstreamRemoteManager<'a> {
    pub fn new(client: &'a GitClient, upstream: &'a UpstreamConfig) -> Self {
        Self { client, upstream }
    }

    /// Name of the first remote whose URL contains the upstream URL.
    pub fn upstream_remote(&self) -> Result<String, UpgradeError> {
        let remotes = self.client.remotes()?;
        debug!(count = remotes.len(), "inspecting configured remotes");
        match find_upstream_remote(&remotes, &self.upstream.repository_url) {
            Some(remote) => {
                info!(remote = %remote.name, url = %remote.url, "found upstream remote");
                Ok(remote.name.clone())
            }
            None => Err(UpgradeError::UpstreamRemoteMissing {
                url: self.upstream.repository_url.clone(),
                suggested_name: self.upstream.suggested_remote_name.clone(),
            }),
        }
    }

    /// Full ref name of `branch` on `remote`.
    pub fn release_branch(&self, remote: &str, branch: &str) -> Result<String, UpgradeError> {
        let refname = self.client.release_branch(remote, branch)?;
        info!(refname = %refname, "found release branch");
        Ok(refname)
    }
}

/// First remote whose URL contains `url`.
pub fn find_upstream_remote<'r>(remotes: &'r [RemoteInfo], url: &str) -> Option<&'r RemoteInfo> {
    remotes.iter().find(|remote| remote.url.contains(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(name: &str, url: &str) -> RemoteInfo {
        RemoteInfo {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_find_by_url_substring() {
        let remotes = vec![
            remote("origin", "git@git.internal:fork/platform.git"),
            remote("vendor", "ssh://git@example.com/vendor/platform.git"),
        ];
        let found = find_upstream_remote(&remotes, "example.com/vendor/platform.git").unwrap();
        assert_eq!(found.name, "vendor");
    }

    #[test]
    fn test_first_match_wins() {
        let remotes = vec![
            remote("a", "https://example.com/vendor/platform.git"),
            remote("b", "https://example.com/vendor/platform.git"),
        ];
        assert_eq!(
            find_upstream_remote(&remotes, "vendor/platform").unwrap().name,
            "a"
        );
    }

    #[test]
    fn test_missing_remote() {
        let remotes = vec![remote("origin", "git@git.internal:fork/platform.git")];
        assert!(find_upstream_remote(&remotes, "vendor/platform").is_none());
    }
}
