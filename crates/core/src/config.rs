//! TOML-based configuration for upmerge.
//!
//! Every field has a default, so an absent or partial file is valid. CLI
//! flags are layered on top by the binary.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

const VERSION_PLACEHOLDER: &str = "{version}";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpgradeConfig {
    /// Where upstream releases come from.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Which upgrade steps run.
    #[serde(default)]
    pub steps: StepsConfig,

    /// Resolution worker settings.
    #[serde(default)]
    pub resolution: ResolutionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Upstream
// ---------------------------------------------------------------------------

/// Upstream repository settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Matched as a substring against configured remote URLs.
    #[serde(default = "default_repository_url")]
    pub repository_url: String,

    /// Remote name suggested when no matching remote is configured.
    #[serde(default = "default_remote_name")]
    pub suggested_remote_name: String,

    /// Release branch name; `{version}` is replaced by the target version.
    #[serde(default = "default_release_branch_template")]
    pub release_branch_template: String,
}

fn default_repository_url() -> String {
    "git@example.com:vendor/platform.git".into()
}
fn default_remote_name() -> String {
    "upstream-releases".into()
}
fn default_release_branch_template() -> String {
    format!("release/{}", VERSION_PLACEHOLDER)
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            repository_url: default_repository_url(),
            suggested_remote_name: default_remote_name(),
            release_branch_template: default_release_branch_template(),
        }
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Toggles for the individual upgrade steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepsConfig {
    #[serde(default = "default_true")]
    pub clean_working_directory_check: bool,

    #[serde(default = "default_true")]
    pub revert_patches: bool,

    #[serde(default = "default_true")]
    pub merge: bool,

    #[serde(default = "default_true")]
    pub resolve_conflicts: bool,

    #[serde(default = "default_true")]
    pub resolve_diffs: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StepsConfig {
    fn default() -> Self {
        Self {
            clean_working_directory_check: true,
            revert_patches: true,
            merge: true,
            resolve_conflicts: true,
            resolve_diffs: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution / logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Worker threads for determination; `0` means one per core.
    #[serde(default)]
    pub parallelism: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl UpgradeConfig {
    /// Load an [`UpgradeConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: UpgradeConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Serialize to TOML, as written by `upmerge init`.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.repository_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "upstream.repository_url".into(),
                detail: "upstream repository URL must not be empty".into(),
            });
        }
        if self.upstream.suggested_remote_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "upstream.suggested_remote_name".into(),
                detail: "suggested remote name must not be empty".into(),
            });
        }
        if !self
            .upstream
            .release_branch_template
            .contains(VERSION_PLACEHOLDER)
        {
            return Err(ConfigError::InvalidValue {
                field: "upstream.release_branch_template".into(),
                detail: format!("template must contain '{}'", VERSION_PLACEHOLDER),
            });
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".into(),
                detail: format!("expected one of {}", LOG_LEVELS.join(", ")),
            });
        }

        Ok(())
    }

    /// Release branch name for `version`, e.g. `release/8.5.0`.
    pub fn release_branch_name(&self, version: &str) -> String {
        self.upstream
            .release_branch_template
            .replace(VERSION_PLACEHOLDER, version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[upstream]
repository_url = "git@git.example.com:platform/core.git"
suggested_remote_name = "platform-releases"
release_branch_template = "releases/v{version}"

[steps]
revert_patches = false
resolve_diffs = false

[resolution]
parallelism = 4

[logging]
level = "debug"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: UpgradeConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(
            config.upstream.repository_url,
            "git@git.example.com:platform/core.git"
        );
        assert_eq!(config.upstream.suggested_remote_name, "platform-releases");
        assert!(!config.steps.revert_patches);
        assert!(config.steps.merge);
        assert!(!config.steps.resolve_diffs);
        assert_eq!(config.resolution.parallelism, 4);
        assert_eq!(config.release_branch_name("2.1.0"), "releases/v2.1.0");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upmerge.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = UpgradeConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_file_not_found() {
        let result = UpgradeConfig::load_from_file("/nonexistent/upmerge.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[steps\nmerge = ").unwrap();
        assert!(matches!(
            UpgradeConfig::load_from_file(&path),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_url() {
        let mut config = UpgradeConfig::default();
        config.upstream.repository_url = "  ".into();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "upstream.repository_url"
        ));
    }

    #[test]
    fn test_validate_rejects_template_without_placeholder() {
        let mut config = UpgradeConfig::default();
        config.upstream.release_branch_template = "release/latest".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "upstream.release_branch_template"
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let mut config = UpgradeConfig::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());
        config.logging.level = "WARN".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config: UpgradeConfig = toml::from_str("").unwrap();
        assert_eq!(config.upstream.suggested_remote_name, "upstream-releases");
        assert_eq!(config.release_branch_name("8.5.0"), "release/8.5.0");
        assert_eq!(config.steps, StepsConfig::default());
        assert_eq!(config.resolution.parallelism, 0);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let text = UpgradeConfig::default().to_toml().unwrap();
        let parsed: UpgradeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.upstream.release_branch_template, "release/{version}");
    }
}
