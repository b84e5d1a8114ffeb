//! upmerge core library.
//!
//! This crate provides the pieces needed to pull an upstream release into a
//! customized fork: the change model, the resolution policy and its content
//! checks, application of decisions to the working tree, a VCS capability with
//! a git2 adapter, upgrade orchestration, and configuration.

pub mod config;
pub mod conflict;
pub mod errors;
pub mod models;
pub mod upgrade;
pub mod vcs;

// Re-exports for convenience.
pub use config::UpgradeConfig;
pub use upgrade::{UpgradeController, UpgradeReport};
pub use vcs::{GitClient, InMemoryBackend, VcsBackend};
