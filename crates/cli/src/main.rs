//! upmerge command-line tool.
//!
//! Merges an upstream release branch into a customized fork and resolves
//! the resulting conflicts and divergences by policy, leaving only the paths
//! that need a human.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use upmerge_core::config::UpgradeConfig;
use upmerge_core::{GitClient, UpgradeController, UpgradeReport};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Pull an upstream release into a customized fork.
#[derive(Parser, Debug)]
#[command(
    name = "upmerge",
    version,
    about = "Merge an upstream release and resolve conflicts by policy"
)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upgrade the working directory to an upstream release.
    Upgrade(UpgradeArgs),

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./upmerge.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

#[derive(Args, Debug)]
struct UpgradeArgs {
    /// Target release version, e.g. 8.5.0.
    version: String,

    /// Repository to upgrade.
    #[arg(short = 'C', long, default_value = ".")]
    working_dir: PathBuf,

    /// Upstream repository URL, matched against configured remotes.
    #[arg(short = 'u', long)]
    upstream_repository_url: Option<String>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// Skip the clean working directory check.
    #[arg(long)]
    no_clean_check: bool,

    /// Skip reverting patches upstream already shipped.
    #[arg(long)]
    no_revert_patches: bool,

    /// Skip merging the release branch.
    #[arg(long)]
    no_merge: bool,

    /// Skip policy resolution of merge conflicts.
    #[arg(long)]
    no_resolve_conflicts: bool,

    /// Skip policy resolution of diffs against the release branch.
    #[arg(long)]
    no_resolve_diffs: bool,
}

impl UpgradeArgs {
    /// Layer flags over file configuration.
    fn apply_to(&self, config: &mut UpgradeConfig) {
        if let Some(url) = &self.upstream_repository_url {
            config.upstream.repository_url = url.clone();
        }
        let steps = &mut config.steps;
        steps.clean_working_directory_check &= !self.no_clean_check;
        steps.revert_patches &= !self.no_revert_patches;
        steps.merge &= !self.no_merge;
        steps.resolve_conflicts &= !self.no_resolve_conflicts;
        steps.resolve_diffs &= !self.no_resolve_diffs;
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => {
            let path = cli
                .config
                .as_deref()
                .context("--config is required for validate")?;
            cmd_validate(path)
        }
        Commands::Upgrade(args) => {
            let mut config = load_config(cli.config.as_deref())?;
            args.apply_to(&mut config);
            config.validate().context("invalid configuration")?;
            init_tracing(&config, cli.verbose);
            cmd_upgrade(&config, &args)
        }
    }
}

fn init_tracing(config: &UpgradeConfig, verbose: bool) {
    let level = if verbose {
        "debug".to_string()
    } else {
        config.logging.level.to_ascii_lowercase()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<UpgradeConfig> {
    match path {
        Some(path) => {
            UpgradeConfig::load_from_file(path).context("failed to load configuration file")
        }
        None => Ok(UpgradeConfig::default()),
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

fn cmd_upgrade(config: &UpgradeConfig, args: &UpgradeArgs) -> Result<()> {
    let client = GitClient::new(&args.working_dir).with_context(|| {
        format!(
            "failed to open git repository at {}",
            args.working_dir.display()
        )
    })?;

    let report = UpgradeController::new(&client, config)
        .perform_upgrade(&args.version)
        .with_context(|| format!("upgrade to {} failed", args.version))?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        println!("{}", json);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &UpgradeReport) {
    println!("Upgrade to {}", report.version);
    println!("==========={}", "=".repeat(report.version.len()));
    println!();
    println!("  Upstream remote       : {}", report.upstream_remote);
    println!("  Release branch        : {}", report.release_branch);
    println!("  Patches reverted      : {}", report.reverted_patches);
    println!(
        "  Merged                : {}",
        if report.merged { "yes" } else { "no" }
    );
    println!("  Conflicts resolved    : {}", report.conflicts_auto_resolved);
    println!("  Diffs resolved        : {}", report.diffs_auto_resolved);
    println!();

    if report.manual_resolution.is_empty() {
        println!("No conflicts need manual resolution.");
        return;
    }

    println!("{:<50} {:<14} {:<14}", "FILE", "LOCAL", "UPSTREAM");
    println!("{}", "-".repeat(80));
    for change in &report.manual_resolution {
        let side = |t: Option<upmerge_core::models::ChangeType>| {
            t.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string())
        };
        println!(
            "{:<50} {:<14} {:<14}",
            truncate(&change.path, 50),
            side(change.our_change_type),
            side(change.their_change_type),
        );
    }
    println!();
    println!(
        "{} file(s) need manual resolution. For example:",
        report.manual_resolution.len()
    );
    println!();
    println!("  git mergetool");
    println!("  git add -A .");
    println!("  git commit");
}

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    let contents = UpgradeConfig::default()
        .to_toml()
        .context("failed to render default configuration")?;
    std::fs::write(output, format!("# upmerge configuration\n\n{}", contents))
        .context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Set upstream.repository_url to your upstream repository");
    println!(
        "  2. Validate with: upmerge validate --config {}",
        output.display()
    );
    println!(
        "  3. Upgrade with: upmerge upgrade <version> --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config =
        UpgradeConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => println!("  [OK] All required fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            return Err(e.into());
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  Upstream URL   : {}", config.upstream.repository_url);
    println!("  Remote hint    : {}", config.upstream.suggested_remote_name);
    println!("  Release branch : {}", config.upstream.release_branch_template);
    println!(
        "  Parallelism    : {}",
        match config.resolution.parallelism {
            0 => "one per core".to_string(),
            n => n.to_string(),
        }
    );
    println!("  Log level      : {}", config.logging.level);
    println!();
    println!("Configuration is valid.");
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
