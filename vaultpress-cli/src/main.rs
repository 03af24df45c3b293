//! vaultpress: publish a Markdown vault to a GitHub-hosted site.
//!
//! # Usage
//!
//! ```text
//! vaultpress init <vault> --owner <owner> --repo <repo> [--branch main] [--content-root content/posts] [--posts-dir Posts]
//! vaultpress publish [<document>] [--dry-run]
//! vaultpress status [--json]
//! vaultpress diff <document>
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, init::InitArgs, publish::PublishArgs, status::StatusArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "vaultpress",
    version,
    about = "Publish Obsidian-style notes and their images to a GitHub repository",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write ~/.vaultpress/config.yaml for a vault and target repository.
    Init(InitArgs),

    /// Upload changed posts and images, delete removed posts.
    Publish(PublishArgs),

    /// Show which posts are new, modified, current or removed.
    Status(StatusArgs),

    /// Show a unified diff of a post against its published copy.
    Diff(DiffArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Publish(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Diff(args) => args.run(),
    }
}

/// Logs go to stderr so `--json` output stays parseable. `RUST_LOG`
/// overrides the default `info` level.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
