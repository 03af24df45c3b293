//! `vaultpress status`: which posts a publish would touch.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use vaultpress_sync::{status, PostStatus, StatusReport};

use super::{runtime, Session};

/// Arguments for `vaultpress status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let session = Session::open()?;
        let report = runtime()?
            .block_on(status(&session.context()))
            .context("status check failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(&session, report);
        Ok(())
    }
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "post")]
    slug: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "source")]
    source: String,
    #[tabled(rename = "assets")]
    assets: usize,
    #[tabled(rename = "warnings")]
    warnings: usize,
}

fn print_table(session: &Session, report: StatusReport) {
    let remote = &session.config.remote;
    println!(
        "vaultpress v{} | {}/{}@{} | {} posts | last publish {}",
        env!("CARGO_PKG_VERSION"),
        remote.owner,
        remote.repo,
        remote.branch,
        report.entries.len(),
        format_age(report.last_publish, Utc::now()),
    );

    for error in &report.errors {
        println!("{} {error}", "✗".red());
    }
    if report.entries.is_empty() {
        println!("No posts found.");
        return;
    }

    let separator = "■".repeat(67).bright_black().to_string();
    println!("{separator}");
    println!(
        "Indicators: {} NEW  {} MODIFIED  {} CURRENT  {} REMOVED",
        indicator(PostStatus::New),
        indicator(PostStatus::Modified),
        indicator(PostStatus::Current),
        indicator(PostStatus::Removed),
    );
    println!("{separator}");

    let dirty = report.is_dirty();
    let rows: Vec<StatusTableRow> = report
        .entries
        .into_iter()
        .map(|entry| StatusTableRow {
            status: entry.status.label().to_uppercase(),
            slug: entry.slug.0,
            source: entry.vault_path,
            assets: entry.assets,
            warnings: entry.warnings.len(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if dirty {
        println!("Run 'vaultpress publish' to bring the site up to date.");
    }
}

fn indicator(status: PostStatus) -> String {
    match status {
        PostStatus::New => "■".green().bold().to_string(),
        PostStatus::Modified => "■".yellow().bold().to_string(),
        PostStatus::Current => "■".bright_black().bold().to_string(),
        PostStatus::Removed => "■".red().bold().to_string(),
    }
}

/// Human age of `at` relative to `now`: "never", "just now", "5m ago", ...
fn format_age(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(at) = at else {
        return "never".to_string();
    };
    let secs = (now - at).num_seconds().max(0);
    match secs {
        0..=59 => "just now".to_string(),
        60..=3_599 => format!("{}m ago", secs / 60),
        3_600..=86_399 => format!("{}h ago", secs / 3_600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn format_age_buckets() {
        let now = Utc::now();
        assert_eq!(format_age(None, now), "never");
        assert_eq!(format_age(Some(now - Duration::seconds(10)), now), "just now");
        assert_eq!(format_age(Some(now - Duration::minutes(5)), now), "5m ago");
        assert_eq!(format_age(Some(now - Duration::hours(3)), now), "3h ago");
        assert_eq!(format_age(Some(now - Duration::days(2)), now), "2d ago");
    }

    #[test]
    fn future_timestamps_read_as_just_now() {
        let now = Utc::now();
        assert_eq!(format_age(Some(now + Duration::minutes(5)), now), "just now");
    }
}
