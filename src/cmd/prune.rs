//! Prune command CLI handler.

use chrono::Local;
use pgdump_rewriter::retention::{
    self, BackupFile, BackupSummary, PruneMode, PruneReport, RetentionPolicy,
};
use serde::Serialize;
use std::path::PathBuf;

pub struct PruneArgs {
    pub dir: PathBuf,
    pub pattern: String,
    pub mode: PruneMode,
    pub max_days: i64,
    pub max_size_mb: u64,
    pub keep_minimum: usize,
    pub yes: bool,
    pub json: bool,
}

#[derive(Serialize)]
struct PruneJsonOutput {
    directory: String,
    mode: PruneMode,
    policy: RetentionPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<BackupSummary>,
    selected: Vec<BackupFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<PruneReport>,
}

pub fn run(args: PruneArgs) -> anyhow::Result<()> {
    if !args.dir.is_dir() {
        anyhow::bail!("backup directory does not exist: {}", args.dir.display());
    }

    let policy = RetentionPolicy {
        max_age_days: args.max_days,
        max_total_mb: args.max_size_mb,
        keep_minimum: args.keep_minimum,
    };
    let now = Local::now();
    let files = retention::list_backups(&args.dir, &args.pattern)?;
    let summary = retention::summarize(&files, now);
    let selected = retention::plan(&files, &policy, args.mode, now);
    let selected_count = selected.len();
    let report = args.yes.then(|| retention::delete(&selected));

    if args.json {
        let out = PruneJsonOutput {
            directory: args.dir.display().to_string(),
            mode: args.mode,
            policy,
            summary,
            selected,
            report: report.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_plan(&args, &policy, summary.as_ref(), &selected, report.as_ref(), now);
    }

    if let Some(report) = report {
        if !report.failures.is_empty() {
            anyhow::bail!(
                "{} of {} files could not be deleted",
                report.failures.len(),
                selected_count
            );
        }
    }
    Ok(())
}

fn print_plan(
    args: &PruneArgs,
    policy: &RetentionPolicy,
    summary: Option<&BackupSummary>,
    selected: &[BackupFile],
    report: Option<&PruneReport>,
    now: chrono::DateTime<Local>,
) {
    eprintln!("Retention policy:");
    eprintln!("  Keep minimum: {} files", policy.keep_minimum);
    eprintln!("  Max age: {} days", policy.max_age_days);
    eprintln!("  Max total size: {} MB", policy.max_total_mb);
    eprintln!();

    let Some(summary) = summary else {
        eprintln!("No files matching '{}' in {}", args.pattern, args.dir.display());
        return;
    };

    eprintln!("Backups in {}:", args.dir.display());
    eprintln!("  Files: {}", summary.file_count);
    eprintln!(
        "  Total size: {:.2} MB",
        summary.total_bytes as f64 / (1024.0 * 1024.0)
    );
    eprintln!("  Oldest: {} ({} days)", summary.oldest, summary.oldest_age_days);
    eprintln!("  Newest: {} ({} days)", summary.newest, summary.newest_age_days);
    eprintln!();

    if selected.is_empty() {
        eprintln!("Nothing to delete.");
        return;
    }

    let total_mb: f64 = selected.iter().map(BackupFile::size_mb).sum();
    eprintln!("Selected for deletion ({}, {:.2} MB):", selected.len(), total_mb);
    for file in selected {
        eprintln!(
            "  - {} ({:.2} MB, {} days)",
            file.name(),
            file.size_mb(),
            file.age_days(now)
        );
    }
    eprintln!();

    match report {
        Some(report) => {
            eprintln!(
                "Deleted {}/{} files, freed {:.2} MB",
                report.deleted.len(),
                selected.len(),
                report.bytes_freed as f64 / (1024.0 * 1024.0)
            );
            for (path, error) in &report.failures {
                eprintln!("  ⚠ {}: {}", path.display(), error);
            }
        }
        None => eprintln!("(Preview only - pass --yes to delete)"),
    }
}
