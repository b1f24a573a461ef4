//! Retention planning for a directory of dump files.
//!
//! Files are considered newest first. The newest `keep_minimum` files are
//! never selected; beyond those, files can be selected for being older than
//! `max_age_days`, for pushing the directory over `max_total_mb`, or both.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A dump file with the metadata retention decisions are based on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Local>,
}

impl BackupFile {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_MB
    }

    /// Age in whole days.
    pub fn age_days(&self, now: DateTime<Local>) -> i64 {
        (now - self.modified).num_days()
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetentionPolicy {
    pub max_age_days: i64,
    pub max_total_mb: u64,
    pub keep_minimum: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age_days: 30,
            max_total_mb: 1000,
            keep_minimum: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PruneMode {
    /// Files older than the age limit
    Age,
    /// Oldest files beyond the total size limit
    Size,
    /// Union of both selections
    #[default]
    Both,
}

/// List files in `dir` matching `pattern` (e.g. `*.sql`), newest first.
pub fn list_backups(dir: &Path, pattern: &str) -> io::Result<Vec<BackupFile>> {
    let full = Path::new(&glob::Pattern::escape(&dir.to_string_lossy())).join(pattern);
    let paths = glob::glob(&full.to_string_lossy()).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid pattern '{}': {}", pattern, e),
        )
    })?;

    let mut files = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| e.into_error())?;
        let meta = fs::metadata(&path)?;
        if !meta.is_file() {
            continue;
        }
        files.push(BackupFile {
            path,
            size_bytes: meta.len(),
            modified: DateTime::<Local>::from(meta.modified()?),
        });
    }

    sort_newest_first(&mut files);
    Ok(files)
}

pub fn sort_newest_first(files: &mut [BackupFile]) {
    files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
}

fn total_mb(files: &[BackupFile]) -> f64 {
    files.iter().map(BackupFile::size_mb).sum()
}

/// Files past the newest `keep_minimum` whose age exceeds the limit.
pub fn select_by_age(
    files: &[BackupFile],
    policy: &RetentionPolicy,
    now: DateTime<Local>,
) -> Vec<BackupFile> {
    if files.len() <= policy.keep_minimum {
        return Vec::new();
    }
    files[policy.keep_minimum..]
        .iter()
        .filter(|f| f.age_days(now) > policy.max_age_days)
        .cloned()
        .collect()
}

/// Files to remove so the directory fits the size limit. Kept files are
/// counted first; each older file is kept only if it still fits.
pub fn select_by_size(files: &[BackupFile], policy: &RetentionPolicy) -> Vec<BackupFile> {
    if files.len() <= policy.keep_minimum {
        return Vec::new();
    }
    let limit = policy.max_total_mb as f64;
    if total_mb(files) <= limit {
        return Vec::new();
    }

    let (kept, candidates) = files.split_at(policy.keep_minimum);
    let mut running = total_mb(kept);
    let mut selected = Vec::new();

    for file in candidates {
        let size = file.size_mb();
        if running + size > limit {
            selected.push(file.clone());
        } else {
            running += size;
        }
    }
    selected
}

/// Files selected by `mode`, in newest-first order without duplicates.
pub fn plan(
    files: &[BackupFile],
    policy: &RetentionPolicy,
    mode: PruneMode,
    now: DateTime<Local>,
) -> Vec<BackupFile> {
    match mode {
        PruneMode::Age => select_by_age(files, policy, now),
        PruneMode::Size => select_by_size(files, policy),
        PruneMode::Both => {
            let by_age = select_by_age(files, policy, now);
            let by_size = select_by_size(files, policy);
            files
                .iter()
                .filter(|f| by_age.contains(f) || by_size.contains(f))
                .cloned()
                .collect()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupSummary {
    pub file_count: usize,
    pub total_bytes: u64,
    pub oldest: String,
    pub oldest_age_days: i64,
    pub newest: String,
    pub newest_age_days: i64,
}

pub fn summarize(files: &[BackupFile], now: DateTime<Local>) -> Option<BackupSummary> {
    let oldest = files.iter().min_by_key(|f| f.modified)?;
    let newest = files.iter().max_by_key(|f| f.modified)?;

    Some(BackupSummary {
        file_count: files.len(),
        total_bytes: files.iter().map(|f| f.size_bytes).sum(),
        oldest: oldest.name(),
        oldest_age_days: oldest.age_days(now),
        newest: newest.name(),
        newest_age_days: newest.age_days(now),
    })
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct PruneReport {
    pub deleted: Vec<PathBuf>,
    pub bytes_freed: u64,
    pub failures: Vec<(PathBuf, String)>,
}

/// Remove the given files. A failed removal is recorded and the rest proceed.
pub fn delete(files: &[BackupFile]) -> PruneReport {
    let mut report = PruneReport::default();
    for file in files {
        match fs::remove_file(&file.path) {
            Ok(()) => {
                tracing::info!(path = %file.path.display(), "deleted backup");
                report.bytes_freed += file.size_bytes;
                report.deleted.push(file.path.clone());
            }
            Err(e) => {
                tracing::warn!(path = %file.path.display(), error = %e, "failed to delete backup");
                report.failures.push((file.path.clone(), e.to_string()));
            }
        }
    }
    report
}
