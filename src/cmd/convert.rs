//! Convert command CLI handler.

use pgdump_rewriter::compression::Compression;
use pgdump_rewriter::rewriter::{
    self, DefectPolicy, EscapeMode, RewriteConfig, RewriteStats, TableFilter,
};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::glob_util::{expand_file_pattern, MultiFileResult};

pub struct ConvertArgs {
    pub file: PathBuf,
    pub output: Option<PathBuf>,
    pub decode_escapes: bool,
    pub batch_size: usize,
    pub skip_malformed: bool,
    pub strict: bool,
    pub tables: Option<Vec<String>>,
    pub exclude: Vec<String>,
    pub progress: bool,
    pub dry_run: bool,
    pub json: bool,
    pub fail_fast: bool,
}

impl ConvertArgs {
    fn config_for(&self, input: PathBuf, output: Option<PathBuf>, progress: bool) -> RewriteConfig {
        RewriteConfig {
            input,
            output,
            escape_mode: if self.decode_escapes {
                EscapeMode::Decode
            } else {
                EscapeMode::Passthrough
            },
            batch_size: self.batch_size,
            policy: if self.skip_malformed {
                DefectPolicy::Skip
            } else {
                DefectPolicy::Abort
            },
            filter: TableFilter::new(self.tables.clone(), self.exclude.clone()),
            dry_run: self.dry_run,
            progress,
        }
    }
}

/// JSON output for a single file
#[derive(Serialize)]
struct ConvertJsonOutput {
    input_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_file: Option<String>,
    dry_run: bool,
    elapsed_secs: f64,
    statistics: RewriteStats,
}

/// JSON output for a glob run
#[derive(Serialize)]
struct MultiConvertJsonOutput {
    total_files: usize,
    succeeded: usize,
    failed: usize,
    elapsed_secs: f64,
    results: Vec<ConvertFileResult>,
}

#[derive(Serialize)]
struct ConvertFileResult {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    statistics: Option<RewriteStats>,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run(args: ConvertArgs) -> anyhow::Result<()> {
    if args.json && args.output.is_none() && !args.dry_run {
        anyhow::bail!("--json requires --output or --dry-run so statements and JSON do not share stdout");
    }

    let expanded = expand_file_pattern(&args.file)?;

    if expanded.from_glob {
        let output_dir = match &args.output {
            Some(dir) => dir.clone(),
            None => anyhow::bail!(
                "Output directory required when using glob patterns. Use --output <dir>"
            ),
        };
        run_multi(expanded.files, output_dir, &args)
    } else {
        let file = expanded.files.into_iter().next().unwrap_or(args.file.clone());
        run_single(file, &args)
    }
}

fn run_single(file: PathBuf, args: &ConvertArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = args.config_for(file.clone(), args.output.clone(), args.progress);
    let stats = rewriter::run(config)?;
    let elapsed = start.elapsed();

    if args.json {
        let out = ConvertJsonOutput {
            input_file: file.display().to_string(),
            output_file: args.output.as_ref().map(|p| p.display().to_string()),
            dry_run: args.dry_run,
            elapsed_secs: elapsed.as_secs_f64(),
            statistics: stats.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_stats(&stats, args, elapsed.as_secs_f64());
    }

    if args.strict && stats.defects_total > 0 {
        anyhow::bail!(
            "Strict mode: {} malformed rows or blocks were skipped",
            stats.defects_total
        );
    }

    Ok(())
}

fn run_multi(files: Vec<PathBuf>, output_dir: PathBuf, args: &ConvertArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let outputs = plan_outputs(&files, &output_dir)?;
    let mut result = MultiFileResult::new(files.len());
    let total = result.total_files;
    let mut json_results = Vec::new();

    if !args.dry_run {
        std::fs::create_dir_all(&output_dir)?;
    }

    if !args.json {
        eprintln!("Converting {} files...\n", total);
    }

    for (idx, (file, output_file)) in files.iter().zip(outputs).enumerate() {
        if !args.json {
            eprintln!("[{}/{}] Converting: {}", idx + 1, total, file.display());
        }

        let config = args.config_for(file.clone(), Some(output_file.clone()), false);
        let outcome = rewriter::run(config).and_then(|stats| {
            if args.strict && stats.defects_total > 0 {
                anyhow::bail!("{} malformed rows or blocks in strict mode", stats.defects_total);
            }
            Ok(stats)
        });

        match outcome {
            Ok(stats) => {
                if !args.json {
                    eprintln!(
                        "  {} blocks → {} statements ({} rows skipped)",
                        stats.blocks_converted, stats.statements_written, stats.rows_skipped
                    );
                    if !args.dry_run {
                        eprintln!("  → {}", output_file.display());
                    }
                    eprintln!();
                }
                result.record_success();
                json_results.push(ConvertFileResult {
                    file: file.display().to_string(),
                    output_file: (!args.dry_run).then(|| output_file.display().to_string()),
                    statistics: Some(stats),
                    status: "success".to_string(),
                    error: None,
                });
            }
            Err(e) => {
                if !args.json {
                    eprintln!("  Error: {:#}\n", e);
                }
                result.record_failure(file.clone(), format!("{:#}", e));
                json_results.push(ConvertFileResult {
                    file: file.display().to_string(),
                    output_file: None,
                    statistics: None,
                    status: "error".to_string(),
                    error: Some(format!("{:#}", e)),
                });
                if args.fail_fast {
                    break;
                }
            }
        }
    }

    if args.json {
        let out = MultiConvertJsonOutput {
            total_files: total,
            succeeded: result.succeeded,
            failed: result.failed(),
            elapsed_secs: start.elapsed().as_secs_f64(),
            results: json_results,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("Conversion Summary:");
        eprintln!("  Total files: {}", total);
        eprintln!("  Succeeded: {}", result.succeeded);
        eprintln!("  Failed: {}", result.failed());

        if result.has_failures() {
            eprintln!();
            eprintln!("Failed files:");
            for (path, error) in &result.errors {
                eprintln!("  - {}: {}", path.display(), error);
            }
        }
    }

    if result.has_failures() {
        anyhow::bail!("{} of {} files failed to convert", result.failed(), total);
    }
    Ok(())
}

/// Output path for each input. Two inputs mapping to the same output name
/// (same basename in different directories) is an error.
fn plan_outputs(files: &[PathBuf], output_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut claimed: HashMap<PathBuf, &PathBuf> = HashMap::new();
    let mut outputs = Vec::with_capacity(files.len());

    for (idx, file) in files.iter().enumerate() {
        let output_file = output_dir.join(output_name(file, idx));
        if let Some(previous) = claimed.insert(output_file.clone(), file) {
            anyhow::bail!(
                "{} and {} would both be written to {}",
                previous.display(),
                file.display(),
                output_file.display()
            );
        }
        outputs.push(output_file);
    }

    Ok(outputs)
}

/// Output file name for an input: compression suffixes are dropped because
/// the statements are written uncompressed.
fn output_name(file: &Path, idx: usize) -> String {
    let name = if Compression::from_path(file) == Compression::None {
        file.file_name()
    } else {
        file.file_stem()
    };
    name.map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("output_{}.sql", idx))
}

fn print_stats(stats: &RewriteStats, args: &ConvertArgs, elapsed_secs: f64) {
    if !stats.defects.is_empty() {
        eprintln!("Skipped ({}):", stats.defects_total);
        for defect in &stats.defects {
            eprintln!("  ⚠ {}", defect);
        }
        if stats.defects_total > stats.defects.len() as u64 {
            eprintln!("  ... (additional defects truncated)");
        }
    }

    if stats.near_miss_headers > 0 {
        eprintln!(
            "Warning: {} COPY lines did not match the header grammar and were skipped",
            stats.near_miss_headers
        );
    }

    if !args.progress && !args.dry_run {
        return;
    }

    eprintln!();
    eprintln!("Conversion Statistics:");
    eprintln!("  Lines read: {}", stats.lines_read);
    eprintln!("  COPY blocks converted: {}", stats.blocks_converted);
    eprintln!("  COPY blocks filtered: {}", stats.blocks_filtered);
    eprintln!("  Unparsed COPY lines: {}", stats.near_miss_headers);
    eprintln!("  Rows converted: {}", stats.rows_converted);
    eprintln!("  Rows skipped: {}", stats.rows_skipped);
    eprintln!("  Statements written: {}", stats.statements_written);
    eprintln!("  Elapsed: {:.3}s", elapsed_secs);

    if args.dry_run {
        eprintln!();
        eprintln!("(Dry run - no output written)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_name_strips_compression_suffix() {
        assert_eq!(output_name(Path::new("dumps/a.sql"), 0), "a.sql");
        assert_eq!(output_name(Path::new("dumps/b.sql.gz"), 1), "b.sql");
        assert_eq!(output_name(Path::new("dumps/c.sql.zst"), 2), "c.sql");
    }

    #[test]
    fn test_plan_outputs_rejects_name_collisions() {
        let out = Path::new("out");
        let files = vec![PathBuf::from("x/a.sql"), PathBuf::from("y/b.sql.gz")];
        assert_eq!(
            plan_outputs(&files, out).unwrap(),
            vec![out.join("a.sql"), out.join("b.sql")]
        );

        let clash = vec![PathBuf::from("x/a.sql"), PathBuf::from("y/a.sql.gz")];
        let err = plan_outputs(&clash, out).unwrap_err().to_string();
        assert!(err.contains("would both be written to"), "{err}");
    }
}
