mod convert;
mod glob_util;
mod prune;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use pgdump_rewriter::retention::PruneMode;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pgdump-rewriter")]
#[command(version)]
#[command(about = "Rewrite PostgreSQL dump COPY blocks into INSERT statements", long_about = None)]
pub struct Cli {
    /// Verbose logging (RUST_LOG takes precedence when set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert COPY ... FROM stdin blocks of a plain-text dump into INSERT statements
    Convert {
        /// Input dump file or glob pattern (e.g., *.sql, dumps/**/*.sql)
        /// Supports .gz, .bz2, .xz, .zst compression
        file: PathBuf,

        /// Output SQL file or directory (default: stdout for single file, required for glob)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Decode COPY backslash escapes (\t, \n, \\, octal, hex) before quoting
        #[arg(long)]
        decode_escapes: bool,

        /// Rows per INSERT statement
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        batch_size: u32,

        /// Skip rows with the wrong field count and unterminated blocks instead of aborting
        #[arg(long)]
        skip_malformed: bool,

        /// Fail if any row or block was skipped
        #[arg(long)]
        strict: bool,

        /// Only convert specific tables (comma-separated)
        #[arg(short, long)]
        tables: Option<String>,

        /// Exclude specific tables (comma-separated)
        #[arg(short, long)]
        exclude: Option<String>,

        /// Show progress during conversion
        #[arg(short, long)]
        progress: bool,

        /// Parse and report without writing output
        #[arg(long)]
        dry_run: bool,

        /// Print statistics as JSON on stdout (requires --output or --dry-run)
        #[arg(long)]
        json: bool,

        /// Stop on first file that fails (for glob patterns)
        #[arg(long)]
        fail_fast: bool,
    },

    /// Select and delete old dump files according to a retention policy
    Prune {
        /// Directory holding the dump files
        dir: PathBuf,

        /// File name pattern within the directory
        #[arg(long, default_value = "*.sql")]
        pattern: String,

        /// Which rule selects files for deletion
        #[arg(short, long, value_enum, default_value_t = PruneMode::Both)]
        mode: PruneMode,

        /// Delete files older than this many days
        #[arg(long, env = "BACKUP_MAX_DAYS", default_value_t = 30)]
        max_days: i64,

        /// Keep the directory under this many megabytes
        #[arg(long, env = "BACKUP_MAX_SIZE_MB", default_value_t = 1000)]
        max_size_mb: u64,

        /// Always keep this many of the newest files
        #[arg(long, env = "BACKUP_KEEP_MINIMUM", default_value_t = 5)]
        keep_minimum: usize,

        /// Actually delete the selected files (otherwise only report them)
        #[arg(short, long)]
        yes: bool,

        /// Print the plan and result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Convert {
            file,
            output,
            decode_escapes,
            batch_size,
            skip_malformed,
            strict,
            tables,
            exclude,
            progress,
            dry_run,
            json,
            fail_fast,
        } => convert::run(convert::ConvertArgs {
            file,
            output,
            decode_escapes,
            batch_size: batch_size as usize,
            skip_malformed,
            strict,
            tables: split_list(tables),
            exclude: split_list(exclude).unwrap_or_default(),
            progress,
            dry_run,
            json,
            fail_fast,
        }),
        Commands::Prune {
            dir,
            pattern,
            mode,
            max_days,
            max_size_mb,
            keep_minimum,
            yes,
            json,
        } => prune::run(prune::PruneArgs {
            dir,
            pattern,
            mode,
            max_days,
            max_size_mb,
            keep_minimum,
            yes,
            json,
        }),
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "pgdump-rewriter",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}

/// Split a comma-separated CLI list, dropping blanks.
fn split_list(list: Option<String>) -> Option<Vec<String>> {
    list.map(|s| {
        s.split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    })
}
