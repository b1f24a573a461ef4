//! Rewrites PostgreSQL plain-text dump `COPY ... FROM stdin` blocks into
//! `INSERT` statements.
//!
//! The input is read once, line by line. Outside a block every line is
//! offered to the header recognizer and otherwise ignored; inside a block
//! lines are rows until the `\.` terminator, at which point the block's
//! statements are written and flushed. Only the open block is held in memory.

pub mod defects;
pub mod emitter;
pub mod header;
pub mod row;
pub mod value;

pub use defects::{DefectLog, DefectPolicy, RewriteDefect, RewriteError};
pub use emitter::StatementEmitter;
pub use header::{looks_like_copy, parse_copy_header, CopyHeader, HeaderMatch};
pub use row::{classify_line, BlockLine, Row, TERMINATOR};
pub use value::{decode_escapes, encode_field, EscapeMode, SqlLiteral, NULL_SENTINEL};

use crate::compression::Compression;
use crate::progress::ProgressReader;
use crate::writer::{open_output, StatementWriter, WRITER_BUFFER_SIZE};
use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A COPY block being collected: header plus the rows seen so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyBlock {
    pub header: CopyHeader,
    pub rows: Vec<Row>,
}

impl CopyBlock {
    pub fn new(header: CopyHeader) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }
}

/// Include/exclude lists matched against a block's table identifier, either
/// verbatim or by its unquoted final segment.
#[derive(Debug, Clone, Default)]
pub struct TableFilter {
    include: Option<HashSet<String>>,
    exclude: HashSet<String>,
}

impl TableFilter {
    pub fn new(include: Option<Vec<String>>, exclude: Vec<String>) -> Self {
        Self {
            include: include
                .filter(|tables| !tables.is_empty())
                .map(|tables| tables.into_iter().collect()),
            exclude: exclude.into_iter().collect(),
        }
    }

    pub fn accepts(&self, header: &CopyHeader) -> bool {
        let bare = header.bare_table();
        let listed = |set: &HashSet<String>| set.contains(&header.table) || set.contains(&bare);

        if listed(&self.exclude) {
            return false;
        }
        self.include.as_ref().map_or(true, listed)
    }
}

/// Counters for one rewrite run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RewriteStats {
    pub lines_read: u64,
    pub lines_skipped: u64,
    /// Lines starting with `COPY ` that did not parse as a header
    pub near_miss_headers: u64,
    pub blocks_converted: u64,
    pub blocks_filtered: u64,
    pub rows_converted: u64,
    pub rows_skipped: u64,
    pub statements_written: u64,
    pub defects_total: u64,
    pub defects: Vec<RewriteDefect>,
}

struct OpenBlock {
    block: CopyBlock,
    header_line: u64,
    filtered: bool,
}

enum State {
    Outside,
    InsideBlock(OpenBlock),
}

/// Streaming COPY-to-INSERT state machine.
pub struct Rewriter {
    state: State,
    emitter: StatementEmitter,
    policy: DefectPolicy,
    filter: TableFilter,
    defects: DefectLog,
    stats: RewriteStats,
}

impl Default for Rewriter {
    fn default() -> Self {
        Self::new(StatementEmitter::default())
    }
}

impl Rewriter {
    pub fn new(emitter: StatementEmitter) -> Self {
        Self {
            state: State::Outside,
            emitter,
            policy: DefectPolicy::default(),
            filter: TableFilter::default(),
            defects: DefectLog::default(),
            stats: RewriteStats::default(),
        }
    }

    pub fn with_policy(mut self, policy: DefectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_filter(mut self, filter: TableFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Whether a block is currently open.
    pub fn in_block(&self) -> bool {
        matches!(self.state, State::InsideBlock(_))
    }

    pub fn stats(&self) -> &RewriteStats {
        &self.stats
    }

    /// Rewrite everything `reader` yields into `out`.
    pub fn rewrite<R: BufRead, W: Write>(
        mut self,
        mut reader: R,
        out: &mut StatementWriter<W>,
    ) -> Result<RewriteStats, RewriteError> {
        let mut line = Vec::with_capacity(8 * 1024);
        let mut line_no = 0;

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            line_no += 1;
            self.feed_line(line_no, &line, out)?;
        }

        out.flush()?;
        self.finish()
    }

    /// Advance the state machine by one input line (1-based `line_no`).
    pub fn feed_line<W: Write>(
        &mut self,
        line_no: u64,
        line: &[u8],
        out: &mut StatementWriter<W>,
    ) -> Result<(), RewriteError> {
        let line = header::trim_line_end(line);
        self.stats.lines_read += 1;

        self.state = match std::mem::replace(&mut self.state, State::Outside) {
            State::Outside => self.outside_line(line_no, line),
            State::InsideBlock(open) => self.block_line(open, line_no, line, out)?,
        };
        Ok(())
    }

    /// End of input. An open block at this point is a defect.
    pub fn finish(mut self) -> Result<RewriteStats, RewriteError> {
        if let State::InsideBlock(open) = std::mem::replace(&mut self.state, State::Outside) {
            self.report(RewriteDefect::UnterminatedBlock {
                table: open.block.header.table,
                header_line: open.header_line,
                rows: open.block.rows.len(),
            })?;
        }

        let mut stats = self.stats;
        stats.defects_total = self.defects.total();
        stats.defects = self.defects.into_defects();
        Ok(stats)
    }

    fn outside_line(&mut self, line_no: u64, line: &[u8]) -> State {
        match parse_copy_header(line) {
            HeaderMatch::Copy(header) => {
                let filtered = !self.filter.accepts(&header);
                debug!(
                    line = line_no,
                    table = %header.table,
                    columns = header.columns.len(),
                    filtered,
                    "COPY block opened"
                );
                State::InsideBlock(OpenBlock {
                    block: CopyBlock::new(header),
                    header_line: line_no,
                    filtered,
                })
            }
            HeaderMatch::NotAHeader => {
                if looks_like_copy(line) {
                    warn!(line = line_no, "COPY line does not match header grammar, skipped");
                    self.stats.near_miss_headers += 1;
                }
                self.stats.lines_skipped += 1;
                State::Outside
            }
        }
    }

    fn block_line<W: Write>(
        &mut self,
        mut open: OpenBlock,
        line_no: u64,
        line: &[u8],
        out: &mut StatementWriter<W>,
    ) -> Result<State, RewriteError> {
        let row = match classify_line(line) {
            BlockLine::Terminator => {
                self.close_block(open, out)?;
                return Ok(State::Outside);
            }
            BlockLine::Data(row) => row,
        };

        if open.filtered {
            return Ok(State::InsideBlock(open));
        }

        let expected = open.block.header.columns.len();
        if row.len() == expected {
            open.block.rows.push(row);
        } else {
            self.report(RewriteDefect::ArityMismatch {
                line: line_no,
                table: open.block.header.table.clone(),
                expected,
                found: row.len(),
            })?;
            self.stats.rows_skipped += 1;
        }
        Ok(State::InsideBlock(open))
    }

    fn close_block<W: Write>(
        &mut self,
        open: OpenBlock,
        out: &mut StatementWriter<W>,
    ) -> Result<(), RewriteError> {
        if open.filtered {
            self.stats.blocks_filtered += 1;
            debug!(table = %open.block.header.table, "COPY block filtered out");
            return Ok(());
        }

        let written = self.emitter.emit_block(&open.block, out)?;
        out.flush()?;

        self.stats.blocks_converted += 1;
        self.stats.rows_converted += open.block.rows.len() as u64;
        self.stats.statements_written += written;
        debug!(
            table = %open.block.header.table,
            rows = open.block.rows.len(),
            statements = written,
            "COPY block closed"
        );
        Ok(())
    }

    fn report(&mut self, defect: RewriteDefect) -> Result<(), RewriteError> {
        match self.policy {
            DefectPolicy::Abort => Err(RewriteError::Defect(defect)),
            DefectPolicy::Skip => {
                warn!("{}", defect);
                self.defects.record(defect);
                Ok(())
            }
        }
    }
}

/// Configuration for a file-to-file rewrite
#[derive(Debug, Clone)]
pub struct RewriteConfig {
    /// Dump to read (.gz, .bz2, .xz, .zst decompressed transparently)
    pub input: PathBuf,
    /// Destination for the statements (None for stdout)
    pub output: Option<PathBuf>,
    pub escape_mode: EscapeMode,
    /// Rows per INSERT statement
    pub batch_size: usize,
    pub policy: DefectPolicy,
    pub filter: TableFilter,
    /// Parse and count without writing anything
    pub dry_run: bool,
    /// Show a byte progress bar on stderr
    pub progress: bool,
}

impl RewriteConfig {
    pub fn new(input: PathBuf, output: Option<PathBuf>) -> Self {
        Self {
            input,
            output,
            escape_mode: EscapeMode::default(),
            batch_size: 1,
            policy: DefectPolicy::default(),
            filter: TableFilter::default(),
            dry_run: false,
            progress: false,
        }
    }
}

/// Rewrite one dump file according to `config`.
pub fn run(config: RewriteConfig) -> anyhow::Result<RewriteStats> {
    let file = File::open(&config.input)
        .with_context(|| format!("cannot open input file: {}", config.input.display()))?;

    if let Some(output) = config.output.as_deref().filter(|_| !config.dry_run) {
        let same = is_same_file(&config.input, output)
            .with_context(|| format!("cannot resolve output path: {}", output.display()))?;
        if same {
            anyhow::bail!("output would overwrite input: {}", output.display());
        }
    }

    let file_size = file.metadata()?.len();
    let compression = Compression::from_path(&config.input);

    let progress_bar = if config.progress {
        let pb = ProgressBar::new(file_size);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%)",
            )?
            .progress_chars("█▓▒░  "),
        );
        Some(pb)
    } else {
        None
    };

    let raw: Box<dyn Read> = match &progress_bar {
        Some(pb) => {
            let pb = pb.clone();
            Box::new(ProgressReader::new(file, move |bytes| pb.set_position(bytes)))
        }
        None => Box::new(file),
    };
    let reader = BufReader::with_capacity(WRITER_BUFFER_SIZE, compression.wrap_reader(raw)?);

    let output = open_output(config.output.as_deref(), config.dry_run).with_context(|| {
        match &config.output {
            Some(path) => format!("cannot create output file: {}", path.display()),
            None => "cannot open stdout".to_string(),
        }
    })?;
    let mut writer = StatementWriter::new(output);

    let emitter = StatementEmitter::new(config.escape_mode).with_batch_size(config.batch_size);
    let rewriter = Rewriter::new(emitter)
        .with_policy(config.policy)
        .with_filter(config.filter);

    let result = rewriter.rewrite(reader, &mut writer);

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    let stats = result.with_context(|| format!("failed to rewrite {}", config.input.display()))?;
    Ok(stats)
}

/// True when `output` already exists and is the same file as `input`.
fn is_same_file(input: &Path, output: &Path) -> io::Result<bool> {
    if !output.exists() {
        return Ok(false);
    }
    Ok(fs::canonicalize(input)? == fs::canonicalize(output)?)
}
