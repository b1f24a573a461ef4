//! Defects found while rewriting a dump, and the error type of a run.
//!
//! Malformed headers are not defects: they are skipped like any other line.
//! Arity mismatches and unterminated blocks are, because continuing past them
//! silently would emit wrong data.

use serde::Serialize;
use std::fmt;
use std::io;

/// Input problem tied to a position in the dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewriteDefect {
    /// Data row whose field count differs from the header's column count
    ArityMismatch {
        line: u64,
        table: String,
        expected: usize,
        found: usize,
    },
    /// Input ended while a block was still open
    UnterminatedBlock {
        table: String,
        header_line: u64,
        rows: usize,
    },
}

impl fmt::Display for RewriteDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewriteDefect::ArityMismatch {
                line,
                table,
                expected,
                found,
            } => write!(
                f,
                "line {}: row for table {} has {} fields, expected {}",
                line, table, found, expected
            ),
            RewriteDefect::UnterminatedBlock {
                table,
                header_line,
                rows,
            } => write!(
                f,
                "COPY block for table {} opened at line {} is not terminated ({} rows dropped)",
                table, header_line, rows
            ),
        }
    }
}

/// What to do when a defect is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefectPolicy {
    /// Stop the run at the first defect
    #[default]
    Abort,
    /// Record the defect, drop the offending row or block, keep going
    Skip,
}

/// Failure of a rewrite run.
#[derive(Debug)]
pub enum RewriteError {
    Io(io::Error),
    Defect(RewriteDefect),
}

impl fmt::Display for RewriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewriteError::Io(e) => write!(f, "I/O error: {}", e),
            RewriteError::Defect(d) => write!(f, "malformed dump: {}", d),
        }
    }
}

impl std::error::Error for RewriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RewriteError::Io(e) => Some(e),
            RewriteError::Defect(_) => None,
        }
    }
}

impl From<io::Error> for RewriteError {
    fn from(e: io::Error) -> Self {
        RewriteError::Io(e)
    }
}

/// Keeps the first defects of a run and counts the rest.
#[derive(Debug)]
pub struct DefectLog {
    defects: Vec<RewriteDefect>,
    total: u64,
    max_kept: usize,
}

impl Default for DefectLog {
    fn default() -> Self {
        Self::with_limit(100)
    }
}

impl DefectLog {
    pub fn with_limit(max_kept: usize) -> Self {
        Self {
            defects: Vec::new(),
            total: 0,
            max_kept,
        }
    }

    pub fn record(&mut self, defect: RewriteDefect) {
        self.total += 1;
        if self.defects.len() < self.max_kept {
            self.defects.push(defect);
        }
    }

    pub fn defects(&self) -> &[RewriteDefect] {
        &self.defects
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn into_defects(self) -> Vec<RewriteDefect> {
        self.defects
    }
}
