use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub const WRITER_BUFFER_SIZE: usize = 256 * 1024;
pub const STMT_BUFFER_COUNT: usize = 100;

/// Newline-delimited statement sink with a periodic flush.
pub struct StatementWriter<W: Write> {
    writer: BufWriter<W>,
    write_count: usize,
    max_stmt_buffer: usize,
    statements_written: u64,
}

impl<W: Write> StatementWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(WRITER_BUFFER_SIZE, inner),
            write_count: 0,
            max_stmt_buffer: STMT_BUFFER_COUNT,
            statements_written: 0,
        }
    }

    pub fn write_statement(&mut self, stmt: &[u8]) -> io::Result<()> {
        self.writer.write_all(stmt)?;
        self.writer.write_all(b"\n")?;
        self.statements_written += 1;

        self.write_count += 1;
        if self.write_count >= self.max_stmt_buffer {
            self.write_count = 0;
            self.writer.flush()?;
        }

        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.write_count = 0;
        self.writer.flush()
    }

    pub fn statements_written(&self) -> u64 {
        self.statements_written
    }

    /// Flush and hand back the underlying sink.
    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}

/// Open the output destination: a file (parent directories created), stdout
/// when no path is given, or a sink for dry runs.
pub fn open_output(path: Option<&Path>, dry_run: bool) -> io::Result<Box<dyn Write>> {
    if dry_run {
        return Ok(Box::new(io::sink()));
    }
    match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            Ok(Box::new(File::create(path)?))
        }
        None => Ok(Box::new(io::stdout())),
    }
}
