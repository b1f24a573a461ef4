//! INSERT statement generation for completed COPY blocks.

use super::value::{encode_field, EscapeMode};
use super::CopyBlock;
use crate::writer::StatementWriter;
use std::io::{self, Write};

/// Renders the rows of a block as `INSERT INTO ... VALUES ...;` statements.
#[derive(Debug, Clone, Copy)]
pub struct StatementEmitter {
    escape_mode: EscapeMode,
    batch_size: usize,
}

impl Default for StatementEmitter {
    fn default() -> Self {
        Self::new(EscapeMode::default())
    }
}

impl StatementEmitter {
    pub fn new(escape_mode: EscapeMode) -> Self {
        Self {
            escape_mode,
            batch_size: 1,
        }
    }

    /// Group up to `rows` rows of one block into each statement. Zero is
    /// treated as one.
    pub fn with_batch_size(mut self, rows: usize) -> Self {
        self.batch_size = rows.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Build the statements for a block. An empty block yields none.
    pub fn render_block(&self, block: &CopyBlock) -> Vec<Vec<u8>> {
        if block.rows.is_empty() {
            return Vec::new();
        }

        let prefix = format!(
            "INSERT INTO {} ({}) VALUES ",
            block.header.table,
            block.header.columns.join(", ")
        );

        block
            .rows
            .chunks(self.batch_size)
            .map(|chunk| {
                let mut stmt = prefix.as_bytes().to_vec();
                for (i, row) in chunk.iter().enumerate() {
                    if i > 0 {
                        stmt.extend_from_slice(b", ");
                    }
                    stmt.push(b'(');
                    for (j, field) in row.fields().iter().enumerate() {
                        if j > 0 {
                            stmt.extend_from_slice(b", ");
                        }
                        encode_field(field, self.escape_mode).write_to(&mut stmt);
                    }
                    stmt.push(b')');
                }
                stmt.push(b';');
                stmt
            })
            .collect()
    }

    /// Write a block's statements, returning how many were written.
    pub fn emit_block<W: Write>(
        &self,
        block: &CopyBlock,
        out: &mut StatementWriter<W>,
    ) -> io::Result<u64> {
        let statements = self.render_block(block);
        for stmt in &statements {
            out.write_statement(stmt)?;
        }
        Ok(statements.len() as u64)
    }
}
