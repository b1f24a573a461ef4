//! Row decoding for lines inside a COPY block.
//!
//! Fields are split on tabs and kept in the dump's own escaped form; turning
//! them into SQL literals is the value encoder's job.

use memchr::memchr_iter;

/// Line that ends a COPY data block.
pub const TERMINATOR: &[u8] = b"\\.";

/// One data row: raw fields in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    fields: Vec<Vec<u8>>,
}

impl Row {
    /// Split a data line on tabs. Empty fields are preserved, so `a\t\tb`
    /// has three fields and an empty line has one.
    pub fn split(line: &[u8]) -> Self {
        let mut fields = Vec::new();
        let mut start = 0;
        for tab in memchr_iter(b'\t', line) {
            fields.push(line[start..tab].to_vec());
            start = tab + 1;
        }
        fields.push(line[start..].to_vec());
        Self { fields }
    }

    pub fn fields(&self) -> &[Vec<u8>] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Classification of a line read while inside a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockLine {
    Terminator,
    Data(Row),
}

/// Classify a line (without its line ending) read inside a COPY block.
pub fn classify_line(line: &[u8]) -> BlockLine {
    if line == TERMINATOR {
        BlockLine::Terminator
    } else {
        BlockLine::Data(Row::split(line))
    }
}
