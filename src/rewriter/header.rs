//! COPY header recognition.
//!
//! A header line has the shape `COPY <table> (<col>, <col>, ...) FROM stdin;`.
//! Instead of a regular expression the line is walked with a small scanner:
//! keyword, identifier token, parenthesized column list, suffix. Anything that
//! does not follow the grammar exactly is `NotAHeader`, never an error.

/// Table identifier and column list taken from a COPY header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyHeader {
    /// Identifier exactly as written, possibly schema-qualified and quoted
    pub table: String,
    /// Column names in declaration order, trimmed but otherwise verbatim
    pub columns: Vec<String>,
}

impl CopyHeader {
    /// Unquoted final segment of the identifier (`"public"."Users"` -> `Users`).
    pub fn bare_table(&self) -> String {
        let segment = split_outside_quotes(self.table.as_bytes(), b'.')
            .pop()
            .unwrap_or_default();
        unquote(segment)
    }
}

/// Outcome of offering a line to the header recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderMatch {
    Copy(CopyHeader),
    NotAHeader,
}

/// Recognize a COPY header line. Trailing `\n` / `\r\n` is ignored.
pub fn parse_copy_header(line: &[u8]) -> HeaderMatch {
    match scan_header(trim_line_end(line)) {
        Some(header) => HeaderMatch::Copy(header),
        None => HeaderMatch::NotAHeader,
    }
}

/// True for lines that open with the COPY keyword, whether or not they parse.
pub fn looks_like_copy(line: &[u8]) -> bool {
    line.len() > 4 && line[..4].eq_ignore_ascii_case(b"COPY") && line[4] == b' '
}

pub(crate) fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn scan_header(line: &[u8]) -> Option<CopyHeader> {
    let mut scanner = Scanner::new(line);

    scanner.keyword(b"COPY")?;
    scanner.spaces()?;
    let table = scanner.identifier()?;
    scanner.spaces()?;
    let list = scanner.parenthesized()?;
    scanner.spaces()?;
    scanner.keyword(b"FROM")?;
    scanner.spaces()?;
    scanner.keyword(b"stdin")?;
    scanner.byte(b';')?;

    if !scanner.rest().iter().all(u8::is_ascii_whitespace) {
        return None;
    }

    let columns = parse_column_list(list)?;
    let table = String::from_utf8(table.to_vec()).ok()?;

    Some(CopyHeader { table, columns })
}

/// Split on commas outside double quotes and trim each name.
fn parse_column_list(list: &[u8]) -> Option<Vec<String>> {
    split_outside_quotes(list, b',')
        .into_iter()
        .map(|raw| {
            let name = raw.trim_ascii();
            if name.is_empty() {
                return None;
            }
            String::from_utf8(name.to_vec()).ok()
        })
        .collect()
}

fn split_outside_quotes(input: &[u8], sep: u8) -> Vec<&[u8]> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (i, &b) in input.iter().enumerate() {
        if b == b'"' {
            in_quotes = !in_quotes;
        } else if b == sep && !in_quotes {
            parts.push(&input[start..i]);
            start = i + 1;
        }
    }
    parts.push(&input[start..]);
    parts
}

fn unquote(segment: &[u8]) -> String {
    let text = String::from_utf8_lossy(segment);
    match text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        Some(inner) => inner.replace("\"\"", "\""),
        None => text.into_owned(),
    }
}

struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// ASCII case-insensitive keyword.
    fn keyword(&mut self, word: &[u8]) -> Option<()> {
        let candidate = self.rest().get(..word.len())?;
        if !candidate.eq_ignore_ascii_case(word) {
            return None;
        }
        self.pos += word.len();
        Some(())
    }

    fn byte(&mut self, expected: u8) -> Option<()> {
        if self.peek()? != expected {
            return None;
        }
        self.pos += 1;
        Some(())
    }

    /// One or more spaces.
    fn spaces(&mut self) -> Option<()> {
        let start = self.pos;
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
        (self.pos > start).then_some(())
    }

    /// Run of non-whitespace bytes; double-quoted sections may hold anything.
    fn identifier(&mut self) -> Option<&'a [u8]> {
        let start = self.pos;
        let mut in_quotes = false;

        while let Some(b) = self.peek() {
            if b == b'"' {
                in_quotes = !in_quotes;
            } else if !in_quotes && (b.is_ascii_whitespace() || b == b'(') {
                break;
            }
            self.pos += 1;
        }

        if in_quotes || self.pos == start {
            return None;
        }
        Some(&self.input[start..self.pos])
    }

    /// `( ... )` with quote-aware search for the closing parenthesis.
    fn parenthesized(&mut self) -> Option<&'a [u8]> {
        self.byte(b'(')?;
        let start = self.pos;
        let mut in_quotes = false;

        while let Some(b) = self.peek() {
            match b {
                b'"' => in_quotes = !in_quotes,
                b')' if !in_quotes => {
                    let inner = &self.input[start..self.pos];
                    self.pos += 1;
                    return Some(inner);
                }
                _ => {}
            }
            self.pos += 1;
        }
        None
    }
}
