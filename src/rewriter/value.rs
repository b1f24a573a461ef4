//! Field to SQL literal encoding.
//!
//! Handles:
//! - the `\N` NULL sentinel (distinct from the empty string)
//! - SQL quote doubling (`O'Brien` -> `'O''Brien'`)
//! - optional decoding of COPY text escapes (`\t`, `\n`, `\\`, octal, hex)

use memchr::memchr;
use std::fmt;

/// Raw field value that stands for SQL NULL.
pub const NULL_SENTINEL: &[u8] = b"\\N";

/// How backslash escapes inside a field are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscapeMode {
    /// Copy the field bytes into the literal unchanged
    #[default]
    Passthrough,
    /// Decode COPY text-format escapes first, then quote
    Decode,
}

/// Encoded form of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlLiteral {
    Null,
    /// Unquoted payload; quoting happens when the literal is written
    Text(Vec<u8>),
}

impl SqlLiteral {
    /// Append the SQL form of this literal to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            SqlLiteral::Null => out.extend_from_slice(b"NULL"),
            SqlLiteral::Text(payload) => {
                out.push(b'\'');
                let mut rest = payload.as_slice();
                while let Some(pos) = memchr(b'\'', rest) {
                    out.extend_from_slice(&rest[..=pos]);
                    out.push(b'\'');
                    rest = &rest[pos + 1..];
                }
                out.extend_from_slice(rest);
                out.push(b'\'');
            }
        }
    }

    pub fn to_sql(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }
}

impl fmt::Display for SqlLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.to_sql()))
    }
}

/// Encode one raw field. Total over any input.
pub fn encode_field(raw: &[u8], mode: EscapeMode) -> SqlLiteral {
    if raw == NULL_SENTINEL {
        return SqlLiteral::Null;
    }
    match mode {
        EscapeMode::Passthrough => SqlLiteral::Text(raw.to_vec()),
        EscapeMode::Decode => {
            let decoded = decode_escapes(raw);
            // Decoded text must stay valid UTF-8, otherwise the field is kept as written
            if std::str::from_utf8(&decoded).is_ok() {
                SqlLiteral::Text(decoded)
            } else {
                SqlLiteral::Text(raw.to_vec())
            }
        }
    }
}

/// Decode PostgreSQL COPY text-format escape sequences.
///
/// `\b \f \n \r \t \v` map to their control characters, `\` followed by one
/// to three octal digits or by `x` and one or two hex digits gives that byte,
/// and a backslash before any other byte yields that byte. A lone trailing
/// backslash is kept, as is any numeric escape that decodes to NUL.
pub fn decode_escapes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        let Some(offset) = memchr(b'\\', &raw[i..]) else {
            out.extend_from_slice(&raw[i..]);
            break;
        };
        out.extend_from_slice(&raw[i..i + offset]);
        i += offset;

        let Some(&next) = raw.get(i + 1) else {
            out.push(b'\\');
            break;
        };

        match next {
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'v' => out.push(0x0B),
            b'0'..=b'7' => {
                let (value, used) = read_digits(&raw[i + 1..], 3, 8);
                let end = i + 1 + used;
                push_numeric(&mut out, value, &raw[i..end]);
                i = end;
                continue;
            }
            b'x' => {
                let (value, used) = read_digits(&raw[i + 2..], 2, 16);
                if used == 0 {
                    out.push(b'x');
                } else {
                    let end = i + 2 + used;
                    push_numeric(&mut out, value, &raw[i..end]);
                    i = end;
                    continue;
                }
            }
            other => out.push(other),
        }
        i += 2;
    }

    out
}

/// NUL cannot appear in a PostgreSQL text value; keep the escape as written.
fn push_numeric(out: &mut Vec<u8>, value: u8, escape: &[u8]) {
    if value == 0 {
        out.extend_from_slice(escape);
    } else {
        out.push(value);
    }
}

/// Read up to `max` digits in `radix`, returning the low byte of the value
/// and how many digits were consumed.
fn read_digits(input: &[u8], max: usize, radix: u32) -> (u8, usize) {
    let mut value: u32 = 0;
    let mut used = 0;
    for &b in input.iter().take(max) {
        match (b as char).to_digit(radix) {
            Some(d) => {
                value = value * radix + d;
                used += 1;
            }
            None => break,
        }
    }
    ((value & 0xFF) as u8, used)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql(raw: &[u8], mode: EscapeMode) -> String {
        encode_field(raw, mode).to_string()
    }

    #[test]
    fn test_null_sentinel() {
        assert_eq!(encode_field(b"\\N", EscapeMode::Passthrough), SqlLiteral::Null);
        assert_eq!(sql(b"\\N", EscapeMode::Decode), "NULL");
    }

    #[test]
    fn test_empty_string_is_not_null() {
        assert_eq!(sql(b"", EscapeMode::Passthrough), "''");
        assert_ne!(sql(b"", EscapeMode::Passthrough), sql(b"\\N", EscapeMode::Passthrough));
    }

    #[test]
    fn test_literal_null_text_is_quoted() {
        assert_eq!(sql(b"NULL", EscapeMode::Passthrough), "'NULL'");
        assert_eq!(sql(b"\\\\N", EscapeMode::Passthrough), "'\\\\N'");
    }

    #[test]
    fn test_quote_doubling() {
        assert_eq!(sql(b"O'Brien", EscapeMode::Passthrough), "'O''Brien'");
        assert_eq!(sql(b"'", EscapeMode::Passthrough), "''''");
        assert_eq!(sql(b"a''b'", EscapeMode::Passthrough), "'a''''b'''");
    }

    #[test]
    fn test_passthrough_keeps_backslashes() {
        assert_eq!(sql(b"a\\tb\\\\c", EscapeMode::Passthrough), "'a\\tb\\\\c'");
    }

    #[test]
    fn test_utf8_preserved() {
        assert_eq!(sql("héllo wörld".as_bytes(), EscapeMode::Passthrough), "'héllo wörld'");
        assert_eq!(sql("ภาษาไทย".as_bytes(), EscapeMode::Decode), "'ภาษาไทย'");
    }

    #[test]
    fn test_decode_control_escapes() {
        assert_eq!(decode_escapes(b"a\\tb\\nc\\rd"), b"a\tb\nc\rd");
        assert_eq!(decode_escapes(b"\\b\\f\\v"), vec![0x08, 0x0C, 0x0B]);
    }

    #[test]
    fn test_decode_backslash() {
        assert_eq!(decode_escapes(b"C:\\\\temp"), b"C:\\temp");
        assert_eq!(decode_escapes(b"\\\\N"), b"\\N");
    }

    #[test]
    fn test_decode_octal_and_hex() {
        assert_eq!(decode_escapes(b"\\101\\1"), vec![b'A', 0x01]);
        assert_eq!(decode_escapes(b"\\1018"), b"A8");
        assert_eq!(decode_escapes(b"\\x41\\x7"), vec![b'A', 0x07]);
        assert_eq!(decode_escapes(b"\\xZ"), b"xZ");
    }

    #[test]
    fn test_decode_other_and_trailing() {
        assert_eq!(decode_escapes(b"\\q"), b"q");
        assert_eq!(decode_escapes(b"end\\"), b"end\\");
        assert_eq!(decode_escapes(b"plain"), b"plain");
    }

    #[test]
    fn test_decode_keeps_nul_escapes() {
        assert_eq!(decode_escapes(b"a\\000b"), b"a\\000b");
        assert_eq!(decode_escapes(b"\\x00\\0"), b"\\x00\\0");
        assert_eq!(sql(b"a\\000b", EscapeMode::Decode), "'a\\000b'");
    }

    #[test]
    fn test_decode_falls_back_on_invalid_utf8() {
        assert_eq!(sql(b"\\xff", EscapeMode::Decode), "'\\xff'");
        assert_eq!(sql(b"caf\\351", EscapeMode::Decode), "'caf\\351'");
        // A complete multi-byte sequence spelled with escapes is fine
        assert_eq!(sql(b"caf\\303\\251", EscapeMode::Decode), "'café'");
    }

    #[test]
    fn test_decode_then_quote() {
        assert_eq!(sql(b"it\\'s\\n", EscapeMode::Decode), "'it''s\n'");
    }
}
