//! Lexical helpers for statement text: named-placeholder rewriting and blank detection.
//!
//! The scanner skips string literals, quoted identifiers, comments and dollar-quoted bodies
//! with a lightweight state machine; it is not a SQL parser.

mod parsers;
mod scanner;

use scanner::{for_each_code_byte, scan_identifier};

/// Statement text rewritten from `:name` placeholders to positional `$n` ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalSql {
    pub sql: String,
    /// Placeholder names (with their `:` prefix), index `n - 1` for `$n`.
    pub names: Vec<String>,
}

impl PositionalSql {
    /// 1-based position of a placeholder name.
    #[must_use]
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name).map(|i| i + 1)
    }
}

/// Rewrite `:name` placeholders as `$1`, `$2`, ... in order of first appearance.
///
/// A name used more than once maps to the same position. `::` casts are left alone.
#[must_use]
pub fn named_to_positional(sql: &str) -> PositionalSql {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut names: Vec<String> = Vec::new();
    let mut copied = 0;

    for_each_code_byte(bytes, |idx| {
        if bytes[idx] != b':' {
            return None;
        }
        if bytes.get(idx + 1) == Some(&b':') {
            return Some(idx + 2);
        }
        let end = scan_identifier(bytes, idx + 1)?;
        let name = &sql[idx..end];
        let position = match names.iter().position(|n| n == name) {
            Some(i) => i + 1,
            None => {
                names.push(name.to_string());
                names.len()
            }
        };
        out.push_str(&sql[copied..idx]);
        out.push('$');
        out.push_str(&position.to_string());
        copied = end;
        Some(end)
    });
    out.push_str(&sql[copied..]);

    PositionalSql { sql: out, names }
}

/// Whether `sql` contains nothing but whitespace and comments.
#[must_use]
pub fn is_blank(sql: &str) -> bool {
    let bytes = sql.as_bytes();
    let mut blank = true;
    for_each_code_byte(bytes, |idx| {
        if !bytes[idx].is_ascii_whitespace() {
            blank = false;
            // Nothing else to learn; jump to the end.
            return Some(bytes.len());
        }
        None
    });
    blank
}
