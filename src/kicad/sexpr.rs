//! Minimal S-expression scanning.
//!
//! KiCad stores symbols, footprints and library tables as S-expressions. This
//! module never builds a syntax tree: editing only needs the byte spans of
//! expressions and the atoms that directly follow a head token, so the
//! original formatting of everything we don't touch is preserved.
//!
//! Quoted strings may contain parentheses and `\"` / `\\` escapes. All
//! delimiters are ASCII, so scanning bytes is safe on UTF-8 input.

use std::ops::Range;

use super::{KicadError, KicadResult};

/// A parenthesised expression located in a source string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    /// Head token (first atom after the opening parenthesis).
    pub head: String,
    /// Byte range from `(` through the matching `)` inclusive.
    pub span: Range<usize>,
}

impl Expr {
    /// Returns the source text of this expression.
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.clone()]
    }

    /// Byte offset of the closing parenthesis.
    #[must_use]
    pub const fn close(&self) -> usize {
        self.span.end - 1
    }
}

/// Returns the byte offset of the parenthesis matching the one at `open`.
///
/// # Errors
///
/// Returns [`KicadError::Unbalanced`] if the input ends first.
pub fn matching_paren(text: &str, open: usize) -> KicadResult<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in text.as_bytes().iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }

    Err(KicadError::unbalanced(open))
}

/// Returns all top-level expressions in `text`, in order.
///
/// # Errors
///
/// Returns an error if any expression is unbalanced.
pub fn top_level(text: &str) -> KicadResult<Vec<Expr>> {
    scan_children(text, 0, text.len())
}

/// Returns the first top-level expression in `text`.
///
/// # Errors
///
/// Returns [`KicadError::Empty`] if there is none, or an error if it is unbalanced.
pub fn root(text: &str) -> KicadResult<Expr> {
    let open = text.find('(').ok_or(KicadError::Empty)?;
    let close = matching_paren(text, open)?;
    Ok(Expr {
        head: head_token(text, open),
        span: open..close + 1,
    })
}

/// Returns the direct child expressions of `parent`.
///
/// # Errors
///
/// Returns an error if a child expression is unbalanced.
pub fn children(text: &str, parent: &Expr) -> KicadResult<Vec<Expr>> {
    scan_children(text, parent.span.start + 1, parent.close())
}

/// Returns the byte offset of every `(` that is not inside a quoted string.
#[must_use]
pub fn open_parens(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = read_string(text, i).1,
            b'(' => {
                found.push(i);
                i += 1;
            }
            _ => i += 1,
        }
    }

    found
}

/// Returns the atoms that directly follow the head of `expr`.
///
/// Quoted atoms are unescaped. Scanning stops at the first nested expression,
/// so for `(symbol "R" (pin ...))` this yields `["R"]`.
#[must_use]
pub fn leading_atoms(text: &str, expr: &Expr) -> Vec<String> {
    let bytes = text.as_bytes();
    let end = expr.close();
    let mut atoms = Vec::new();
    let mut i = expr.span.start + 1 + expr.head.len();

    while i < end {
        match bytes[i] {
            b'(' | b')' => break,
            b if b.is_ascii_whitespace() => i += 1,
            b'"' => {
                let (value, next) = read_string(text, i);
                atoms.push(value);
                i = next;
            }
            _ => {
                let start = i;
                while i < end && !is_delimiter(bytes[i]) {
                    i += 1;
                }
                atoms.push(text[start..i].to_string());
            }
        }
    }

    atoms
}

/// Returns the first atom following the head of `expr`, if any.
#[must_use]
pub fn name(text: &str, expr: &Expr) -> Option<String> {
    leading_atoms(text, expr).into_iter().next()
}

/// Quotes and escapes a string for inclusion in an S-expression.
#[must_use]
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Inserts `block` as the last child of `parent`, on its own line.
///
/// Trailing whitespace before the closing parenthesis is normalised so
/// repeated inserts do not accumulate blank lines.
pub fn append_child(text: &mut String, parent: &Expr, block: &str) {
    let close = parent.close();
    let before = text[..close].trim_end().len();
    text.replace_range(before..close, &format!("\n  {block}\n"));
}

/// Removes `expr` together with the indentation and line break around it.
pub fn remove_expr(text: &mut String, expr: &Expr) {
    let bytes = text.as_bytes();
    let mut start = expr.span.start;
    while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
        start -= 1;
    }
    let mut end = expr.span.end;
    while end < bytes.len() && matches!(bytes[end], b' ' | b'\t') {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'\n' {
        end += 1;
    } else if start > 0 && bytes[start - 1] == b'\n' {
        start -= 1;
    }
    text.replace_range(start..end, "");
}

fn scan_children(text: &str, from: usize, to: usize) -> KicadResult<Vec<Expr>> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();
    let mut i = from;

    while i < to {
        match bytes[i] {
            b'"' => i = read_string(text, i).1,
            b'(' => {
                let close = matching_paren(text, i)?;
                found.push(Expr {
                    head: head_token(text, i),
                    span: i..close + 1,
                });
                i = close + 1;
            }
            _ => i += 1,
        }
    }

    Ok(found)
}

fn head_token(text: &str, open: usize) -> String {
    let bytes = text.as_bytes();
    let start = open + 1;
    let mut end = start;
    while end < bytes.len() && !is_delimiter(bytes[end]) {
        end += 1;
    }
    text[start..end].to_string()
}

/// Reads the quoted string starting at `quote`; returns the unescaped value
/// and the offset just past the closing quote.
fn read_string(text: &str, quote: usize) -> (String, usize) {
    let mut value = String::new();
    let mut escaped = false;

    for (offset, c) in text[quote + 1..].char_indices() {
        if escaped {
            value.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return (value, quote + 1 + offset + 1);
        } else {
            value.push(c);
        }
    }

    (value, text.len())
}

const fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'(' | b')' | b'"')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_paren_skips_strings() {
        let text = r#"(a "x)y" (b "\")") c)"#;
        assert_eq!(matching_paren(text, 0).unwrap(), text.len() - 1);
    }

    #[test]
    fn unbalanced_is_reported() {
        let err = matching_paren("(a (b)", 0).unwrap_err();
        assert!(matches!(err, KicadError::Unbalanced { offset: 0 }));
    }

    #[test]
    fn children_and_names() {
        let text = r#"(lib (symbol "R" (pin 1)) (symbol "C_Small" (pin 2)) (version 7))"#;
        let root = root(text).unwrap();
        assert_eq!(root.head, "lib");

        let kids = children(text, &root).unwrap();
        let heads: Vec<_> = kids.iter().map(|e| e.head.as_str()).collect();
        assert_eq!(heads, ["symbol", "symbol", "version"]);
        assert_eq!(name(text, &kids[1]).as_deref(), Some("C_Small"));
        assert_eq!(name(text, &kids[2]).as_deref(), Some("7"));
    }

    #[test]
    fn leading_atoms_unescape() {
        let text = r#"(property "Value" "10\"k" (at 0 0 0))"#;
        let expr = root(text).unwrap();
        assert_eq!(leading_atoms(text, &expr), ["Value", "10\"k"]);
    }

    #[test]
    fn open_parens_outside_strings() {
        let text = r#"(a "(b" (c "\"(" ) "#;
        assert_eq!(open_parens(text), [0, 8]);
    }

    #[test]
    fn quote_escapes() {
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[test]
    fn append_child_keeps_balance() {
        let mut text = "(lib (version 1)\n)\n".to_string();
        let parent = root(&text).unwrap();
        append_child(&mut text, &parent, "(symbol \"X\")");
        assert_eq!(text, "(lib (version 1)\n  (symbol \"X\")\n)\n");
        assert!(root(&text).is_ok());
    }

    #[test]
    fn remove_expr_drops_line() {
        let mut text = "(lib\n  (a 1)\n  (b 2)\n)".to_string();
        let kids = children(&text, &root(&text).unwrap()).unwrap();
        remove_expr(&mut text, &kids[0]);
        assert_eq!(text, "(lib\n  (b 2)\n)");
    }

    #[test]
    fn root_of_empty_text() {
        assert!(matches!(root("  \n"), Err(KicadError::Empty)));
    }
}
