//! Footprint (`.kicad_mod`) handling.
//!
//! Footprints are copied verbatim except for their 3D model references:
//! vendor files usually point at an absolute path on the vendor's machine,
//! which is rewritten to the shared model store under a path variable so the
//! library keeps working when moved or used as a submodule.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use super::sexpr;

/// Head tokens of a footprint file (`module` is the pre-6.0 spelling).
pub const FOOTPRINT_HEADS: [&str; 2] = ["footprint", "module"];

/// File extension of a footprint inside a `.pretty` directory.
pub const FOOTPRINT_EXTENSION: &str = "kicad_mod";

/// Matches `(model "PATH"` or `(model PATH` at the start of the input.
fn model_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\(model\s+(?:"((?:[^"\\]|\\.)*)"|([^\s()"]+))"#)
            .unwrap_or_else(|e| unreachable!("model pattern is valid: {e}"))
    })
}

/// Returns the name declared by a footprint file, if any.
#[must_use]
pub fn footprint_name(text: &str) -> Option<String> {
    let root = sexpr::root(text).ok()?;
    if !FOOTPRINT_HEADS.contains(&root.head.as_str()) {
        return None;
    }
    sexpr::name(text, &root).filter(|n| !n.is_empty())
}

/// Rewrites every model reference to `{prefix}/{file name}`.
///
/// Only real `(model ...)` expressions are touched; the same words inside a
/// quoted string such as a description are left alone. Returns the new text
/// and the number of references whose path changed. Applying the same prefix
/// twice changes nothing the second time.
#[must_use]
pub fn rewrite_model_paths(text: &str, prefix: &str) -> (String, usize) {
    let prefix = prefix.trim_end_matches('/');
    let mut out = String::with_capacity(text.len());
    let mut copied = 0usize;
    let mut changed = 0usize;

    for open in sexpr::open_parens(text) {
        let rest = &text[open..];
        if open < copied || !rest.starts_with("(model") {
            continue;
        }
        let Some(caps) = model_regex().captures(rest) else {
            continue;
        };
        let Some(original) = captured_path(&caps) else {
            continue;
        };
        let target = format!("{prefix}/{}", model_file_name(&original));
        if target == original {
            continue;
        }

        out.push_str(&text[copied..open]);
        out.push_str("(model ");
        out.push_str(&sexpr::quote(&target));
        copied = open + caps[0].len();
        changed += 1;
    }

    out.push_str(&text[copied..]);
    (out, changed)
}

/// Returns the last path component, accepting both `/` and `\` separators.
#[must_use]
pub fn model_file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn captured_path<'t>(caps: &Captures<'t>) -> Option<Cow<'t, str>> {
    if let Some(quoted) = caps.get(1) {
        let raw = quoted.as_str();
        if raw.contains('\\') {
            return Some(Cow::Owned(unescape(raw)));
        }
        return Some(Cow::Borrowed(raw));
    }
    caps.get(2).map(|m| Cow::Borrowed(m.as_str()))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
