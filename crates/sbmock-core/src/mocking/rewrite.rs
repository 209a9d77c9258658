//! Rewrite of `sb.mock(import('x'))` into `sb.mock('x')` for the runtime.
//!
//! The edit is a text splice over the original source: only the
//! `import(...)` expression is replaced by its string literal, so the rest
//! of the file (options argument included) is left byte-for-byte intact.

use super::extract::find_mock_calls;
use crate::compiler::{CompilerError, ParserBackend};
use std::path::Path;

/// Result of [`rewrite_sb_mock_import_calls`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutput {
    pub code: String,
    /// Whether any call was rewritten.
    pub changed: bool,
}

/// Replace every `sb.mock(import('x'), ...)` first argument with `'x'`.
///
/// Idempotent: output contains no dynamic-import form, so a second pass
/// finds nothing to change.
pub fn rewrite_sb_mock_import_calls(
    code: &str,
    filename: &Path,
    parser: &dyn ParserBackend,
) -> Result<RewriteOutput, CompilerError> {
    let parsed = parser.parse(code, filename)?;

    let mut edits: Vec<(std::ops::Range<usize>, String)> = find_mock_calls(&parsed.module)
        .into_iter()
        .filter_map(|call| {
            let import_span = call.import_span?;
            let literal = parsed.snippet(call.literal_span)?;
            Some((parsed.byte_range(import_span), literal))
        })
        .collect();

    if edits.is_empty() {
        return Ok(RewriteOutput {
            code: code.to_string(),
            changed: false,
        });
    }

    edits.sort_by_key(|(range, _)| std::cmp::Reverse(range.start));
    let mut out = code.to_string();
    for (range, literal) in edits {
        if range.end > out.len() || !out.is_char_boundary(range.start) {
            return Err(CompilerError::emit_error(format!(
                "Span {range:?} outside of {}",
                filename.display()
            )));
        }
        out.replace_range(range, &literal);
    }

    Ok(RewriteOutput {
        code: out,
        changed: true,
    })
}
