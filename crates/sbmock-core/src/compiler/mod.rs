//! Parser backend abstraction for the mocking transforms.
//!
//! The extractor and the automock transform never call SWC directly; they
//! receive a [`ParserBackend`] and work on the [`ParsedModule`] it returns.
//!
//! ## Usage
//!
//! ```ignore
//! use sbmock_core::compiler::{ParserBackend, SwcParser};
//!
//! let parser = SwcParser::new();
//! let parsed = parser.parse("export const x = 1;", Path::new("x.ts"))?;
//! let output = parsed.emit(&parsed.module, true)?;
//! ```

pub mod swc;

pub use swc::{ParsedModule, SwcParser};

use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Error from parsing or emitting a module.
#[derive(Debug, Clone)]
pub struct CompilerError {
    /// Error code.
    pub code: &'static str,
    /// Human-readable error message.
    pub message: String,
}

impl CompilerError {
    /// Create a new compiler error.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a parse error.
    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new("COMPILER_PARSE_ERROR", message)
    }

    /// Create an emit error.
    #[must_use]
    pub fn emit_error(message: impl Into<String>) -> Self {
        Self::new("COMPILER_EMIT_ERROR", message)
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CompilerError {}

/// Generated code plus an optional source map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformOutput {
    /// Generated code.
    pub code: String,
    /// Source map JSON (if generated).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_map: Option<String>,
}

impl TransformOutput {
    /// Create an output with code only.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            source_map: None,
        }
    }

    /// Set the source map.
    #[must_use]
    pub fn with_source_map(mut self, source_map: impl Into<String>) -> Self {
        self.source_map = Some(source_map.into());
        self
    }
}

/// Parser backend trait.
///
/// Implementations turn source text into a module AST. The trait is
/// `Send + Sync` so plugins holding one can be shared across threads.
pub trait ParserBackend: Send + Sync {
    /// Get the backend name (e.g., "swc").
    fn name(&self) -> &'static str;

    /// Parse `source` as an ES module.
    ///
    /// `filename` selects the dialect (TypeScript, JSX) by extension.
    fn parse(&self, source: &str, filename: &Path) -> Result<ParsedModule, CompilerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiler_error_display() {
        let err = CompilerError::parse_error("Unexpected token");
        assert_eq!(err.to_string(), "COMPILER_PARSE_ERROR: Unexpected token");
    }

    #[test]
    fn test_transform_output_builder() {
        let out = TransformOutput::new("x").with_source_map("{}");
        assert_eq!(out.code, "x");
        assert_eq!(out.source_map.as_deref(), Some("{}"));
    }
}
