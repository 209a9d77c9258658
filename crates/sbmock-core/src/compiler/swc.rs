//! SWC parser backend.
//!
//! Parses JavaScript/TypeScript (with JSX) into an `swc_ecma_ast::Module`
//! and emits modules back to code with a source map.

#![allow(clippy::default_trait_access)]

use super::{CompilerError, ParserBackend, TransformOutput};
use std::path::Path;
use swc_common::{
    comments::SingleThreadedComments, sync::Lrc, BytePos, FileName, SourceMap, SourceMapper,
    Span,
};
use swc_ecma_ast::{EsVersion, Module};
use swc_ecma_codegen::{text_writer::JsWriter, Emitter};
use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax, TsSyntax};

/// SWC-based parser backend.
///
/// Stateless; each call to `parse` gets its own source map.
#[derive(Debug, Clone, Default)]
pub struct SwcParser {
    _private: (),
}

impl SwcParser {
    /// Create a new SWC parser.
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn is_typescript(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext.to_lowercase().as_str(), "ts" | "tsx" | "mts" | "cts"))
    }

    fn is_tsx(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tsx"))
    }

    /// Pick the syntax for a file.
    ///
    /// Plain `.ts` disables JSX so `<T>value` casts and generic arrows parse;
    /// every JavaScript flavour enables it.
    fn syntax_for(path: &Path) -> Syntax {
        if Self::is_typescript(path) {
            Syntax::Typescript(TsSyntax {
                tsx: Self::is_tsx(path),
                decorators: true,
                ..Default::default()
            })
        } else {
            Syntax::Es(EsSyntax {
                jsx: true,
                decorators: true,
                ..Default::default()
            })
        }
    }
}

impl ParserBackend for SwcParser {
    fn name(&self) -> &'static str {
        "swc"
    }

    fn parse(&self, source: &str, filename: &Path) -> Result<ParsedModule, CompilerError> {
        let cm: Lrc<SourceMap> = Default::default();
        let name = filename
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("input.js")
            .to_string();
        let fm = cm.new_source_file(Lrc::new(FileName::Custom(name)), source.to_string());

        let comments = SingleThreadedComments::default();
        let lexer = Lexer::new(
            Self::syntax_for(filename),
            EsVersion::EsNext,
            StringInput::from(&*fm),
            Some(&comments),
        );

        let mut parser = Parser::new_from(lexer);
        let module = parser.parse_module().map_err(|e| {
            CompilerError::parse_error(format!(
                "Failed to parse {}: {:?}",
                filename.display(),
                e.kind()
            ))
        })?;

        let errors: Vec<String> = parser
            .take_errors()
            .into_iter()
            .map(|e| format!("{:?}", e.kind()))
            .collect();
        if !errors.is_empty() {
            return Err(CompilerError::parse_error(format!(
                "Failed to parse {}: {}",
                filename.display(),
                errors.join(", ")
            )));
        }

        Ok(ParsedModule {
            module,
            start_pos: fm.start_pos,
            cm,
            comments,
        })
    }
}

/// A parsed module together with the source map and comments it came from.
pub struct ParsedModule {
    /// The module AST.
    pub module: Module,
    start_pos: BytePos,
    cm: Lrc<SourceMap>,
    comments: SingleThreadedComments,
}

impl ParsedModule {
    /// Byte range of `span` within the original source text.
    #[must_use]
    pub fn byte_range(&self, span: Span) -> std::ops::Range<usize> {
        let lo = span.lo.0.saturating_sub(self.start_pos.0) as usize;
        let hi = span.hi.0.saturating_sub(self.start_pos.0) as usize;
        lo..hi
    }

    /// Original source text covered by `span`.
    #[must_use]
    pub fn snippet(&self, span: Span) -> Option<String> {
        self.cm.span_to_snippet(span).ok()
    }

    /// Emit `module` as code, mapping positions back to the parsed source.
    ///
    /// Nodes carrying dummy spans (generated code) have no mapping.
    pub fn emit(&self, module: &Module, source_map: bool) -> Result<TransformOutput, CompilerError> {
        let mut buf = Vec::new();
        let mut src_map_buf = Vec::new();

        {
            let writer = JsWriter::new(
                self.cm.clone(),
                "\n",
                &mut buf,
                if source_map {
                    Some(&mut src_map_buf)
                } else {
                    None
                },
            );

            let mut emitter = Emitter {
                cfg: swc_ecma_codegen::Config::default().with_target(EsVersion::EsNext),
                cm: self.cm.clone(),
                comments: Some(&self.comments),
                wr: writer,
            };

            emitter
                .emit_module(module)
                .map_err(|e| CompilerError::emit_error(format!("Failed to emit: {e}")))?;
        }

        let code = String::from_utf8(buf)
            .map_err(|e| CompilerError::emit_error(format!("Invalid UTF-8 output: {e}")))?;

        let mut output = TransformOutput::new(code);
        if source_map {
            let srcmap = self.cm.build_source_map(&src_map_buf);
            let mut map_buf = Vec::new();
            srcmap.to_writer(&mut map_buf).map_err(|e| {
                CompilerError::emit_error(format!("Failed to write source map: {e}"))
            })?;
            let map = String::from_utf8(map_buf).map_err(|e| {
                CompilerError::emit_error(format!("Invalid UTF-8 source map: {e}"))
            })?;
            output = output.with_source_map(map);
        }
        Ok(output)
    }
}

impl std::fmt::Debug for ParsedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedModule")
            .field("items", &self.module.body.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_swc_parser_name() {
        assert_eq!(SwcParser::new().name(), "swc");
    }

    #[test]
    fn test_is_typescript() {
        assert!(SwcParser::is_typescript(&PathBuf::from("app.ts")));
        assert!(SwcParser::is_typescript(&PathBuf::from("app.tsx")));
        assert!(SwcParser::is_typescript(&PathBuf::from("app.mts")));
        assert!(!SwcParser::is_typescript(&PathBuf::from("app.js")));
        assert!(!SwcParser::is_typescript(&PathBuf::from("app.jsx")));
    }

    #[test]
    fn test_parse_tsx_and_jsx() {
        let parser = SwcParser::new();
        let tsx = "const el = <div>{name as string}</div>;";
        assert!(parser.parse(tsx, Path::new("preview.tsx")).is_ok());

        let jsx = "export const el = <span />;";
        assert!(parser.parse(jsx, Path::new("preview.js")).is_ok());
    }

    #[test]
    fn test_parse_ts_generic_cast() {
        let parser = SwcParser::new();
        let source = "const n = <number>value; export const id = <T,>(x: T) => x;";
        assert!(parser.parse(source, Path::new("util.ts")).is_ok());
    }

    #[test]
    fn test_parse_error() {
        let parser = SwcParser::new();
        let err = parser.parse("const x = {", Path::new("x.js")).unwrap_err();
        assert!(err.code.contains("PARSE"));
    }

    #[test]
    fn test_byte_range_and_snippet() {
        let parser = SwcParser::new();
        let parsed = parser.parse("const abc = 1;", Path::new("x.js")).unwrap();
        let swc_ecma_ast::ModuleItem::Stmt(stmt) = &parsed.module.body[0] else {
            panic!("expected a statement");
        };
        let span = swc_common::Spanned::span(stmt);
        assert_eq!(parsed.byte_range(span), 0..14);
        assert_eq!(parsed.snippet(span).as_deref(), Some("const abc = 1;"));
    }

    #[test]
    fn test_emit_with_source_map() {
        let parser = SwcParser::new();
        let parsed = parser
            .parse("export const x: number = 42;", Path::new("x.ts"))
            .unwrap();
        let output = parsed.emit(&parsed.module, true).unwrap();

        assert!(output.code.contains("export const x"));
        let map = output.source_map.unwrap();
        assert!(map.contains("\"version\":3"));
        assert!(map.contains("x.ts"));
    }
}
