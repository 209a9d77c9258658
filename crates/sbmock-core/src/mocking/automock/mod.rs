//! Automock transform.
//!
//! Rewrites a module so that every export is read from the object returned
//! by the runtime `mockObject(shape, mode)`:
//!
//! ```text
//! export const a = 1;            const a = 1;
//! export { b as c };       =>    ...
//! export default x;              const __sb_default__ = x;
//!                                const __sb_module_shape__ = { __esModule: true, ["a"]: a, ... };
//!                                const __sb_mocked_module__ = globalThis["<accessor>"].mockObject(__sb_module_shape__, "automock");
//!                                const __sb_mocked_0__ = __sb_mocked_module__["a"];
//!                                export { __sb_mocked_0__ as a, ... };
//! ```
//!
//! Export declarations lose their `export` keyword, local export lists are
//! removed, and re-exports become imports under synthetic names. The
//! export surface is unchanged.

mod collect;

pub use collect::{
    collect_exports, item_exports, pattern_names, type_only_names, ExportedBinding,
};

use super::AutomockMode;
use crate::compiler::{CompilerError, ParserBackend, TransformOutput};
use crate::config::DEFAULT_GLOBAL_ACCESSOR;
use std::fmt::Write as _;
use std::path::Path;
use swc_common::{Span, DUMMY_SP};
use swc_ecma_ast::{
    ClassDecl, Decl, DefaultDecl, ExportDefaultDecl, Expr, FnDecl, ModuleDecl, ModuleItem, Stmt,
};
use swc_ecma_visit::{VisitMut, VisitMutWith};
use thiserror::Error;

const DEFAULT_BINDING: &str = "__sb_default__";
const SHAPE_BINDING: &str = "__sb_module_shape__";
const MOCKED_MODULE_BINDING: &str = "__sb_mocked_module__";

/// Error from the automock transform.
#[derive(Error, Debug, Clone)]
pub enum AutomockError {
    #[error("Cannot automock a module with `export * from \"{specifier}\"`: wildcard re-exports cannot be enumerated statically")]
    WildcardReexport { specifier: String },

    #[error("Cannot automock an export declared through an assignment pattern")]
    AssignmentPattern,

    #[error("Cannot automock an export declared through a member expression")]
    MemberExpression,

    #[error("Cannot automock unsupported export form: {kind}")]
    UnsupportedExport { kind: String },

    #[error("Automock parse failed: {0}")]
    Parse(CompilerError),

    #[error("Automock emit failed: {0}")]
    Emit(CompilerError),
}

/// Options for [`automock_module`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomockOptions {
    /// Global property holding the mocker runtime.
    pub global_accessor: String,
    /// Emit a source map alongside the code.
    pub source_map: bool,
}

impl Default for AutomockOptions {
    fn default() -> Self {
        Self {
            global_accessor: DEFAULT_GLOBAL_ACCESSOR.to_string(),
            source_map: true,
        }
    }
}

impl AutomockOptions {
    #[must_use]
    pub fn new(global_accessor: impl Into<String>) -> Self {
        Self {
            global_accessor: global_accessor.into(),
            ..Self::default()
        }
    }
}

/// Rewrite `source` into its automocked form.
///
/// Pure: no file system access. `filename` only selects the dialect and
/// names the source in the map.
pub fn automock_module(
    source: &str,
    filename: &Path,
    mode: AutomockMode,
    parser: &dyn ParserBackend,
    options: &AutomockOptions,
) -> Result<TransformOutput, AutomockError> {
    let parsed = parser.parse(source, filename).map_err(AutomockError::Parse)?;

    let mut module = parsed.module.clone();
    let type_names = type_only_names(&module);
    let mut body = Vec::with_capacity(module.body.len());
    let mut shape: Vec<(String, String)> = Vec::new();
    let mut reexport_count = 0usize;

    for item in std::mem::take(&mut module.body) {
        let bindings = item_exports(&item, &type_names)?;
        if bindings.is_empty() {
            body.extend(unexport_overload(item));
            continue;
        }

        let mut imports = String::new();
        for binding in &bindings {
            if shape.iter().any(|(exported, _)| exported == binding.exported_name()) {
                continue;
            }
            let local = match binding {
                ExportedBinding::Declared { name } => name.clone(),
                ExportedBinding::Listed { local, .. } => local.clone(),
                ExportedBinding::Default => DEFAULT_BINDING.to_string(),
                ExportedBinding::Reexported {
                    source, imported, ..
                } => {
                    let local = format!("__sb_reexport_{reexport_count}__");
                    reexport_count += 1;
                    let source = json_string(source);
                    if imported == "*" {
                        let _ = writeln!(imports, "import * as {local} from {source};");
                    } else {
                        let _ = writeln!(
                            imports,
                            "import {{ {} as {local} }} from {source};",
                            export_name_text(imported)
                        );
                    }
                    local
                }
            };
            shape.push((binding.exported_name().to_string(), local));
        }

        if !imports.is_empty() {
            body.extend(parse_snippet(&imports, parser)?);
        }
        body.extend(strip_export(item, parser)?);
    }

    if shape.is_empty() {
        module.body = body;
    } else {
        let tail = mock_tail(&shape, mode, &options.global_accessor);
        body.extend(parse_snippet(&tail, parser)?);
        module.body = body;
    }

    parsed
        .emit(&module, options.source_map)
        .map_err(AutomockError::Emit)
}

/// Turn an export item into the plain statements that keep its bindings.
fn strip_export(
    item: ModuleItem,
    parser: &dyn ParserBackend,
) -> Result<Vec<ModuleItem>, AutomockError> {
    let ModuleItem::ModuleDecl(decl) = item else {
        return Ok(vec![item]);
    };

    match decl {
        ModuleDecl::ExportDecl(export) => Ok(vec![ModuleItem::Stmt(Stmt::Decl(export.decl))]),

        // Bindings stay as the local declarations they already are.
        ModuleDecl::ExportNamed(_) => Ok(Vec::new()),

        ModuleDecl::ExportDefaultExpr(export) => {
            Ok(vec![default_binding(export.expr, parser)?])
        }

        ModuleDecl::ExportDefaultDecl(export) => match export.decl {
            DefaultDecl::Fn(f) => match f.ident {
                Some(ident) => {
                    let name = ident.sym.to_string();
                    let decl = Decl::Fn(FnDecl {
                        ident,
                        declare: false,
                        function: f.function,
                    });
                    let mut items = vec![ModuleItem::Stmt(Stmt::Decl(decl))];
                    items.extend(parse_snippet(
                        &format!("const {DEFAULT_BINDING} = {name};"),
                        parser,
                    )?);
                    Ok(items)
                }
                None => Ok(vec![default_binding(Box::new(Expr::Fn(f)), parser)?]),
            },
            DefaultDecl::Class(c) => match c.ident {
                Some(ident) => {
                    let name = ident.sym.to_string();
                    let decl = Decl::Class(ClassDecl {
                        ident,
                        declare: false,
                        class: c.class,
                    });
                    let mut items = vec![ModuleItem::Stmt(Stmt::Decl(decl))];
                    items.extend(parse_snippet(
                        &format!("const {DEFAULT_BINDING} = {name};"),
                        parser,
                    )?);
                    Ok(items)
                }
                None => Ok(vec![default_binding(Box::new(Expr::Class(c)), parser)?]),
            },
            other => Ok(vec![ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(
                ExportDefaultDecl {
                    span: export.span,
                    decl: other,
                },
            ))]),
        },

        other => Ok(vec![ModuleItem::ModuleDecl(other)]),
    }
}

/// Overload signatures follow their implementation out of the export
/// surface. Anonymous default signatures have no binding to keep.
fn unexport_overload(item: ModuleItem) -> Option<ModuleItem> {
    match item {
        ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export))
            if matches!(&export.decl, Decl::Fn(f) if !f.declare && f.function.body.is_none()) =>
        {
            Some(ModuleItem::Stmt(Stmt::Decl(export.decl)))
        }
        ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => match export.decl {
            DefaultDecl::Fn(f) if f.function.body.is_none() => f.ident.map(|ident| {
                ModuleItem::Stmt(Stmt::Decl(Decl::Fn(FnDecl {
                    ident,
                    declare: false,
                    function: f.function,
                })))
            }),
            decl => Some(ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(
                ExportDefaultDecl {
                    span: export.span,
                    decl,
                },
            ))),
        },
        other => Some(other),
    }
}

/// `const __sb_default__ = <expr>;`
fn default_binding(
    expr: Box<Expr>,
    parser: &dyn ParserBackend,
) -> Result<ModuleItem, AutomockError> {
    let mut items = parse_snippet(&format!("const {DEFAULT_BINDING} = 0;"), parser)?;
    let mut item = items.pop().ok_or_else(|| {
        AutomockError::Emit(CompilerError::emit_error("Empty default binding snippet"))
    })?;

    let ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) = &mut item else {
        return Err(AutomockError::Emit(CompilerError::emit_error(
            "Unexpected default binding snippet",
        )));
    };
    let Some(declarator) = var.decls.first_mut() else {
        return Err(AutomockError::Emit(CompilerError::emit_error(
            "Default binding snippet has no declarator",
        )));
    };
    declarator.init = Some(expr);
    Ok(item)
}

/// Shape object, `mockObject` call and the re-export list.
fn mock_tail(shape: &[(String, String)], mode: AutomockMode, accessor: &str) -> String {
    let mut out = String::new();

    let _ = write!(out, "const {SHAPE_BINDING} = {{ __esModule: true");
    for (exported, local) in shape {
        let _ = write!(out, ", [{}]: {local}", json_string(exported));
    }
    out.push_str(" };\n");

    let _ = writeln!(
        out,
        "const {MOCKED_MODULE_BINDING} = globalThis[{}].mockObject({SHAPE_BINDING}, {});",
        json_string(accessor),
        json_string(mode.as_str())
    );

    let mut specifiers = Vec::with_capacity(shape.len());
    for (index, (exported, _)) in shape.iter().enumerate() {
        let _ = writeln!(
            out,
            "const __sb_mocked_{index}__ = {MOCKED_MODULE_BINDING}[{}];",
            json_string(exported)
        );
        specifiers.push(format!(
            "__sb_mocked_{index}__ as {}",
            export_name_text(exported)
        ));
    }
    let _ = writeln!(out, "export {{ {} }};", specifiers.join(", "));
    out
}

/// Parse generated code and detach it from any source position.
fn parse_snippet(
    code: &str,
    parser: &dyn ParserBackend,
) -> Result<Vec<ModuleItem>, AutomockError> {
    let parsed = parser
        .parse(code, Path::new("automock.js"))
        .map_err(AutomockError::Emit)?;
    let mut module = parsed.module;
    module.visit_mut_with(&mut DropSpans);
    Ok(module.body)
}

struct DropSpans;

impl VisitMut for DropSpans {
    fn visit_mut_span(&mut self, span: &mut Span) {
        *span = DUMMY_SP;
    }
}

/// JSON string literal, valid as a JavaScript string literal.
fn json_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

/// Export/import name as source text: bare when it is an identifier name,
/// quoted otherwise.
fn export_name_text(name: &str) -> String {
    if is_identifier_name(name) {
        name.to_string()
    } else {
        json_string(name)
    }
}

fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c == '$' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c == '$' || c.is_alphanumeric())
}
