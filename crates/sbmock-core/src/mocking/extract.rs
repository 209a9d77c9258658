//! Extraction of `sb.mock(...)` declarations from the preview file.

use super::MockDeclaration;
use crate::compiler::ParserBackend;
use crate::config::PreviewConfig;
use crate::resolver::{resolve_mock_target, OverrideFinder, ResolvedSpecifier};
use std::path::Path;
use swc_common::Span;
use swc_ecma_ast::{
    CallExpr, Callee, Expr, Lit, MemberProp, Module, ObjectLit, Prop, PropName, PropOrSpread,
};
use swc_ecma_visit::{Visit, VisitWith};
use tracing::{debug, warn};

/// Source extensions dropped from `import(...)` specifiers.
const SOURCE_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts"];

/// A recognised `sb.mock(...)` call, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    /// Literal specifier as written.
    pub literal: String,
    /// Normalised specifier recorded as the declaration path.
    pub path: String,
    /// `spy: true` present in the options object.
    pub spy: bool,
    /// Span of the `import(...)` expression for the dynamic-import form.
    pub import_span: Option<Span>,
    /// Span of the string literal.
    pub literal_span: Span,
}

/// Extract every mock declaration from the preview file.
///
/// Never fails: an unreadable or unparsable preview file yields an empty
/// list, and declarations that do not resolve are skipped.
pub fn extract_mock_calls(
    config: &PreviewConfig,
    parser: &dyn ParserBackend,
    root: &Path,
    finder: &dyn OverrideFinder,
) -> Vec<MockDeclaration> {
    let preview = &config.preview_config_path;
    let source = match std::fs::read_to_string(preview) {
        Ok(source) => source,
        Err(e) => {
            debug!(path = %preview.display(), error = %e, "Could not read preview config");
            return Vec::new();
        }
    };

    let parsed = match parser.parse(&source, preview) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(path = %preview.display(), error = %e, "Could not parse preview config");
            return Vec::new();
        }
    };

    find_mock_calls(&parsed.module)
        .into_iter()
        .filter_map(|call| {
            match resolve_call(&call, root, preview, finder) {
                Ok(resolved) => Some(MockDeclaration {
                    path: call.path,
                    absolute_path: resolved.absolute_path,
                    redirect_path: resolved.redirect_path,
                    spy: call.spy,
                }),
                Err(e) => {
                    if config.warn_unresolved() {
                        warn!(specifier = %call.literal, error = %e, "Skipping unresolvable sb.mock declaration");
                    } else {
                        debug!(specifier = %call.literal, error = %e, "Skipping unresolvable sb.mock declaration");
                    }
                    None
                }
            }
        })
        .collect()
}

/// Resolve with the literal first, then the normalised path.
fn resolve_call(
    call: &MockCall,
    root: &Path,
    preview: &Path,
    finder: &dyn OverrideFinder,
) -> Result<ResolvedSpecifier, crate::resolver::ResolveError> {
    match resolve_mock_target(&call.literal, root, preview, finder) {
        Ok(resolved) => Ok(resolved),
        Err(e) if call.path == call.literal => Err(e),
        Err(_) => resolve_mock_target(&call.path, root, preview, finder),
    }
}

/// Find `sb.mock(...)` calls anywhere in the module.
#[must_use]
pub fn find_mock_calls(module: &Module) -> Vec<MockCall> {
    let mut finder = MockCallFinder { calls: Vec::new() };
    module.visit_with(&mut finder);
    finder.calls
}

/// Strip a recognised source extension (`./x.utils.ts` becomes `./x.utils`).
#[must_use]
pub fn strip_source_extension(specifier: &str) -> &str {
    if let Some((stem, ext)) = specifier.rsplit_once('.') {
        if !stem.is_empty() && !stem.ends_with('/') && SOURCE_EXTENSIONS.contains(&ext) {
            return stem;
        }
    }
    specifier
}

struct MockCallFinder {
    calls: Vec<MockCall>,
}

impl Visit for MockCallFinder {
    fn visit_call_expr(&mut self, call: &CallExpr) {
        if let Some(found) = match_mock_call(call) {
            self.calls.push(found);
        }
        call.visit_children_with(self);
    }
}

fn match_mock_call(call: &CallExpr) -> Option<MockCall> {
    let Callee::Expr(callee) = &call.callee else {
        return None;
    };
    let Expr::Member(member) = &**callee else {
        return None;
    };
    let Expr::Ident(obj) = &*member.obj else {
        return None;
    };
    let MemberProp::Ident(prop) = &member.prop else {
        return None;
    };
    if &*obj.sym != "sb" || &*prop.sym != "mock" {
        return None;
    }

    let first = call.args.first()?;
    if first.spread.is_some() {
        return None;
    }
    let spy = call
        .args
        .get(1)
        .and_then(|arg| match &*arg.expr {
            Expr::Object(obj) => Some(spy_option(obj)),
            _ => None,
        })
        .unwrap_or(false);

    match &*first.expr {
        Expr::Lit(Lit::Str(s)) => Some(MockCall {
            literal: s.value.to_string(),
            path: s.value.to_string(),
            spy,
            import_span: None,
            literal_span: s.span,
        }),
        Expr::Call(import) if matches!(import.callee, Callee::Import(_)) => {
            let arg = import.args.first()?;
            let Expr::Lit(Lit::Str(s)) = &*arg.expr else {
                return None;
            };
            let literal = s.value.to_string();
            Some(MockCall {
                path: strip_source_extension(&literal).to_string(),
                literal,
                spy,
                import_span: Some(import.span),
                literal_span: s.span,
            })
        }
        _ => None,
    }
}

/// `true` only for a literal `spy: true` property.
fn spy_option(obj: &ObjectLit) -> bool {
    obj.props.iter().any(|prop| {
        let PropOrSpread::Prop(prop) = prop else {
            return false;
        };
        let Prop::KeyValue(kv) = &**prop else {
            return false;
        };
        let key_is_spy = match &kv.key {
            PropName::Ident(ident) => &*ident.sym == "spy",
            PropName::Str(s) => &*s.value == "spy",
            _ => false,
        };
        key_is_spy && matches!(&*kv.value, Expr::Lit(Lit::Bool(b)) if b.value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::SwcParser;
    use crate::config::CoreOptions;
    use crate::resolver::MocksDirFinder;
    use std::path::PathBuf;
    use tempfile::tempdir;

    struct Project {
        _dir: tempfile::TempDir,
        root: PathBuf,
    }

    impl Project {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let root = dunce::canonicalize(dir.path()).unwrap();
            std::fs::create_dir_all(root.join(".storybook")).unwrap();
            Self { _dir: dir, root }
        }

        fn write(&self, rel: &str, content: &str) -> PathBuf {
            let path = self.root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, content).unwrap();
            path
        }

        fn extract(&self, preview: &str) -> Vec<MockDeclaration> {
            let path = self.write(".storybook/preview.ts", preview);
            extract_mock_calls(
                &PreviewConfig::new(path),
                &SwcParser::new(),
                &self.root,
                &MocksDirFinder::default(),
            )
        }
    }

    fn calls(source: &str) -> Vec<MockCall> {
        let parsed = SwcParser::new()
            .parse(source, Path::new("preview.tsx"))
            .unwrap();
        find_mock_calls(&parsed.module)
    }

    #[test]
    fn test_strip_source_extension() {
        assert_eq!(strip_source_extension("./x.utils.ts"), "./x.utils");
        assert_eq!(strip_source_extension("./bar/baz.js"), "./bar/baz");
        assert_eq!(strip_source_extension("./styles.css"), "./styles.css");
        assert_eq!(strip_source_extension("lodash"), "lodash");
        assert_eq!(strip_source_extension("./.ts"), "./.ts");
    }

    #[test]
    fn test_find_both_call_shapes() {
        let found = calls(
            r"
            import { sb } from 'storybook/test';
            sb.mock('foo', { spy: true });
            sb.mock(import('./bar/baz.js'));
            sb.mock('./x', { 'spy': true, other: 1 });
            sb.mock('./y', { spy: 'yes' });
            ",
        );
        assert_eq!(found.len(), 4);
        assert_eq!(found[0].path, "foo");
        assert!(found[0].spy);
        assert_eq!(found[1].literal, "./bar/baz.js");
        assert_eq!(found[1].path, "./bar/baz");
        assert!(found[1].import_span.is_some());
        assert!(!found[1].spy);
        assert!(found[2].spy);
        assert!(!found[3].spy);
    }

    #[test]
    fn test_ignores_other_calls() {
        let found = calls(
            r"
            other.mock('a');
            sb.spyOn('b');
            sb.mock(someVar);
            sb.mock(`./tpl`);
            sb['mock']('c');
            ",
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_finds_nested_calls() {
        let found = calls("export default { beforeEach() { sb.mock('./inner'); } };");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "./inner");
    }

    #[test]
    fn test_extract_with_spy_and_override() {
        let project = Project::new();
        let foo = project.write("foo.ts", "export const foo = 1;");
        let redirect = project.write("__mocks__/foo.ts", "export const foo = 2;");

        let decls = project.extract("sb.mock('../foo', { spy: true });");
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].path, "../foo");
        assert!(decls[0].spy);
        assert_eq!(decls[0].absolute_path, foo);
        assert_eq!(decls[0].redirect_path, Some(redirect));
    }

    #[test]
    fn test_extract_dynamic_import_uses_extension_bearing_literal() {
        let project = Project::new();
        project.write("bar/baz.ts", "export const a = 1;");
        let js = project.write("bar/baz.js", "export const a = 1;");

        let decls = project.extract("sb.mock(import('../bar/baz.js'), { spy: true });");
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].path, "../bar/baz");
        assert_eq!(decls[0].absolute_path, js);
    }

    #[test]
    fn test_extract_dynamic_import_falls_back_to_stripped() {
        let project = Project::new();
        let ts = project.write("bar/baz.ts", "export const a = 1;");

        let decls = project.extract("sb.mock(import('../bar/baz.js'));");
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].absolute_path, ts);
    }

    #[test]
    fn test_extract_without_override() {
        let project = Project::new();
        let target = project.write("bar/baz.utils.ts", "export const a = 1;");

        let decls = project.extract("sb.mock('../bar/baz.utils');");
        assert_eq!(decls.len(), 1);
        assert!(!decls[0].spy);
        assert_eq!(decls[0].redirect_path, None);
        assert_eq!(decls[0].absolute_path, target);
    }

    #[test]
    fn test_extract_skips_unresolvable() {
        let project = Project::new();
        project.write("ok.ts", "");

        let decls = project.extract("sb.mock('../missing'); sb.mock('../ok');");
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].path, "../ok");
    }

    #[test]
    fn test_extract_unreadable_preview_is_empty() {
        let project = Project::new();
        let config = PreviewConfig::new(project.root.join(".storybook/preview.ts"))
            .with_core_options(CoreOptions {
                warn_unresolved: true,
            });
        let decls = extract_mock_calls(
            &config,
            &SwcParser::new(),
            &project.root,
            &MocksDirFinder::default(),
        );
        assert!(decls.is_empty());
    }

    #[test]
    fn test_extract_unparsable_preview_is_empty() {
        let project = Project::new();
        project.write("foo.ts", "");
        assert!(project.extract("sb.mock('../foo'").is_empty());
    }
}
