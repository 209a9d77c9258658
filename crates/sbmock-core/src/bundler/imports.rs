//! Import specifier scanner for served modules.
//!
//! Hosts feed the specifiers back into the module graph so that
//! invalidating a module also reaches the modules importing it.

use std::collections::HashSet;
use swc_ecma_ast::{CallExpr, Callee, Expr, Lit, Module, ModuleDecl, ModuleItem};
use swc_ecma_visit::{Visit, VisitWith};

/// Runtime import specifiers of `module`, in first-appearance order and
/// deduplicated.
///
/// Covers `import` declarations, `export .. from` and `import('x')` with a
/// string literal. Type-only forms are skipped.
#[must_use]
pub fn import_specifiers(module: &Module) -> Vec<String> {
    let mut scanner = ImportScanner::default();

    for item in &module.body {
        let ModuleItem::ModuleDecl(decl) = item else {
            continue;
        };
        match decl {
            ModuleDecl::Import(import) if !import.type_only => {
                scanner.push(import.src.value.to_string());
            }
            ModuleDecl::ExportNamed(named) if !named.type_only => {
                if let Some(src) = &named.src {
                    scanner.push(src.value.to_string());
                }
            }
            ModuleDecl::ExportAll(all) if !all.type_only => {
                scanner.push(all.src.value.to_string());
            }
            _ => {}
        }
    }

    module.visit_with(&mut scanner);
    scanner.specifiers
}

#[derive(Default)]
struct ImportScanner {
    specifiers: Vec<String>,
    seen: HashSet<String>,
}

impl ImportScanner {
    fn push(&mut self, specifier: String) {
        if self.seen.insert(specifier.clone()) {
            self.specifiers.push(specifier);
        }
    }
}

impl Visit for ImportScanner {
    fn visit_call_expr(&mut self, call: &CallExpr) {
        if matches!(call.callee, Callee::Import(_)) {
            if let Some(arg) = call.args.first() {
                if let Expr::Lit(Lit::Str(s)) = &*arg.expr {
                    self.push(s.value.to_string());
                }
            }
        }
        call.visit_children_with(self);
    }
}
