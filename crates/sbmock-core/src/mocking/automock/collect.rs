//! Export enumeration for the automock transform.
//!
//! [`collect_exports`] is pure: it reads a module AST and returns the list
//! of runtime bindings the module exports, without touching the AST.

use super::AutomockError;
use serde::Serialize;
use std::collections::HashSet;
use swc_ecma_ast::{
    Decl, DefaultDecl, ExportSpecifier, ImportSpecifier, Module, ModuleDecl, ModuleExportName,
    ModuleItem, ObjectPatProp, Pat, Stmt, TsModuleName,
};

/// One runtime export of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ExportedBinding {
    /// `export const a = ..`, `export function a() {}`, `export enum A {}`.
    Declared { name: String },
    /// `export { local as exported }` without a source.
    Listed { local: String, exported: String },
    /// `export { imported as exported } from 'source'`; `imported` is `*`
    /// for `export * as ns from 'source'`.
    Reexported {
        source: String,
        imported: String,
        exported: String,
    },
    /// `export default ..`.
    Default,
}

impl ExportedBinding {
    /// Name importers see.
    #[must_use]
    pub fn exported_name(&self) -> &str {
        match self {
            Self::Declared { name } => name,
            Self::Listed { exported, .. } | Self::Reexported { exported, .. } => exported,
            Self::Default => "default",
        }
    }
}

/// Enumerate every runtime export of `module`, in source order.
///
/// Type-only exports are skipped. `export * from` and unsupported binding
/// patterns are errors.
pub fn collect_exports(module: &Module) -> Result<Vec<ExportedBinding>, AutomockError> {
    let type_names = type_only_names(module);
    let mut out = Vec::new();
    for item in &module.body {
        out.extend(item_exports(item, &type_names)?);
    }
    Ok(out)
}

/// Top-level names of `module` that exist only at the type level:
/// interfaces, type aliases, ambient declarations and type imports that
/// no runtime declaration shares.
#[must_use]
pub fn type_only_names(module: &Module) -> HashSet<String> {
    let mut types = HashSet::new();
    let mut values = HashSet::new();

    for item in &module.body {
        let decl = match item {
            ModuleItem::Stmt(Stmt::Decl(decl)) => decl,
            ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => &export.decl,
            ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => {
                for spec in &import.specifiers {
                    let (local, type_only) = match spec {
                        ImportSpecifier::Named(n) => (&n.local, n.is_type_only),
                        ImportSpecifier::Default(d) => (&d.local, false),
                        ImportSpecifier::Namespace(ns) => (&ns.local, false),
                    };
                    if import.type_only || type_only {
                        types.insert(local.sym.to_string());
                    } else {
                        values.insert(local.sym.to_string());
                    }
                }
                continue;
            }
            _ => continue,
        };

        match decl {
            Decl::TsInterface(i) => {
                types.insert(i.id.sym.to_string());
            }
            Decl::TsTypeAlias(t) => {
                types.insert(t.id.sym.to_string());
            }
            Decl::Fn(f) => {
                let set = if f.declare { &mut types } else { &mut values };
                set.insert(f.ident.sym.to_string());
            }
            Decl::Class(c) => {
                let set = if c.declare { &mut types } else { &mut values };
                set.insert(c.ident.sym.to_string());
            }
            Decl::TsEnum(e) => {
                let set = if e.declare { &mut types } else { &mut values };
                set.insert(e.id.sym.to_string());
            }
            Decl::TsModule(m) => {
                if let TsModuleName::Ident(id) = &m.id {
                    let set = if m.declare { &mut types } else { &mut values };
                    set.insert(id.sym.to_string());
                }
            }
            Decl::Var(var) => {
                let mut names = Vec::new();
                for declarator in &var.decls {
                    bound_names(&declarator.name, &mut names);
                }
                let set = if var.declare { &mut types } else { &mut values };
                set.extend(names);
            }
            Decl::Using(using) => {
                let mut names = Vec::new();
                for declarator in &using.decls {
                    bound_names(&declarator.name, &mut names);
                }
                values.extend(names);
            }
        }
    }

    types.retain(|name| !values.contains(name));
    types
}

/// Exports contributed by a single top-level item.
///
/// `type_names` comes from [`type_only_names`] over the whole module; local
/// export-list entries naming one of them are skipped.
pub fn item_exports(
    item: &ModuleItem,
    type_names: &HashSet<String>,
) -> Result<Vec<ExportedBinding>, AutomockError> {
    let ModuleItem::ModuleDecl(decl) = item else {
        return Ok(Vec::new());
    };

    match decl {
        ModuleDecl::ExportDecl(export) => decl_names(&export.decl)
            .map(|names| names.into_iter().map(|name| ExportedBinding::Declared { name }).collect()),

        ModuleDecl::ExportNamed(named) if named.type_only => Ok(Vec::new()),

        ModuleDecl::ExportNamed(named) => {
            let source = named.src.as_ref().map(|s| s.value.to_string());
            let mut out = Vec::new();
            for spec in &named.specifiers {
                let binding = match (spec, &source) {
                    (ExportSpecifier::Named(n), _) if n.is_type_only => continue,
                    (ExportSpecifier::Named(n), None) => {
                        let local = export_name(&n.orig);
                        if type_names.contains(&local) {
                            continue;
                        }
                        let exported = n.exported.as_ref().map_or_else(|| local.clone(), export_name);
                        ExportedBinding::Listed { local, exported }
                    }
                    (ExportSpecifier::Named(n), Some(source)) => {
                        let imported = export_name(&n.orig);
                        let exported = n.exported.as_ref().map_or_else(|| imported.clone(), export_name);
                        ExportedBinding::Reexported {
                            source: source.clone(),
                            imported,
                            exported,
                        }
                    }
                    (ExportSpecifier::Namespace(ns), Some(source)) => ExportedBinding::Reexported {
                        source: source.clone(),
                        imported: "*".to_string(),
                        exported: export_name(&ns.name),
                    },
                    (ExportSpecifier::Default(d), Some(source)) => ExportedBinding::Reexported {
                        source: source.clone(),
                        imported: "default".to_string(),
                        exported: d.exported.sym.to_string(),
                    },
                    _ => {
                        return Err(AutomockError::UnsupportedExport {
                            kind: "export specifier without a source module".to_string(),
                        })
                    }
                };
                out.push(binding);
            }
            Ok(out)
        }

        ModuleDecl::ExportDefaultDecl(default) => match &default.decl {
            DefaultDecl::TsInterfaceDecl(_) => Ok(Vec::new()),
            // Overload signature; the implementation carries the export.
            DefaultDecl::Fn(f) if f.function.body.is_none() => Ok(Vec::new()),
            _ => Ok(vec![ExportedBinding::Default]),
        },

        ModuleDecl::ExportDefaultExpr(_) => Ok(vec![ExportedBinding::Default]),

        ModuleDecl::ExportAll(all) if all.type_only => Ok(Vec::new()),

        ModuleDecl::ExportAll(all) => Err(AutomockError::WildcardReexport {
            specifier: all.src.value.to_string(),
        }),

        ModuleDecl::TsExportAssignment(_) => Err(AutomockError::UnsupportedExport {
            kind: "export =".to_string(),
        }),

        ModuleDecl::TsImportEquals(import) if import.is_export && !import.is_type_only => {
            Err(AutomockError::UnsupportedExport {
                kind: "export import =".to_string(),
            })
        }

        _ => Ok(Vec::new()),
    }
}

/// Runtime names bound by an exported declaration.
fn decl_names(decl: &Decl) -> Result<Vec<String>, AutomockError> {
    match decl {
        Decl::Fn(f) if !f.declare && f.function.body.is_some() => {
            Ok(vec![f.ident.sym.to_string()])
        }
        Decl::Class(c) if !c.declare => Ok(vec![c.ident.sym.to_string()]),
        Decl::Var(var) if !var.declare => {
            let mut names = Vec::new();
            for declarator in &var.decls {
                pattern_names(&declarator.name, &mut names)?;
            }
            Ok(names)
        }
        Decl::TsEnum(e) if !e.declare => Ok(vec![e.id.sym.to_string()]),
        Decl::Using(_) => Err(AutomockError::UnsupportedExport {
            kind: "export using".to_string(),
        }),
        // Overload signatures, ambient declarations, interfaces, type aliases
        // and namespaces.
        _ => Ok(Vec::new()),
    }
}

/// Every identifier bound by a declaration pattern.
pub fn pattern_names(pat: &Pat, out: &mut Vec<String>) -> Result<(), AutomockError> {
    match pat {
        Pat::Ident(binding) => out.push(binding.id.sym.to_string()),
        Pat::Array(array) => {
            for elem in array.elems.iter().flatten() {
                pattern_names(elem, out)?;
            }
        }
        Pat::Rest(rest) => pattern_names(&rest.arg, out)?,
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(kv) => pattern_names(&kv.value, out)?,
                    ObjectPatProp::Assign(assign) if assign.value.is_some() => {
                        return Err(AutomockError::AssignmentPattern);
                    }
                    ObjectPatProp::Assign(assign) => out.push(assign.key.id.sym.to_string()),
                    ObjectPatProp::Rest(rest) => pattern_names(&rest.arg, out)?,
                }
            }
        }
        Pat::Assign(_) => return Err(AutomockError::AssignmentPattern),
        Pat::Expr(_) => return Err(AutomockError::MemberExpression),
        _ => {
            return Err(AutomockError::UnsupportedExport {
                kind: "invalid binding pattern".to_string(),
            })
        }
    }
    Ok(())
}

/// Like [`pattern_names`], but never fails: defaults and member targets are
/// walked through or ignored.
fn bound_names(pat: &Pat, out: &mut Vec<String>) {
    match pat {
        Pat::Ident(binding) => out.push(binding.id.sym.to_string()),
        Pat::Array(array) => {
            for elem in array.elems.iter().flatten() {
                bound_names(elem, out);
            }
        }
        Pat::Rest(rest) => bound_names(&rest.arg, out),
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(kv) => bound_names(&kv.value, out),
                    ObjectPatProp::Assign(assign) => out.push(assign.key.id.sym.to_string()),
                    ObjectPatProp::Rest(rest) => bound_names(&rest.arg, out),
                }
            }
        }
        Pat::Assign(assign) => bound_names(&assign.left, out),
        _ => {}
    }
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::Ident(ident) => ident.sym.to_string(),
        ModuleExportName::Str(s) => s.value.to_string(),
    }
}
