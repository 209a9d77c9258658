//! Module specifier resolution for mock declarations.
//!
//! Resolves the specifier written in `sb.mock(...)` to a file on disk and
//! looks for a hand-written override next to it.
//!
//! ## Specifier Types
//!
//! - Relative: `./utils`, `../lib/foo`
//! - Absolute: `/abs/path/to/module`
//! - Bare: `lodash`, `@scope/pkg`, `react/jsx-runtime`

#![allow(clippy::unused_self)]

mod overrides;

pub use overrides::{MocksDirFinder, OverrideFinder};

use serde::Serialize;
use std::path::{Component, Path, PathBuf};

/// Extensions probed when a specifier has none, in order.
pub const RESOLVE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts"];

/// Error during resolution.
#[derive(Debug, Clone)]
pub struct ResolveError {
    pub specifier: String,
    pub from: String,
    pub message: String,
}

impl ResolveError {
    fn new(specifier: &str, from: &Path, message: impl Into<String>) -> Self {
        Self {
            specifier: specifier.to_string(),
            from: from.display().to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cannot resolve '{}' from '{}': {}",
            self.specifier, self.from, self.message
        )
    }
}

impl std::error::Error for ResolveError {}

/// A mock target resolved on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSpecifier {
    /// Canonical path of the module being mocked.
    pub absolute_path: PathBuf,
    /// Hand-written override, if one exists.
    pub redirect_path: Option<PathBuf>,
    /// Whether the module lives in a dependency package.
    pub external: bool,
}

/// Resolve a mock specifier written in `importer` and look up its override.
///
/// `root` is the project root; bare specifier lookup stops there and the
/// override finder uses it for package overrides.
pub fn resolve_mock_target(
    specifier: &str,
    root: &Path,
    importer: &Path,
    finder: &dyn OverrideFinder,
) -> Result<ResolvedSpecifier, ResolveError> {
    let resolver = ModuleResolver::new(root);
    let absolute_path = resolver.resolve_from_file(specifier, importer)?;
    let external = is_external_path(&absolute_path);
    let redirect_path = finder.find_override(
        root,
        &absolute_path,
        external.then_some(specifier),
    );

    Ok(ResolvedSpecifier {
        absolute_path,
        redirect_path,
        external,
    })
}

/// Whether a resolved path points into a dependency package.
#[must_use]
pub fn is_external_path(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::Normal(name) if name == "node_modules"))
}

/// Whether a specifier is bare (`lodash`, `@scope/pkg/sub`).
#[must_use]
pub fn is_bare_specifier(specifier: &str) -> bool {
    !(specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || Path::new(specifier).is_absolute())
}

/// Node-style module resolver.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    /// Directory where bare lookups stop walking up.
    root: PathBuf,
}

impl ModuleResolver {
    /// Create a resolver rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a specifier as written in the file `importer`.
    pub fn resolve_from_file(
        &self,
        specifier: &str,
        importer: &Path,
    ) -> Result<PathBuf, ResolveError> {
        let base_dir = importer.parent().unwrap_or(Path::new("."));
        self.resolve(specifier, base_dir)
    }

    /// Resolve a specifier relative to the directory `base_dir`.
    pub fn resolve(&self, specifier: &str, base_dir: &Path) -> Result<PathBuf, ResolveError> {
        if specifier.is_empty() {
            return Err(ResolveError::new(specifier, base_dir, "Empty specifier"));
        }

        if specifier.starts_with("node:") {
            return Err(ResolveError::new(
                specifier,
                base_dir,
                "Built-in modules have no file to mock",
            ));
        }

        if Path::new(specifier).is_absolute() {
            let target = normalize_path(Path::new(specifier));
            return self.resolve_file_or_directory(&target, specifier, base_dir);
        }

        if !is_bare_specifier(specifier) {
            // `..` cannot be walked through a directory that does not exist.
            let target = normalize_path(&base_dir.join(specifier));
            return self.resolve_file_or_directory(&target, specifier, base_dir);
        }

        self.resolve_bare(specifier, base_dir)
    }

    /// Resolve a bare specifier (node_modules lookup).
    fn resolve_bare(&self, specifier: &str, base_dir: &Path) -> Result<PathBuf, ResolveError> {
        let (pkg_name, subpath) = parse_bare_specifier(specifier);

        let mut current = Some(base_dir);
        while let Some(dir) = current {
            let pkg_dir = dir.join("node_modules").join(&pkg_name);

            if pkg_dir.is_dir() {
                let pkg_json = pkg_dir.join("package.json");
                if pkg_json.is_file() {
                    if let Ok(entry) =
                        self.resolve_package_entry(&pkg_dir, &pkg_json, subpath.as_deref())
                    {
                        return Ok(entry);
                    }
                }

                let target = match &subpath {
                    Some(sub) => pkg_dir.join(sub),
                    None => pkg_dir.clone(),
                };
                if let Ok(found) = self.resolve_file_or_directory(&target, specifier, base_dir) {
                    return Ok(found);
                }
            }

            if dir == self.root {
                break;
            }
            current = dir.parent();
        }

        Err(ResolveError::new(
            specifier,
            base_dir,
            format!("Cannot find package '{pkg_name}' in node_modules"),
        ))
    }

    /// Resolve the entry point from package.json.
    fn resolve_package_entry(
        &self,
        pkg_dir: &Path,
        pkg_json: &Path,
        subpath: Option<&str>,
    ) -> Result<PathBuf, ResolveError> {
        let content = std::fs::read_to_string(pkg_json)
            .map_err(|e| ResolveError::new("", pkg_json, e.to_string()))?;
        let json: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| ResolveError::new("", pkg_json, e.to_string()))?;

        let export_key = subpath.map_or_else(|| ".".to_string(), |sub| format!("./{sub}"));
        if let Some(entry) = json
            .get("exports")
            .and_then(|exports| resolve_exports(exports, &export_key))
        {
            let target = pkg_dir.join(entry);
            if target.is_file() {
                return canonicalize(&target, &export_key, pkg_json);
            }
        }

        if subpath.is_none() {
            for field in ["module", "main"] {
                if let Some(entry) = json.get(field).and_then(|v| v.as_str()) {
                    if let Ok(found) = self.resolve_file_or_directory(
                        &pkg_dir.join(entry),
                        entry,
                        pkg_json,
                    ) {
                        return Ok(found);
                    }
                }
            }
        }

        Err(ResolveError::new(
            &export_key,
            pkg_json,
            "No entry point found in package.json",
        ))
    }

    /// Resolve a path that might be a file or directory.
    ///
    /// Probes the path as-is, then with each of [`RESOLVE_EXTENSIONS`]
    /// appended, then as a directory with an index file.
    fn resolve_file_or_directory(
        &self,
        target: &Path,
        specifier: &str,
        from: &Path,
    ) -> Result<PathBuf, ResolveError> {
        if target.is_file() {
            return canonicalize(target, specifier, from);
        }

        for ext in RESOLVE_EXTENSIONS {
            let mut with_ext = target.as_os_str().to_owned();
            with_ext.push(".");
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            if with_ext.is_file() {
                return canonicalize(&with_ext, specifier, from);
            }
        }

        if target.is_dir() {
            for ext in RESOLVE_EXTENSIONS {
                let index_path = target.join(format!("index.{ext}"));
                if index_path.is_file() {
                    return canonicalize(&index_path, specifier, from);
                }
            }
        }

        Err(ResolveError::new(specifier, from, "File not found"))
    }
}

/// Drop `.` and fold `..` without touching the file system.
fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                result.pop();
            }
            other => result.push(other),
        }
    }
    result
}

fn canonicalize(path: &Path, specifier: &str, from: &Path) -> Result<PathBuf, ResolveError> {
    dunce::canonicalize(path).map_err(|e| ResolveError::new(specifier, from, e.to_string()))
}

/// Split a bare specifier into package name and subpath.
fn parse_bare_specifier(specifier: &str) -> (String, Option<String>) {
    let parts: Vec<&str> = if specifier.starts_with('@') {
        specifier.splitn(3, '/').collect()
    } else {
        specifier.splitn(2, '/').collect()
    };

    if specifier.starts_with('@') && parts.len() >= 2 {
        let pkg = format!("{}/{}", parts[0], parts[1]);
        (pkg, parts.get(2).map(|s| (*s).to_string()))
    } else {
        (
            parts[0].to_string(),
            parts.get(1).map(|s| (*s).to_string()),
        )
    }
}

/// Resolve the `exports` field for a subpath (simplified conditions).
fn resolve_exports(exports: &serde_json::Value, subpath: &str) -> Option<String> {
    match exports {
        serde_json::Value::String(s) if subpath == "." => Some(s.clone()),
        serde_json::Value::Object(map) => {
            if let Some(value) = map.get(subpath) {
                return resolve_export_value(value);
            }
            let has_subpaths = map.keys().any(|k| k.starts_with('.'));
            if subpath == "." && !has_subpaths {
                return resolve_export_value(exports);
            }
            None
        }
        _ => None,
    }
}

/// Resolve a single export value, preferring `import` > `default` > `require`.
fn resolve_export_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(map) => map
            .get("import")
            .or_else(|| map.get("default"))
            .or_else(|| map.get("require"))
            .and_then(resolve_export_value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn root() -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn test_parse_bare_specifier() {
        assert_eq!(parse_bare_specifier("lodash"), ("lodash".to_string(), None));
        assert_eq!(
            parse_bare_specifier("lodash/get"),
            ("lodash".to_string(), Some("get".to_string()))
        );
        assert_eq!(
            parse_bare_specifier("@types/node"),
            ("@types/node".to_string(), None)
        );
        assert_eq!(
            parse_bare_specifier("@babel/core/lib/parse"),
            ("@babel/core".to_string(), Some("lib/parse".to_string()))
        );
    }

    #[test]
    fn test_is_bare_specifier() {
        assert!(is_bare_specifier("lodash"));
        assert!(is_bare_specifier("@scope/pkg"));
        assert!(!is_bare_specifier("./utils"));
        assert!(!is_bare_specifier("../utils"));
        assert!(!is_bare_specifier("/abs/utils"));
    }

    #[test]
    fn test_resolve_relative_with_extension_probe() {
        let (_dir, root) = root();
        let src = root.join("src");
        std::fs::create_dir(&src).unwrap();
        std::fs::write(src.join("utils.ts"), "export const x = 1;").unwrap();

        let resolver = ModuleResolver::new(&root);
        let path = resolver
            .resolve_from_file("./utils", &src.join("index.ts"))
            .unwrap();
        assert_eq!(path, src.join("utils.ts"));
    }

    #[test]
    fn test_resolve_exact_file_first() {
        let (_dir, root) = root();
        std::fs::write(root.join("baz.js"), "").unwrap();
        std::fs::write(root.join("baz.js.ts"), "").unwrap();

        let resolver = ModuleResolver::new(&root);
        let path = resolver.resolve("./baz.js", &root).unwrap();
        assert_eq!(path, root.join("baz.js"));
    }

    #[test]
    fn test_resolve_directory_index() {
        let (_dir, root) = root();
        std::fs::create_dir(root.join("lib")).unwrap();
        std::fs::write(root.join("lib/index.js"), "").unwrap();

        let resolver = ModuleResolver::new(&root);
        assert_eq!(resolver.resolve("./lib", &root).unwrap(), root.join("lib/index.js"));
    }

    #[test]
    fn test_resolve_bare_package_exports() {
        let (_dir, root) = root();
        let pkg = root.join("node_modules/uuid");
        std::fs::create_dir_all(pkg.join("dist")).unwrap();
        std::fs::write(
            pkg.join("package.json"),
            r#"{ "name": "uuid", "exports": { ".": { "import": "./dist/index.mjs", "require": "./dist/index.cjs" } } }"#,
        )
        .unwrap();
        std::fs::write(pkg.join("dist/index.mjs"), "").unwrap();
        std::fs::write(pkg.join("dist/index.cjs"), "").unwrap();

        let resolver = ModuleResolver::new(&root);
        let path = resolver.resolve("uuid", &root.join("src")).unwrap();
        assert_eq!(path, pkg.join("dist/index.mjs"));
        assert!(is_external_path(&path));
    }

    #[test]
    fn test_resolve_bare_main_field() {
        let (_dir, root) = root();
        let pkg = root.join("node_modules/lodash-es");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("package.json"), r#"{ "main": "lodash" }"#).unwrap();
        std::fs::write(pkg.join("lodash.js"), "").unwrap();

        let resolver = ModuleResolver::new(&root);
        assert_eq!(
            resolver.resolve("lodash-es", &root).unwrap(),
            pkg.join("lodash.js")
        );
    }

    #[test]
    fn test_resolve_missing() {
        let (_dir, root) = root();
        let resolver = ModuleResolver::new(&root);
        let err = resolver.resolve("./nope", &root).unwrap_err();
        assert!(err.to_string().contains("Cannot resolve './nope'"));
        assert!(resolver.resolve("missing-pkg", &root).is_err());
        assert!(resolver.resolve("node:fs", &root).is_err());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/p/.storybook/./../lib/db")),
            PathBuf::from("/p/lib/db")
        );
        assert_eq!(normalize_path(Path::new("/p/a/../../..")), PathBuf::from("/"));
    }

    #[test]
    fn test_resolve_relative_from_missing_directory() {
        let (_dir, root) = root();
        std::fs::create_dir(root.join("src")).unwrap();
        std::fs::write(root.join("src/api.ts"), "").unwrap();

        let resolver = ModuleResolver::new(&root);
        let path = resolver
            .resolve("../src/api", &root.join("not-created"))
            .unwrap();
        assert_eq!(path, root.join("src/api.ts"));
    }

    #[test]
    fn test_resolve_mock_target_internal_with_override() {
        let (_dir, root) = root();
        let lib = root.join("lib");
        std::fs::create_dir_all(lib.join("__mocks__")).unwrap();
        std::fs::write(lib.join("db.ts"), "export const query = () => [];").unwrap();
        std::fs::write(lib.join("__mocks__/db.ts"), "export const query = () => [1];").unwrap();
        let importer = root.join(".storybook/preview.ts");

        let resolved =
            resolve_mock_target("../lib/db", &root, &importer, &MocksDirFinder::default())
                .unwrap();
        assert_eq!(resolved.absolute_path, lib.join("db.ts"));
        assert_eq!(resolved.redirect_path, Some(lib.join("__mocks__/db.ts")));
        assert!(!resolved.external);
    }
}
