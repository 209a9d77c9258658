//! Lookup of hand-written override modules in `__mocks__` directories.

use crate::config::DEFAULT_OVERRIDE_DIR;
use std::path::{Path, PathBuf};

/// Finds the override module for a resolved mock target.
pub trait OverrideFinder: Send + Sync {
    /// Return the override for `absolute_path`, if one exists.
    ///
    /// `external` carries the bare specifier when the target lives in a
    /// dependency package.
    fn find_override(
        &self,
        root: &Path,
        absolute_path: &Path,
        external: Option<&str>,
    ) -> Option<PathBuf>;
}

/// Looks for overrides in directories named [`DEFAULT_OVERRIDE_DIR`] (or a
/// custom name).
///
/// - Package targets: `<root>/__mocks__/<specifier dir>/` is searched for an
///   entry whose stem matches the specifier basename. A matching directory
///   resolves to its `index` file.
/// - Project targets: `<dir of target>/__mocks__/<file name>` must exist.
#[derive(Debug, Clone)]
pub struct MocksDirFinder {
    dir_name: String,
}

impl Default for MocksDirFinder {
    fn default() -> Self {
        Self::new(DEFAULT_OVERRIDE_DIR)
    }
}

impl MocksDirFinder {
    /// Create a finder that looks in directories named `dir_name`.
    #[must_use]
    pub fn new(dir_name: impl Into<String>) -> Self {
        Self {
            dir_name: dir_name.into(),
        }
    }

    /// Name of the override directory.
    #[must_use]
    pub fn dir_name(&self) -> &str {
        &self.dir_name
    }

    fn find_in_folder(folder: &Path, base: &str) -> Option<PathBuf> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(folder)
            .ok()?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        entries.sort();

        for entry in entries {
            let stem = entry.file_stem().and_then(|s| s.to_str());
            if stem != Some(base) {
                continue;
            }
            if entry.is_file() {
                return Some(entry);
            }
            if entry.is_dir() {
                if let Some(index) = Self::find_in_folder(&entry, "index") {
                    return Some(index);
                }
            }
        }
        None
    }
}

impl OverrideFinder for MocksDirFinder {
    fn find_override(
        &self,
        root: &Path,
        absolute_path: &Path,
        external: Option<&str>,
    ) -> Option<PathBuf> {
        if let Some(specifier) = external {
            let spec_path = Path::new(specifier);
            let base = spec_path.file_name()?.to_str()?;
            let mut folder = root.join(&self.dir_name);
            if let Some(parent) = spec_path.parent() {
                folder.push(parent);
            }
            if !folder.is_dir() {
                return None;
            }
            return Self::find_in_folder(&folder, base);
        }

        let dir = absolute_path.parent()?;
        let file_name = absolute_path.file_name()?;
        let candidate = dir.join(&self.dir_name).join(file_name);
        candidate.is_file().then_some(candidate)
    }
}
