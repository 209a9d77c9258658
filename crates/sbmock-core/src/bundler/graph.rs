//! Dev-server module graph and client channel.
//!
//! [`ModuleGraph`] and [`HotChannel`] are the seams a plugin sees; hosts
//! plug in their own. [`DevModuleGraph`] is an in-memory implementation
//! that caches transform results and tracks importers.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{PoisonError, RwLock};

/// Module graph operations a plugin may call.
pub trait ModuleGraph: Send + Sync {
    /// Drop the cached state of every module backed by `file`, and of the
    /// modules importing it. Returns the invalidated module ids.
    fn invalidate_file(&self, file: &Path) -> Vec<String>;
}

/// Message sent to connected clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotPayload {
    /// Reload the whole page. `path` is the file that caused it.
    FullReload { path: Option<String> },
    /// Custom event.
    Custom { event: String, data: String },
}

/// Channel to connected clients.
pub trait HotChannel: Send + Sync {
    fn send(&self, payload: HotPayload);
}

/// A node in the dev module graph.
#[derive(Debug, Clone)]
pub struct DevModuleNode {
    /// Module id (usually the resolved file path, possibly with a query).
    pub id: String,
    /// The file path on disk.
    pub file: String,
    /// Modules that import this module.
    pub importers: HashSet<String>,
    /// Modules that this module imports.
    pub imported_modules: HashSet<String>,
    /// Cached transform output, `None` once invalidated.
    pub transform_result: Option<String>,
    /// Last invalidation timestamp.
    pub last_invalidation_timestamp: u64,
}

impl DevModuleNode {
    #[must_use]
    pub fn new(id: String, file: String) -> Self {
        Self {
            id,
            file,
            importers: HashSet::new(),
            imported_modules: HashSet::new(),
            transform_result: None,
            last_invalidation_timestamp: 0,
        }
    }
}

/// In-memory module graph with cached transforms.
#[derive(Debug, Default)]
pub struct DevModuleGraph {
    /// id → node.
    modules: RwLock<HashMap<String, DevModuleNode>>,
    /// File path → ids backed by it.
    file_to_ids: RwLock<HashMap<String, HashSet<String>>>,
}

impl DevModuleGraph {
    /// Create a new empty module graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module in the graph.
    pub fn ensure_module(&self, id: &str, file: &str) {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        if !modules.contains_key(id) {
            modules.insert(
                id.to_string(),
                DevModuleNode::new(id.to_string(), file.to_string()),
            );
            self.file_to_ids
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(file.to_string())
                .or_default()
                .insert(id.to_string());
        }
    }

    /// Update the import relationships for a module.
    pub fn update_module_imports(&self, id: &str, imports: &[String]) {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);

        // Remove old importer references
        if let Some(module) = modules.get(id) {
            let old_imports: Vec<String> = module.imported_modules.iter().cloned().collect();
            for old_import in &old_imports {
                if let Some(imported_mod) = modules.get_mut(old_import) {
                    imported_mod.importers.remove(id);
                }
            }
        }

        if let Some(module) = modules.get_mut(id) {
            module.imported_modules = imports.iter().cloned().collect();
        }

        for import in imports {
            if let Some(imported_mod) = modules.get_mut(import) {
                imported_mod.importers.insert(id.to_string());
            }
        }
    }

    /// Store the transform output served for a module.
    pub fn set_transform_result(&self, id: &str, code: impl Into<String>) {
        if let Some(module) = self
            .modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(id)
        {
            module.transform_result = Some(code.into());
        }
    }

    /// Cached transform output, if still valid.
    #[must_use]
    pub fn transform_result(&self, id: &str) -> Option<String> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .and_then(|m| m.transform_result.clone())
    }

    /// Ids of modules backed by `file`.
    #[must_use]
    pub fn ids_by_file(&self, file: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .file_to_ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(file)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Invalidate every id in `queue` and, transitively, their importers.
    ///
    /// Each module is visited at most once, so import cycles terminate.
    /// Returns the invalidated ids in visit order.
    fn invalidate_from(&self, mut queue: Vec<String>, visited: &mut HashSet<String>) -> Vec<String> {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        let timestamp = now_ms();
        let mut invalidated = Vec::new();

        while let Some(id) = queue.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let Some(module) = modules.get_mut(&id) else {
                continue;
            };
            module.transform_result = None;
            module.last_invalidation_timestamp = timestamp;
            queue.extend(module.importers.iter().cloned());
            invalidated.push(id);
        }

        invalidated
    }

    /// Number of modules in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if the graph is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ModuleGraph for DevModuleGraph {
    fn invalidate_file(&self, file: &Path) -> Vec<String> {
        let ids = self.ids_by_file(&file.display().to_string());
        if ids.is_empty() {
            return Vec::new();
        }
        let mut visited = HashSet::new();
        self.invalidate_from(ids, &mut visited)
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
