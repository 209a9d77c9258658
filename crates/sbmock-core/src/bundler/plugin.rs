//! Per-file hook model for dev-server style hosts.
//!
//! A host resolves the config, hands the plugin its module graph and client
//! channel, then calls `load` and `transform` for every module id it serves
//! and `watch_change` for every file event. [`PluginContainer`] runs the
//! registered plugins in `enforce` order.
//!
//! ```ignore
//! use sbmock_core::bundler::{HookResult, Plugin, PluginContext, TransformResult};
//!
//! struct Banner;
//!
//! impl Plugin for Banner {
//!     fn name(&self) -> &str { "banner" }
//!
//!     fn transform(&self, code: &str, _id: &str, _ctx: &PluginContext) -> HookResult<Option<TransformResult>> {
//!         Ok(Some(TransformResult::code(format!("/* banner */\n{code}"))))
//!     }
//! }
//! ```

#![allow(clippy::unused_self)]
#![allow(clippy::unnecessary_literal_bound)]

use super::graph::{HotChannel, ModuleGraph};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub type HookResult<T> = Result<T, PluginError>;

/// A hook that failed, tagged with the plugin that raised it.
#[derive(Debug, Error)]
#[error("[{plugin}] {hook}: {message}")]
pub struct PluginError {
    pub plugin: String,
    pub hook: &'static str,
    pub message: String,
}

impl PluginError {
    pub fn new(plugin: impl Into<String>, hook: &'static str, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            hook,
            message: message.into(),
        }
    }
}

/// State shared by every hook call of one container.
#[derive(Debug, Default)]
pub struct PluginContext {
    /// Host working directory.
    pub cwd: PathBuf,
    /// Set when the host keeps running and re-serves on file changes.
    pub watch: bool,
}

impl PluginContext {
    pub fn new(cwd: PathBuf) -> Self {
        Self { cwd, watch: false }
    }
}

/// Module text with an optional source map, as returned by `load` and
/// `transform`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleCode {
    pub code: String,
    pub map: Option<String>,
}

impl ModuleCode {
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            map: None,
        }
    }

    pub fn with_map(mut self, map: Option<String>) -> Self {
        self.map = map;
        self
    }
}

pub type LoadResult = ModuleCode;
pub type TransformResult = ModuleCode;

/// Where a plugin sits in the chain. Same meaning as Vite's `enforce`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PluginEnforce {
    Pre,
    #[default]
    Normal,
    Post,
}

/// Whether the host is serving or producing a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    #[default]
    Serve,
    Build,
}

/// Resolved host configuration, passed to `config_resolved`.
#[derive(Debug, Clone)]
pub struct DevConfig {
    pub root: PathBuf,
    pub command: Command,
}

impl DevConfig {
    pub fn new(root: impl Into<PathBuf>, command: Command) -> Self {
        Self {
            root: root.into(),
            command,
        }
    }
}

/// Handles on the running dev server, passed to `configure_server`.
#[derive(Clone)]
pub struct ServerContext {
    pub root: PathBuf,
    pub module_graph: Arc<dyn ModuleGraph>,
    /// Channel to connected clients.
    pub hot: Arc<dyn HotChannel>,
}

impl ServerContext {
    pub fn new(root: PathBuf, module_graph: Arc<dyn ModuleGraph>, hot: Arc<dyn HotChannel>) -> Self {
        Self {
            root,
            module_graph,
            hot,
        }
    }
}

impl std::fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerContext")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

/// A changed file about to be hot-updated.
#[derive(Debug, Clone)]
pub struct HotUpdateContext {
    /// Absolute path of the changed file.
    pub file: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Module ids backed by `file`.
    pub modules: Vec<String>,
}

/// Kind of file-system change reported by the host watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Create,
    Update,
    Delete,
}

/// Hooks a per-file host calls. Every hook defaults to a no-op.
///
/// Hooks are synchronous: when a hook returns, its effects are visible to
/// every later hook call. Hosts must not run `load`/`transform` for a file
/// event before `watch_change` for that event has returned.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn enforce(&self) -> PluginEnforce {
        PluginEnforce::Normal
    }

    /// Final host configuration, delivered once before anything is served.
    fn config_resolved(&self, _config: &DevConfig) -> HookResult<()> {
        Ok(())
    }

    /// Dev server handles. Not called for builds.
    fn configure_server(&self, _server: &ServerContext) -> HookResult<()> {
        Ok(())
    }

    fn build_start(&self, _ctx: &PluginContext) -> HookResult<()> {
        Ok(())
    }

    /// Provide the source for `id`. The first plugin returning `Some` wins;
    /// with no winner the host reads the file.
    fn load(&self, _id: &str, _ctx: &PluginContext) -> HookResult<Option<LoadResult>> {
        Ok(None)
    }

    /// Rewrite the source of `id`. Results chain through every plugin.
    fn transform(
        &self,
        _code: &str,
        _id: &str,
        _ctx: &PluginContext,
    ) -> HookResult<Option<TransformResult>> {
        Ok(None)
    }

    /// `Some(modules)` replaces the list of modules the host would update;
    /// an empty list means the plugin handles the change itself.
    fn handle_hot_update(&self, _ctx: &HotUpdateContext) -> HookResult<Option<Vec<String>>> {
        Ok(None)
    }

    /// Every add, change or unlink seen by the host watcher.
    fn watch_change(&self, _path: &Path, _kind: WatchEventKind) -> HookResult<()> {
        Ok(())
    }
}

/// Registered plugins in `Pre`, `Normal`, `Post` order; insertion order
/// within a level.
pub struct PluginContainer {
    plugins: Vec<Arc<dyn Plugin>>,
    ctx: PluginContext,
}

impl PluginContainer {
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            plugins: Vec::new(),
            ctx: PluginContext::new(cwd),
        }
    }

    pub fn add(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
        // Stable sort keeps insertion order within a level.
        self.plugins.sort_by_key(|p| p.enforce());
    }

    pub fn set_watch(&mut self, watch: bool) {
        self.ctx.watch = watch;
    }

    /// Plugin names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn call_config_resolved(&self, config: &DevConfig) -> HookResult<()> {
        self.plugins
            .iter()
            .try_for_each(|plugin| plugin.config_resolved(config))
    }

    pub fn call_configure_server(&self, server: &ServerContext) -> HookResult<()> {
        self.plugins
            .iter()
            .try_for_each(|plugin| plugin.configure_server(server))
    }

    pub fn build_start(&self) -> HookResult<()> {
        self.plugins
            .iter()
            .try_for_each(|plugin| plugin.build_start(&self.ctx))
    }

    /// First plugin-provided source for `id`, if any.
    pub fn load(&self, id: &str) -> HookResult<Option<LoadResult>> {
        for plugin in &self.plugins {
            if let Some(result) = plugin.load(id, &self.ctx)? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    /// Run `code` through every plugin's `transform`. The last map wins.
    pub fn transform(&self, code: &str, id: &str) -> HookResult<TransformResult> {
        let mut current = TransformResult::code(code);
        for plugin in &self.plugins {
            let Some(result) = plugin.transform(&current.code, id, &self.ctx)? else {
                continue;
            };
            current.code = result.code;
            if result.map.is_some() {
                current.map = result.map;
            }
        }
        Ok(current)
    }

    /// First non-`None` answer from `handle_hot_update`.
    pub fn call_handle_hot_update(
        &self,
        ctx: &HotUpdateContext,
    ) -> HookResult<Option<Vec<String>>> {
        for plugin in &self.plugins {
            if let Some(modules) = plugin.handle_hot_update(ctx)? {
                return Ok(Some(modules));
            }
        }
        Ok(None)
    }

    pub fn call_watch_change(&self, path: &Path, kind: WatchEventKind) -> HookResult<()> {
        self.plugins
            .iter()
            .try_for_each(|plugin| plugin.watch_change(path, kind))
    }
}

impl Default for PluginContainer {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}
