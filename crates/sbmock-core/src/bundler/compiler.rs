//! Request-level plugin interface for webpack-style hosts.
//!
//! The host runs a [`Compiler`] once per build (or per watch cycle). Plugins
//! see `before_run`/`watch_run`, may rewrite every module request through
//! `normal_module_replacement`, and add dependencies in `after_compile`.
//! Requests of the form `loader?query!/abs/path` are served through a
//! registered [`Loader`].

use super::plugin::{HookResult, PluginError, TransformResult};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A module request before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    /// Request string as written or as rewritten by a plugin.
    pub request: String,
    /// Directory of the importing module.
    pub context: PathBuf,
}

impl ResourceRequest {
    pub fn new(request: impl Into<String>, context: impl Into<PathBuf>) -> Self {
        Self {
            request: request.into(),
            context: context.into(),
        }
    }
}

/// Dependencies the host watches for the next cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compilation {
    /// Files whose change triggers a rebuild.
    pub file_dependencies: BTreeSet<PathBuf>,
    /// Directories whose contents trigger a rebuild.
    pub context_dependencies: BTreeSet<PathBuf>,
}

/// Hooks of a request-level plugin.
pub trait CompilerPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Called before a one-off build.
    fn before_run(&self) -> HookResult<()> {
        Ok(())
    }

    /// Called before each watch cycle with the files that changed.
    fn watch_run(&self, _changed: &[PathBuf]) -> HookResult<()> {
        Ok(())
    }

    /// Inspect and optionally rewrite a module request.
    fn normal_module_replacement(&self, _request: &mut ResourceRequest) -> HookResult<()> {
        Ok(())
    }

    /// Called after modules are compiled.
    fn after_compile(&self, _compilation: &mut Compilation) -> HookResult<()> {
        Ok(())
    }
}

/// A source loader addressed by name in request strings.
pub trait Loader: Send + Sync {
    fn name(&self) -> &str;

    /// Transform `source` read from `resource`. `query` is the text after `?`.
    fn run(&self, query: &str, resource: &Path, source: &str) -> HookResult<TransformResult>;
}

/// A request split into its loader part and resource path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderRequest<'a> {
    pub loader: Option<&'a str>,
    pub query: &'a str,
    pub resource: &'a str,
}

/// Split `loader?query!resource`. Requests without `!` have no loader.
#[must_use]
pub fn parse_loader_request(request: &str) -> LoaderRequest<'_> {
    match request.split_once('!') {
        Some((loader, resource)) => {
            let (name, query) = loader.split_once('?').unwrap_or((loader, ""));
            LoaderRequest {
                loader: Some(name),
                query,
                resource,
            }
        }
        None => LoaderRequest {
            loader: None,
            query: "",
            resource: request,
        },
    }
}

/// Output of one compiler run.
#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    /// Requests after module replacement, in input order.
    pub requests: Vec<ResourceRequest>,
    pub compilation: Compilation,
}

/// Drives [`CompilerPlugin`]s through a build or watch cycle.
#[derive(Default)]
pub struct Compiler {
    plugins: Vec<Arc<dyn CompilerPlugin>>,
    loaders: HashMap<String, Arc<dyn Loader>>,
}

impl Compiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_plugin(&mut self, plugin: Arc<dyn CompilerPlugin>) {
        self.plugins.push(plugin);
    }

    pub fn add_loader(&mut self, loader: Arc<dyn Loader>) {
        self.loaders.insert(loader.name().to_string(), loader);
    }

    /// One-off build: `before_run`, replacement, `after_compile`.
    pub fn run(&self, requests: Vec<ResourceRequest>) -> HookResult<CompileOutput> {
        for plugin in &self.plugins {
            plugin.before_run()?;
        }
        self.compile(requests)
    }

    /// Watch cycle: `watch_run`, replacement, `after_compile`.
    pub fn watch_run(
        &self,
        changed: &[PathBuf],
        requests: Vec<ResourceRequest>,
    ) -> HookResult<CompileOutput> {
        for plugin in &self.plugins {
            plugin.watch_run(changed)?;
        }
        self.compile(requests)
    }

    fn compile(&self, mut requests: Vec<ResourceRequest>) -> HookResult<CompileOutput> {
        for request in &mut requests {
            for plugin in &self.plugins {
                plugin.normal_module_replacement(request)?;
            }
        }

        let mut compilation = Compilation::default();
        for plugin in &self.plugins {
            plugin.after_compile(&mut compilation)?;
        }

        Ok(CompileOutput {
            requests,
            compilation,
        })
    }

    /// Read a (possibly loader-prefixed) resource and run its loader.
    pub fn load_module(&self, request: &str) -> HookResult<TransformResult> {
        let parsed = parse_loader_request(request);
        let resource = Path::new(parsed.resource);
        let source = std::fs::read_to_string(resource).map_err(|e| {
            PluginError::new("compiler", "load", format!("{}: {e}", resource.display()))
        })?;

        match parsed.loader {
            None => Ok(TransformResult::code(source)),
            Some(name) => {
                let loader = self.loaders.get(name).ok_or_else(|| {
                    PluginError::new("compiler", "load", format!("Unknown loader '{name}'"))
                })?;
                loader.run(parsed.query, resource, &source)
            }
        }
    }
}
