//! Bundler host abstractions.
//!
//! Two plugin models are supported:
//!
//! 1. **Per-file hooks** ([`Plugin`], [`PluginContainer`]): `load` and
//!    `transform` per module id, a watcher hook, and a module graph the
//!    plugin invalidates itself.
//! 2. **Request-level replacement** ([`CompilerPlugin`], [`Compiler`]):
//!    compiler lifecycle hooks plus a hook that may rewrite every module
//!    request, with loaders addressed from the request string.
//!
//! [`import_specifiers`] lets per-file hosts record import edges in their
//! module graph.

mod compiler;
mod graph;
mod imports;
mod plugin;

pub use compiler::{
    parse_loader_request, CompileOutput, Compilation, Compiler, CompilerPlugin, Loader,
    LoaderRequest, ResourceRequest,
};
pub use graph::{DevModuleGraph, DevModuleNode, HotChannel, HotPayload, ModuleGraph};
pub use imports::import_specifiers;
pub use plugin::{
    Command, DevConfig, HookResult, HotUpdateContext, LoadResult, ModuleCode, Plugin,
    PluginContainer, PluginContext, PluginEnforce, PluginError, ServerContext, TransformResult,
    WatchEventKind,
};
