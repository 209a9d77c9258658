//! Mock adapter for per-file plugin hosts.

use crate::bundler::{
    Command, DevConfig, HookResult, HotPayload, HotUpdateContext, LoadResult, Plugin,
    PluginContext, PluginEnforce, ServerContext, TransformResult, WatchEventKind,
};
use crate::mocking::{
    automock_module, clean_id, rewrite_sb_mock_import_calls, AutomockOptions, MockDecision,
    MockRegistry,
};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info, warn};

/// Plugin name reported to hosts.
pub const MOCK_LOADER_PLUGIN_NAME: &str = "sbmock:mock-loader";

/// Serves overrides and automocked modules, and keeps the dev server's
/// module graph in step with the preview file.
pub struct MockLoaderPlugin {
    registry: Arc<MockRegistry>,
    options: AutomockOptions,
    command: RwLock<Command>,
    server: RwLock<Option<ServerContext>>,
}

impl MockLoaderPlugin {
    #[must_use]
    pub fn new(registry: Arc<MockRegistry>) -> Self {
        let options = AutomockOptions::new(registry.settings().global_accessor.clone());
        Self {
            registry,
            options,
            command: RwLock::new(Command::Serve),
            server: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &MockRegistry {
        &self.registry
    }

    fn serving(&self) -> bool {
        *self.command.read().unwrap_or_else(PoisonError::into_inner) == Command::Serve
    }

    /// Re-extract, invalidate the preview module plus every affected module,
    /// then ask clients to reload.
    fn reextract(&self, trigger: &Path) {
        let delta = self.registry.refresh();

        let server = self
            .server
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(server) = server else {
            debug!(file = %trigger.display(), "No dev server configured; skipping invalidation");
            return;
        };

        let mut invalidated = server
            .module_graph
            .invalidate_file(&self.registry.preview().preview_config_path);
        for path in delta.affected() {
            invalidated.extend(server.module_graph.invalidate_file(&path));
        }
        info!(
            file = %trigger.display(),
            modules = invalidated.len(),
            "Mocks changed; reloading"
        );

        server.hot.send(HotPayload::FullReload {
            path: Some(trigger.display().to_string()),
        });
    }
}

impl Plugin for MockLoaderPlugin {
    fn name(&self) -> &str {
        MOCK_LOADER_PLUGIN_NAME
    }

    fn enforce(&self) -> PluginEnforce {
        PluginEnforce::Pre
    }

    fn config_resolved(&self, config: &DevConfig) -> HookResult<()> {
        *self.command.write().unwrap_or_else(PoisonError::into_inner) = config.command;
        Ok(())
    }

    fn configure_server(&self, server: &ServerContext) -> HookResult<()> {
        *self.server.write().unwrap_or_else(PoisonError::into_inner) = Some(server.clone());
        Ok(())
    }

    fn build_start(&self, _ctx: &PluginContext) -> HookResult<()> {
        self.registry.refresh();
        Ok(())
    }

    fn load(&self, id: &str, _ctx: &PluginContext) -> HookResult<Option<LoadResult>> {
        let MockDecision::Redirect(redirect) = self.registry.decide(id, self.serving()) else {
            return Ok(None);
        };

        match std::fs::read_to_string(&redirect) {
            Ok(code) => {
                debug!(id, redirect = %redirect.display(), "Serving mock override");
                Ok(Some(LoadResult::code(code)))
            }
            Err(e) => {
                warn!(id, redirect = %redirect.display(), error = %e, "Could not read mock override");
                Ok(None)
            }
        }
    }

    fn transform(
        &self,
        code: &str,
        id: &str,
        _ctx: &PluginContext,
    ) -> HookResult<Option<TransformResult>> {
        if self.registry.is_preview(id) {
            return match rewrite_sb_mock_import_calls(
                code,
                Path::new(clean_id(id)),
                self.registry.parser(),
            ) {
                Ok(out) if out.changed => Ok(Some(TransformResult::code(out.code))),
                Ok(_) => Ok(None),
                Err(e) => {
                    debug!(id, error = %e, "Could not rewrite preview config");
                    Ok(None)
                }
            };
        }

        let MockDecision::Automock(mode) = self.registry.decide(id, self.serving()) else {
            return Ok(None);
        };

        match automock_module(
            code,
            Path::new(clean_id(id)),
            mode,
            self.registry.parser(),
            &self.options,
        ) {
            Ok(output) => {
                debug!(id, %mode, "Serving automocked module");
                Ok(Some(
                    TransformResult::code(output.code).with_map(output.source_map),
                ))
            }
            Err(e) => {
                error!(id, error = %e, "Automock failed; serving original module");
                Ok(None)
            }
        }
    }

    fn handle_hot_update(&self, ctx: &HotUpdateContext) -> HookResult<Option<Vec<String>>> {
        // Trigger files are handled by a full reload from `watch_change`.
        if self.registry.is_trigger(Path::new(&ctx.file)) {
            return Ok(Some(Vec::new()));
        }
        Ok(None)
    }

    fn watch_change(&self, path: &Path, kind: WatchEventKind) -> HookResult<()> {
        if self.registry.is_trigger(path) {
            debug!(file = %path.display(), ?kind, "Mock trigger changed");
            self.reextract(path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{DevModuleGraph, HotChannel, ModuleGraph, PluginContainer};
    use crate::config::{MockerSettings, PreviewConfig};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingChannel(Mutex<Vec<HotPayload>>);

    impl HotChannel for RecordingChannel {
        fn send(&self, payload: HotPayload) {
            self.0.lock().unwrap().push(payload);
        }
    }

    struct Server {
        _dir: tempfile::TempDir,
        root: PathBuf,
        container: PluginContainer,
        graph: Arc<DevModuleGraph>,
        hot: Arc<RecordingChannel>,
    }

    impl Server {
        fn start(preview: &str) -> Self {
            let dir = tempdir().unwrap();
            let root = dunce::canonicalize(dir.path()).unwrap();
            std::fs::create_dir_all(root.join(".storybook")).unwrap();
            for name in ["a", "b", "c"] {
                std::fs::write(
                    root.join(format!("{name}.ts")),
                    format!("export const {name} = () => '{name}';\n"),
                )
                .unwrap();
            }
            let preview_path = root.join(".storybook/preview.ts");
            std::fs::write(&preview_path, preview).unwrap();

            let registry = Arc::new(MockRegistry::with_defaults(
                PreviewConfig::new(&preview_path),
                &root,
                MockerSettings::default(),
            ));
            let graph = Arc::new(DevModuleGraph::new());
            let hot = Arc::new(RecordingChannel::default());

            let mut container = PluginContainer::new(root.clone());
            container.add(Arc::new(MockLoaderPlugin::new(registry)));
            container
                .call_config_resolved(&DevConfig::new(&root, Command::Serve))
                .unwrap();
            container
                .call_configure_server(&ServerContext::new(
                    root.clone(),
                    graph.clone(),
                    hot.clone(),
                ))
                .unwrap();
            container.build_start().unwrap();

            Self {
                _dir: dir,
                root,
                container,
                graph,
                hot,
            }
        }

        fn id(&self, rel: &str) -> String {
            self.root.join(rel).display().to_string()
        }

        /// Load + transform, as the host would serve a module.
        fn serve(&self, rel: &str) -> String {
            let id = self.id(rel);
            let code = match self.container.load(&id).unwrap() {
                Some(loaded) => loaded.code,
                None => std::fs::read_to_string(self.root.join(rel)).unwrap(),
            };
            let out = self.container.transform(&code, &id).unwrap();
            self.graph.ensure_module(&id, &id);
            self.graph.set_transform_result(&id, out.code.clone());
            out.code
        }
    }

    #[test]
    fn test_serves_automock_for_declared_module() {
        let server = Server::start("sb.mock('../a', { spy: true });");
        let code = server.serve("a.ts");
        assert!(code.contains("mockObject(__sb_module_shape__, \"autospy\")"));

        let untouched = server.serve("b.ts");
        assert!(!untouched.contains("mockObject"));
    }

    #[test]
    fn test_serves_override_verbatim() {
        let dir_server = Server::start("");
        std::fs::create_dir_all(dir_server.root.join("__mocks__")).unwrap();
        std::fs::write(
            dir_server.root.join("__mocks__/b.ts"),
            "export const b = () => 'fake';\n",
        )
        .unwrap();
        std::fs::write(
            dir_server.root.join(".storybook/preview.ts"),
            "sb.mock('../b');",
        )
        .unwrap();
        dir_server
            .container
            .call_watch_change(
                &dir_server.root.join(".storybook/preview.ts"),
                WatchEventKind::Update,
            )
            .unwrap();

        assert_eq!(dir_server.serve("b.ts"), "export const b = () => 'fake';\n");
    }

    #[test]
    fn test_preview_import_calls_rewritten() {
        let server = Server::start("sb.mock(import('../a.ts'));\n");
        let code = server.serve(".storybook/preview.ts");
        assert_eq!(code, "sb.mock('../a.ts');\n");
    }

    #[test]
    fn test_invalidation_completeness() {
        let server = Server::start("sb.mock('../a'); sb.mock('../b');");
        for rel in ["a.ts", "b.ts", "c.ts", ".storybook/preview.ts"] {
            server.serve(rel);
        }
        assert!(server
            .graph
            .transform_result(&server.id("a.ts"))
            .unwrap()
            .contains("mockObject"));

        let preview = server.root.join(".storybook/preview.ts");
        std::fs::write(&preview, "sb.mock('../b'); sb.mock('../c');").unwrap();
        server
            .container
            .call_watch_change(&preview, WatchEventKind::Update)
            .unwrap();

        for rel in ["a.ts", "b.ts", "c.ts", ".storybook/preview.ts"] {
            assert_eq!(server.graph.transform_result(&server.id(rel)), None, "{rel}");
        }
        assert_eq!(
            *server.hot.0.lock().unwrap(),
            vec![HotPayload::FullReload {
                path: Some(preview.display().to_string())
            }]
        );

        assert!(!server.serve("a.ts").contains("mockObject"));
        assert!(server.serve("c.ts").contains("mockObject"));
    }

    #[test]
    fn test_unrelated_change_is_ignored() {
        let server = Server::start("sb.mock('../a');");
        server.serve("a.ts");
        server
            .container
            .call_watch_change(&server.root.join("c.ts"), WatchEventKind::Update)
            .unwrap();
        assert!(server.graph.transform_result(&server.id("a.ts")).is_some());
        assert!(server.hot.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_automock_failure_falls_back_to_original() {
        let server = Server::start("sb.mock('../a');");
        std::fs::write(server.root.join("a.ts"), "export * from './b';\n").unwrap();
        assert_eq!(server.serve("a.ts"), "export * from './b';\n");
    }

    #[test]
    fn test_hot_update_suppressed_for_triggers() {
        let server = Server::start("");
        let ctx = HotUpdateContext {
            file: server.root.join("__mocks__/x.ts").display().to_string(),
            timestamp: 0,
            modules: Vec::new(),
        };
        assert_eq!(
            server.container.call_handle_hot_update(&ctx).unwrap(),
            Some(Vec::new())
        );
    }

    #[test]
    fn test_graph_trait_object() {
        let graph: Arc<dyn ModuleGraph> = Arc::new(DevModuleGraph::new());
        assert!(graph.invalidate_file(Path::new("/nope")).is_empty());
    }
}
