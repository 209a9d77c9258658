//! `sbmock watch` command implementation.
//!
//! Runs the dev-server adapter against a local module graph: the preview
//! file, every project module it reaches through its imports, and every
//! mocked module are served once, with their import edges recorded. File
//! changes are then fed
//! through the plugin hooks exactly as a dev server would. When the mocks
//! change, the invalidated modules and the reload request are reported and
//! the current set is served again.

use super::open_registry;
use miette::{IntoDiagnostic, Result};
use notify::{Config as NotifyConfig, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sbmock_core::bundler::{
    import_specifiers, Command, DevConfig, DevModuleGraph, HotChannel, HotPayload,
    HotUpdateContext, PluginContainer, ServerContext, WatchEventKind,
};
use sbmock_core::resolver::{is_external_path, ModuleResolver};
use sbmock_core::{Config, MockLoaderPlugin, MockRegistry};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Quiet period before a batch of file events is flushed.
const DEBOUNCE: Duration = Duration::from_millis(50);

/// Reports reload requests and remembers that one happened.
struct ReportingChannel {
    json: bool,
    reload_pending: AtomicBool,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum WatchEvent<'a> {
    FullReload { path: Option<&'a str> },
    Custom { event: &'a str, data: &'a str },
    Served { modules: usize, mocks: usize },
}

impl ReportingChannel {
    fn new(json: bool) -> Self {
        Self {
            json,
            reload_pending: AtomicBool::new(false),
        }
    }

    fn take_reload(&self) -> bool {
        self.reload_pending.swap(false, Ordering::SeqCst)
    }

    fn report(&self, event: &WatchEvent<'_>) {
        if self.json {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{line}");
            }
            return;
        }
        match event {
            WatchEvent::FullReload { path } => {
                println!("  full reload ({})", path.unwrap_or("unknown"));
            }
            WatchEvent::Custom { event, .. } => println!("  event: {event}"),
            WatchEvent::Served { modules, mocks } => {
                println!("  serving {modules} modules ({mocks} mocked)");
            }
        }
    }
}

impl HotChannel for ReportingChannel {
    fn send(&self, payload: HotPayload) {
        match &payload {
            HotPayload::FullReload { path } => {
                self.reload_pending.store(true, Ordering::SeqCst);
                self.report(&WatchEvent::FullReload {
                    path: path.as_deref(),
                });
            }
            HotPayload::Custom { event, data } => {
                self.report(&WatchEvent::Custom { event, data });
            }
        }
    }
}

/// The adapter plus the host pieces it talks to.
struct DevHost {
    registry: Arc<MockRegistry>,
    resolver: ModuleResolver,
    container: PluginContainer,
    graph: Arc<DevModuleGraph>,
    hot: Arc<ReportingChannel>,
}

impl DevHost {
    fn start(config: &Config) -> Result<Self> {
        let registry = open_registry(config)?;
        let graph = Arc::new(DevModuleGraph::new());
        let hot = Arc::new(ReportingChannel::new(config.json_logs));

        let mut container = PluginContainer::new(config.cwd.clone());
        container.set_watch(true);
        container.add(Arc::new(MockLoaderPlugin::new(registry.clone())));
        container
            .call_config_resolved(&DevConfig::new(&config.cwd, Command::Serve))
            .into_diagnostic()?;
        container
            .call_configure_server(&ServerContext::new(
                config.cwd.clone(),
                graph.clone(),
                hot.clone(),
            ))
            .into_diagnostic()?;
        container.build_start().into_diagnostic()?;

        Ok(Self {
            resolver: ModuleResolver::new(registry.root()),
            registry,
            container,
            graph,
            hot,
        })
    }

    /// Serve the preview file with everything it imports, then every
    /// mocked module, as a reloaded page would request them.
    fn serve_all(&self) {
        let mut roots = vec![self.registry.preview().preview_config_path.clone()];
        let declarations = self.registry.declarations();
        roots.extend(declarations.iter().map(|d| d.absolute_path.clone()));

        let mut visited = HashSet::new();
        let served: usize = roots
            .iter()
            .map(|path| self.serve(path, &mut visited))
            .sum();
        self.hot.report(&WatchEvent::Served {
            modules: served,
            mocks: declarations.len(),
        });
    }

    /// Serve `path` and the project modules it imports. Returns how many
    /// modules were served.
    fn serve(&self, path: &Path, visited: &mut HashSet<PathBuf>) -> usize {
        if !visited.insert(path.to_path_buf()) {
            return 0;
        }

        let id = path.display().to_string();
        let code = match self.container.load(&id) {
            Ok(Some(loaded)) => loaded.code,
            Ok(None) => match sbmock_util::fs::read_to_string_lossy(path) {
                Ok(code) => code,
                Err(e) => {
                    warn!(id, error = %e, "Could not read module");
                    return 0;
                }
            },
            Err(e) => {
                warn!(id, error = %e, "Load failed");
                return 0;
            }
        };

        let out = match self.container.transform(&code, &id) {
            Ok(out) => out,
            Err(e) => {
                warn!(id, error = %e, "Transform failed");
                return 0;
            }
        };

        let imports = self.resolve_imports(path, &out.code);
        self.graph.ensure_module(&id, &id);
        self.graph.set_transform_result(&id, out.code);

        // Imported modules must exist in the graph before edges are recorded.
        let mut served = 1;
        for import in &imports {
            if is_external_path(import) {
                let import_id = import.display().to_string();
                self.graph.ensure_module(&import_id, &import_id);
            } else {
                served += self.serve(import, visited);
            }
        }
        let import_ids: Vec<String> = imports.iter().map(|p| p.display().to_string()).collect();
        self.graph.update_module_imports(&id, &import_ids);
        served
    }

    /// Files imported by the served code of `path`. Unresolvable specifiers
    /// are skipped.
    fn resolve_imports(&self, path: &Path, code: &str) -> Vec<PathBuf> {
        let parsed = match self.registry.parser().parse(code, path) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(file = %path.display(), error = %e, "Could not scan imports");
                return Vec::new();
            }
        };
        import_specifiers(&parsed.module)
            .into_iter()
            .filter_map(|specifier| match self.resolver.resolve_from_file(&specifier, path) {
                Ok(resolved) => Some(resolved),
                Err(e) => {
                    debug!(file = %path.display(), error = %e, "Import not resolved");
                    None
                }
            })
            .collect()
    }

    fn handle_changes(&self, changed: Vec<(PathBuf, WatchEventKind)>) {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        for (path, kind) in changed {
            let file = path.display().to_string();
            let ctx = HotUpdateContext {
                modules: self.graph.ids_by_file(&file),
                file,
                timestamp,
            };
            match self.container.call_handle_hot_update(&ctx) {
                Ok(Some(modules)) if modules.is_empty() => {
                    debug!(file = %ctx.file, "Hot update suppressed");
                }
                Ok(_) => {}
                Err(e) => warn!(file = %ctx.file, error = %e, "Hot update hook failed"),
            }

            if let Err(e) = self.container.call_watch_change(&path, kind) {
                warn!(file = %path.display(), error = %e, "Watch hook failed");
            }
        }

        if self.hot.take_reload() {
            self.serve_all();
        }
    }
}

pub async fn run(config: &Config) -> Result<()> {
    let host = DevHost::start(config)?;
    host.serve_all();
    info!(
        root = %config.cwd.display(),
        preview = %host.registry.preview().preview_config_path.display(),
        "Watching for mock changes"
    );

    let (change_tx, mut change_rx) = mpsc::channel::<Vec<(PathBuf, WatchEventKind)>>(16);
    let watch_root = config.cwd.clone();
    std::thread::spawn(move || {
        if let Err(e) = watch_files(&watch_root, &change_tx) {
            warn!(error = %e, "File watcher stopped");
        }
    });

    loop {
        tokio::select! {
            changed = change_rx.recv() => {
                let Some(changed) = changed else { break };
                host.handle_changes(changed);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping");
                break;
            }
        }
    }
    Ok(())
}

fn should_ignore(path: &Path) -> bool {
    path.components().any(|c| {
        matches!(
            c.as_os_str().to_str(),
            Some("node_modules" | "target" | ".git" | "dist" | "storybook-static")
        )
    })
}

fn event_kind(kind: EventKind) -> Option<WatchEventKind> {
    match kind {
        EventKind::Create(_) => Some(WatchEventKind::Create),
        EventKind::Modify(_) => Some(WatchEventKind::Update),
        EventKind::Remove(_) => Some(WatchEventKind::Delete),
        _ => None,
    }
}

/// Blocking watcher loop: batches events until the file system is quiet for
/// [`DEBOUNCE`], then hands the batch to the async side.
fn watch_files(
    root: &Path,
    change_tx: &mpsc::Sender<Vec<(PathBuf, WatchEventKind)>>,
) -> notify::Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = RecommendedWatcher::new(tx, NotifyConfig::default())?;
    watcher.watch(root, RecursiveMode::Recursive)?;

    let mut pending: HashMap<PathBuf, WatchEventKind> = HashMap::new();
    loop {
        match rx.recv_timeout(DEBOUNCE) {
            Ok(Ok(event)) => {
                let Some(kind) = event_kind(event.kind) else {
                    continue;
                };
                for path in event.paths {
                    if !should_ignore(&path) {
                        pending.insert(path, kind);
                    }
                }
            }
            Ok(Err(e)) => warn!(error = %e, "Watch error"),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                if pending.is_empty() {
                    continue;
                }
                let mut batch: Vec<_> = pending.drain().collect();
                batch.sort_by(|a, b| a.0.cmp(&b.0));
                if change_tx.blocking_send(batch).is_err() {
                    break;
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbmock_core::bundler::ModuleGraph;

    #[test]
    fn test_should_ignore_dependency_dirs() {
        assert!(should_ignore(Path::new("/p/node_modules/x/index.js")));
        assert!(should_ignore(Path::new("/p/.git/HEAD")));
        assert!(!should_ignore(Path::new("/p/src/__mocks__/a.ts")));
        assert!(!should_ignore(Path::new("/p/.storybook/preview.ts")));
    }

    #[test]
    fn test_event_kind_mapping() {
        use notify::event::{CreateKind, ModifyKind, RemoveKind};
        assert_eq!(
            event_kind(EventKind::Create(CreateKind::File)),
            Some(WatchEventKind::Create)
        );
        assert_eq!(
            event_kind(EventKind::Modify(ModifyKind::Any)),
            Some(WatchEventKind::Update)
        );
        assert_eq!(
            event_kind(EventKind::Remove(RemoveKind::File)),
            Some(WatchEventKind::Delete)
        );
        assert_eq!(event_kind(EventKind::Access(notify::event::AccessKind::Any)), None);
    }

    #[test]
    fn test_serve_all_records_import_edges() {
        let dir = tempfile::tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join(".storybook")).unwrap();
        std::fs::write(
            root.join("src/api.ts"),
            "export const fetchUser = () => null;\n",
        )
        .unwrap();
        std::fs::write(
            root.join("src/Button.tsx"),
            "import { fetchUser } from './api';\nexport const Button = () => fetchUser();\n",
        )
        .unwrap();
        std::fs::write(
            root.join(".storybook/preview.ts"),
            "import '../src/Button';\nsb.mock('../src/api');\n",
        )
        .unwrap();

        let config = Config::new(root.clone()).with_json_logs(true);
        let host = DevHost::start(&config).unwrap();
        host.serve_all();

        let button = root.join("src/Button.tsx").display().to_string();
        let preview = root.join(".storybook/preview.ts").display().to_string();
        assert!(host.graph.transform_result(&button).is_some());

        let mut invalidated = host.graph.invalidate_file(&root.join("src/api.ts"));
        invalidated.sort();
        let mut expected = vec![root.join("src/api.ts").display().to_string(), button, preview];
        expected.sort();
        assert_eq!(invalidated, expected);
    }

    #[test]
    fn test_reporting_channel_tracks_reload() {
        let channel = ReportingChannel::new(true);
        assert!(!channel.take_reload());
        channel.send(HotPayload::FullReload { path: None });
        assert!(channel.take_reload());
        assert!(!channel.take_reload());
    }
}
