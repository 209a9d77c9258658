//! Both adapters driven over the same project must serve the same modules.

use sbmock_core::bundler::{
    Command, Compiler, DevConfig, DevModuleGraph, HotChannel, HotPayload, PluginContainer,
    ResourceRequest, ServerContext, WatchEventKind,
};
use sbmock_core::{
    MockLoaderPlugin, MockPreviewLoader, MockRegistry, MockReplacementPlugin, MockTransformLoader,
    MockerSettings, PreviewConfig,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
struct Reloads(Mutex<Vec<HotPayload>>);

impl HotChannel for Reloads {
    fn send(&self, payload: HotPayload) {
        self.0.lock().unwrap().push(payload);
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn project(preview: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap();
    write(
        &root,
        "src/api.ts",
        "export async function fetchUser(id: string) { return { id }; }\nexport const BASE = '/api';\n",
    );
    write(&root, "src/format.ts", "export default (s: string) => s.trim();\n");
    write(
        &root,
        "node_modules/lodash-es/package.json",
        r#"{ "name": "lodash-es", "module": "lodash.js" }"#,
    );
    write(&root, "node_modules/lodash-es/lodash.js", "export const chunk = () => [];\n");
    write(&root, "__mocks__/lodash-es.js", "export const chunk = () => ['mocked'];\n");
    write(&root, ".storybook/preview.ts", preview);
    (dir, root)
}

fn registry(root: &Path) -> Arc<MockRegistry> {
    Arc::new(MockRegistry::with_defaults(
        PreviewConfig::discover(&root.join(".storybook")).unwrap(),
        root,
        MockerSettings::default(),
    ))
}

struct DevHost {
    container: PluginContainer,
    graph: Arc<DevModuleGraph>,
    reloads: Arc<Reloads>,
}

impl DevHost {
    fn new(root: &Path) -> Self {
        let graph = Arc::new(DevModuleGraph::new());
        let reloads = Arc::new(Reloads::default());
        let mut container = PluginContainer::new(root.to_path_buf());
        container.add(Arc::new(MockLoaderPlugin::new(registry(root))));
        container
            .call_config_resolved(&DevConfig::new(root, Command::Serve))
            .unwrap();
        container
            .call_configure_server(&ServerContext::new(
                root.to_path_buf(),
                graph.clone(),
                reloads.clone(),
            ))
            .unwrap();
        container.build_start().unwrap();
        Self {
            container,
            graph,
            reloads,
        }
    }

    fn serve(&self, path: &Path) -> String {
        let id = path.display().to_string();
        let code = match self.container.load(&id).unwrap() {
            Some(loaded) => loaded.code,
            None => std::fs::read_to_string(path).unwrap(),
        };
        let out = self.container.transform(&code, &id).unwrap().code;
        self.graph.ensure_module(&id, &id);
        self.graph.set_transform_result(&id, out.clone());
        out
    }
}

struct BuildHost {
    compiler: Compiler,
    root: PathBuf,
}

impl BuildHost {
    fn new(root: &Path) -> Self {
        let registry = registry(root);
        let mut compiler = Compiler::new();
        compiler.add_plugin(Arc::new(MockReplacementPlugin::new(registry.clone())));
        compiler.add_loader(Arc::new(MockTransformLoader::new(registry.clone())));
        compiler.add_loader(Arc::new(MockPreviewLoader::new(registry)));
        Self {
            compiler,
            root: root.to_path_buf(),
        }
    }

    fn serve(&self, request: &str) -> String {
        self.serve_from(request, &self.root.join("src"))
    }

    fn serve_from(&self, request: &str, context: &Path) -> String {
        let output = self
            .compiler
            .run(vec![ResourceRequest::new(request, context)])
            .unwrap();
        self.compiler
            .load_module(&output.requests[0].request)
            .unwrap()
            .code
    }
}

#[test]
fn test_adapters_serve_identical_mocks() {
    let (_dir, root) = project(
        "import { sb } from 'storybook/test';\n\
         sb.mock(import('../src/api.ts'), { spy: true });\n\
         sb.mock('../src/format');\n\
         sb.mock('lodash-es');\n",
    );
    let dev = DevHost::new(&root);
    let build = BuildHost::new(&root);

    let dev_api = dev.serve(&root.join("src/api.ts"));
    assert!(dev_api.contains("\"autospy\""));
    assert_eq!(dev_api, build.serve("./api"));

    let dev_format = dev.serve(&root.join("src/format.ts"));
    assert!(dev_format.contains("\"automock\""));
    assert!(dev_format.contains("as default"));
    assert_eq!(dev_format, build.serve("./format.ts"));

    let dev_lodash = dev.serve(&root.join("node_modules/lodash-es/lodash.js"));
    assert_eq!(dev_lodash, "export const chunk = () => ['mocked'];\n");
    assert_eq!(dev_lodash, build.serve("lodash-es"));

    let dev_preview = dev.serve(&root.join(".storybook/preview.ts"));
    assert!(dev_preview.contains("sb.mock('../src/api.ts', { spy: true });"));
    assert!(!dev_preview.contains("import('"));
    assert_eq!(dev_preview, build.serve_from("./preview", &root.join(".storybook")));
}

#[test]
fn test_preview_edit_reaches_both_adapters() {
    let (_dir, root) = project("sb.mock('../src/api');\n");
    let dev = DevHost::new(&root);
    let build = BuildHost::new(&root);
    let api = root.join("src/api.ts");

    assert!(dev.serve(&api).contains("mockObject"));
    assert!(build.serve("./api").contains("mockObject"));

    let preview = root.join(".storybook/preview.ts");
    std::fs::write(&preview, "sb.mock('../src/format');\n").unwrap();

    dev.container
        .call_watch_change(&preview, WatchEventKind::Update)
        .unwrap();
    assert_eq!(dev.graph.transform_result(&api.display().to_string()), None);
    assert_eq!(dev.reloads.0.lock().unwrap().len(), 1);
    assert!(!dev.serve(&api).contains("mockObject"));

    let output = build
        .compiler
        .watch_run(
            &[preview],
            vec![ResourceRequest::new("./api", root.join("src"))],
        )
        .unwrap();
    assert_eq!(output.requests[0].request, "./api");
}

#[test]
fn test_build_mode_plugin_host_uses_path_identity() {
    let (_dir, root) = project("sb.mock('../src/api');\n");
    let mut container = PluginContainer::new(root.clone());
    container.add(Arc::new(MockLoaderPlugin::new(registry(&root))));
    container
        .call_config_resolved(&DevConfig::new(&root, Command::Build))
        .unwrap();
    container.build_start().unwrap();

    let id = root.join("src/api.ts").display().to_string();
    let code = std::fs::read_to_string(root.join("src/api.ts")).unwrap();
    assert!(container
        .transform(&code, &id)
        .unwrap()
        .code
        .contains("mockObject"));
}
