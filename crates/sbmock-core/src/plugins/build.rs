//! Mock adapter for request-level (module replacement) hosts.
//!
//! [`MockReplacementPlugin`] resolves every module request and swaps mocked
//! ones for either the override file or a [`MockTransformLoader`] request
//! that produces the automock. The preview file itself is routed through
//! [`MockPreviewLoader`], which rewrites `sb.mock(import(...))` calls.

use crate::bundler::{
    parse_loader_request, Compilation, CompilerPlugin, HookResult, Loader, ResourceRequest,
    TransformResult,
};
use crate::mocking::{
    automock_module, rewrite_sb_mock_import_calls, AutomockMode, AutomockOptions,
    MockDeclaration, MockRegistry, ResolvedMock,
};
use crate::resolver::ModuleResolver;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, trace};

/// Plugin name reported to hosts.
pub const MOCK_REPLACEMENT_PLUGIN_NAME: &str = "sbmock:mock-replacement";

/// Loader name used in replacement requests.
pub const MOCK_TRANSFORM_LOADER: &str = "sbmock-mock-transform-loader";

/// Loader name used for the preview file request.
pub const MOCK_PREVIEW_LOADER: &str = "sbmock-preview-rewrite-loader";

/// Replacement resource for a declaration.
///
/// Overrides are used directly; automocks go through
/// `sbmock-mock-transform-loader?spy=<bool>!<absolutePath>`.
#[must_use]
pub fn replacement_resource(declaration: &MockDeclaration) -> String {
    match &declaration.redirect_path {
        Some(redirect) => redirect.display().to_string(),
        None => format!(
            "{MOCK_TRANSFORM_LOADER}?spy={}!{}",
            declaration.spy,
            declaration.absolute_path.display()
        ),
    }
}

/// Rewrites module requests that resolve to a mocked module.
pub struct MockReplacementPlugin {
    registry: Arc<MockRegistry>,
    resolver: ModuleResolver,
    mocks: RwLock<HashMap<PathBuf, ResolvedMock>>,
}

impl MockReplacementPlugin {
    #[must_use]
    pub fn new(registry: Arc<MockRegistry>) -> Self {
        let resolver = ModuleResolver::new(registry.root());
        Self {
            registry,
            resolver,
            mocks: RwLock::new(HashMap::new()),
        }
    }

    /// Active replacements, sorted by absolute path.
    #[must_use]
    pub fn resolved_mocks(&self) -> Vec<ResolvedMock> {
        let mut mocks: Vec<ResolvedMock> = self
            .mocks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        mocks.sort_by(|a, b| a.declaration.absolute_path.cmp(&b.declaration.absolute_path));
        mocks
    }

    fn update_mocks(&self) {
        let delta = self.registry.refresh();
        let mocks: HashMap<PathBuf, ResolvedMock> = self
            .registry
            .declarations()
            .into_iter()
            .map(|declaration| {
                let replacement_resource = replacement_resource(&declaration);
                (
                    declaration.absolute_path.clone(),
                    ResolvedMock {
                        declaration,
                        replacement_resource,
                    },
                )
            })
            .collect();
        debug!(
            mocks = mocks.len(),
            removed = delta.removed.len(),
            "Module replacements updated"
        );
        *self.mocks.write().unwrap_or_else(PoisonError::into_inner) = mocks;
    }
}

impl CompilerPlugin for MockReplacementPlugin {
    fn name(&self) -> &str {
        MOCK_REPLACEMENT_PLUGIN_NAME
    }

    fn before_run(&self) -> HookResult<()> {
        self.update_mocks();
        Ok(())
    }

    fn watch_run(&self, _changed: &[PathBuf]) -> HookResult<()> {
        self.update_mocks();
        Ok(())
    }

    fn normal_module_replacement(&self, request: &mut ResourceRequest) -> HookResult<()> {
        // Already routed through a loader.
        if request.request.contains('!') {
            return Ok(());
        }

        let resolved = match self.resolver.resolve(&request.request, &request.context) {
            Ok(resolved) => resolved,
            Err(e) => {
                trace!(request = %request.request, error = %e, "Request not resolvable here");
                return Ok(());
            }
        };

        if self.registry.is_preview_path(&resolved) {
            request.request = format!("{MOCK_PREVIEW_LOADER}!{}", resolved.display());
            return Ok(());
        }

        let mocks = self.mocks.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(mock) = mocks.get(&resolved) {
            debug!(
                request = %request.request,
                replacement = %mock.replacement_resource,
                "Replacing mocked module"
            );
            request.request.clone_from(&mock.replacement_resource);
        }
        Ok(())
    }

    fn after_compile(&self, compilation: &mut Compilation) -> HookResult<()> {
        compilation
            .file_dependencies
            .insert(self.registry.preview().preview_config_path.clone());
        compilation
            .context_dependencies
            .extend(self.registry.override_dirs());
        Ok(())
    }
}

/// Loader producing the automock of the requested resource.
pub struct MockTransformLoader {
    registry: Arc<MockRegistry>,
    options: AutomockOptions,
}

impl MockTransformLoader {
    #[must_use]
    pub fn new(registry: Arc<MockRegistry>) -> Self {
        let options = AutomockOptions::new(registry.settings().global_accessor.clone());
        Self { registry, options }
    }
}

/// `spy=true` anywhere in the query selects spy mode.
fn spy_from_query(query: &str) -> bool {
    query
        .split('&')
        .any(|pair| pair.split_once('=') == Some(("spy", "true")))
}

impl Loader for MockTransformLoader {
    fn name(&self) -> &str {
        MOCK_TRANSFORM_LOADER
    }

    fn run(&self, query: &str, resource: &Path, source: &str) -> HookResult<TransformResult> {
        let mode = AutomockMode::from_spy(spy_from_query(query));
        match automock_module(source, resource, mode, self.registry.parser(), &self.options) {
            Ok(output) => Ok(TransformResult::code(output.code).with_map(output.source_map)),
            Err(e) => {
                error!(
                    id = %resource.display(),
                    error = %e,
                    "Automock failed; serving original module"
                );
                Ok(TransformResult::code(source))
            }
        }
    }
}

/// Loader serving the preview file with `sb.mock(import('x'))` rewritten to
/// `sb.mock('x')`.
pub struct MockPreviewLoader {
    registry: Arc<MockRegistry>,
}

impl MockPreviewLoader {
    #[must_use]
    pub fn new(registry: Arc<MockRegistry>) -> Self {
        Self { registry }
    }
}

impl Loader for MockPreviewLoader {
    fn name(&self) -> &str {
        MOCK_PREVIEW_LOADER
    }

    fn run(&self, _query: &str, resource: &Path, source: &str) -> HookResult<TransformResult> {
        match rewrite_sb_mock_import_calls(source, resource, self.registry.parser()) {
            Ok(out) => Ok(TransformResult::code(out.code)),
            Err(e) => {
                debug!(id = %resource.display(), error = %e, "Could not rewrite preview config");
                Ok(TransformResult::code(source))
            }
        }
    }
}

/// Split a replacement request back into mode and path.
#[must_use]
pub fn parse_replacement_request(request: &str) -> Option<(AutomockMode, PathBuf)> {
    let parsed = parse_loader_request(request);
    (parsed.loader == Some(MOCK_TRANSFORM_LOADER)).then(|| {
        (
            AutomockMode::from_spy(spy_from_query(parsed.query)),
            PathBuf::from(parsed.resource),
        )
    })
}
