pub mod automock;
pub mod extract;
pub mod resolve;
pub mod rewrite;
pub mod version;
pub mod watch;

use miette::{IntoDiagnostic, Result};
use sbmock_core::{Config, Error, MockRegistry, MockerSettings, PreviewConfig};
use std::sync::Arc;

/// Load settings, find the preview file and build a populated registry.
pub(crate) fn open_registry(config: &Config) -> Result<Arc<MockRegistry>> {
    let config_dir = config.resolved_config_dir();
    let settings = MockerSettings::load(&config_dir).into_diagnostic()?;
    let preview = PreviewConfig::discover(&config_dir)
        .ok_or(Error::PreviewNotFound { config_dir })
        .into_diagnostic()?;

    let registry = Arc::new(MockRegistry::with_defaults(
        preview,
        &config.cwd,
        settings,
    ));
    registry.refresh();
    Ok(registry)
}
