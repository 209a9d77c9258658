//! `sbmock resolve` command implementation.

use miette::{IntoDiagnostic, Result};
use sbmock_core::resolver::{resolve_mock_target, MocksDirFinder};
use sbmock_core::{Config, Error, MockerSettings, PreviewConfig};
use std::path::Path;

pub fn run(config: &Config, specifier: &str, from: Option<&Path>) -> Result<()> {
    let config_dir = config.resolved_config_dir();
    let settings = MockerSettings::load(&config_dir).into_diagnostic()?;

    let importer = match from {
        Some(file) => config.cwd.join(file),
        None => {
            PreviewConfig::discover(&config_dir)
                .ok_or(Error::PreviewNotFound { config_dir })
                .into_diagnostic()?
                .preview_config_path
        }
    };

    let finder = MocksDirFinder::new(settings.override_dir_name);
    let resolved =
        resolve_mock_target(specifier, &config.cwd, &importer, &finder).into_diagnostic()?;

    if config.json_logs {
        println!(
            "{}",
            serde_json::to_string_pretty(&resolved).into_diagnostic()?
        );
        return Ok(());
    }

    println!("{}", resolved.absolute_path.display());
    if let Some(redirect) = &resolved.redirect_path {
        println!("  override: {}", redirect.display());
    }
    if resolved.external {
        println!("  external: yes");
    }
    Ok(())
}
