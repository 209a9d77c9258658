//! `sbmock automock` command implementation.

use miette::{IntoDiagnostic, Result};
use sbmock_core::compiler::SwcParser;
use sbmock_core::mocking::AutomockOptions;
use sbmock_core::{automock_module, AutomockMode, Config, MockerSettings};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Arguments of `sbmock automock`.
#[derive(Debug, Clone)]
pub struct AutomockAction {
    /// Module to transform, relative to cwd.
    pub file: PathBuf,
    /// Spy instead of stub.
    pub spy: bool,
    /// Overrides the configured global accessor.
    pub accessor: Option<String>,
    /// Output file; stdout when `None`.
    pub out: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AutomockReport<'a> {
    file: &'a PathBuf,
    mode: AutomockMode,
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_map: Option<&'a str>,
}

pub fn run(config: &Config, action: AutomockAction) -> Result<()> {
    let settings = MockerSettings::load(&config.resolved_config_dir()).into_diagnostic()?;
    let accessor = action.accessor.unwrap_or(settings.global_accessor);

    let file = config.cwd.join(&action.file);
    let source = sbmock_util::fs::read_to_string_lossy(&file).into_diagnostic()?;
    let mode = AutomockMode::from_spy(action.spy);

    let output = automock_module(
        &source,
        &file,
        mode,
        &SwcParser::new(),
        &AutomockOptions::new(accessor),
    )
    .into_diagnostic()?;

    if let Some(out) = action.out {
        let out = config.cwd.join(out);
        sbmock_util::fs::atomic_write(&out, output.code.as_bytes()).into_diagnostic()?;
        if let Some(map) = &output.source_map {
            let mut map_path = out.clone().into_os_string();
            map_path.push(".map");
            sbmock_util::fs::atomic_write(&PathBuf::from(map_path), map.as_bytes())
                .into_diagnostic()?;
        }
        info!(file = %file.display(), out = %out.display(), %mode, "Wrote automock");
        return Ok(());
    }

    if config.json_logs {
        let report = AutomockReport {
            file: &file,
            mode,
            code: &output.code,
            source_map: output.source_map.as_deref(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).into_diagnostic()?
        );
    } else {
        print!("{}", output.code);
    }
    Ok(())
}
