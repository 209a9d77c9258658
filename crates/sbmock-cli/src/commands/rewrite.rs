//! `sbmock rewrite` command implementation.

use miette::{IntoDiagnostic, Result};
use sbmock_core::compiler::SwcParser;
use sbmock_core::{rewrite_sb_mock_import_calls, Config, Error, PreviewConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct RewriteReport<'a> {
    file: &'a Path,
    changed: bool,
    code: &'a str,
}

pub fn run(config: &Config, file: Option<&Path>) -> Result<()> {
    let file: PathBuf = match file {
        Some(file) => config.cwd.join(file),
        None => {
            let config_dir = config.resolved_config_dir();
            PreviewConfig::discover(&config_dir)
                .ok_or(Error::PreviewNotFound { config_dir })
                .into_diagnostic()?
                .preview_config_path
        }
    };

    let code = sbmock_util::fs::read_to_string_lossy(&file).into_diagnostic()?;
    let output = rewrite_sb_mock_import_calls(&code, &file, &SwcParser::new()).into_diagnostic()?;

    if config.json_logs {
        let report = RewriteReport {
            file: &file,
            changed: output.changed,
            code: &output.code,
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
