//! `sbmock extract` command implementation.

use super::open_registry;
use miette::{IntoDiagnostic, Result};
use sbmock_core::plugins::replacement_resource;
use sbmock_core::{Config, MockDeclaration};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// JSON report for `sbmock extract --json`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractReport {
    preview_config_path: PathBuf,
    fingerprint: String,
    mocks: Vec<MockEntry>,
    /// Every file found in the directories watched for overrides.
    override_files: BTreeSet<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MockEntry {
    #[serde(flatten)]
    declaration: MockDeclaration,
    mode: &'static str,
    replacement_resource: String,
}

pub fn run(config: &Config) -> Result<()> {
    let registry = open_registry(config)?;

    let mocks: Vec<MockEntry> = registry
        .declarations()
        .into_iter()
        .map(|declaration| MockEntry {
            mode: if declaration.redirect_path.is_some() {
                "override"
            } else {
                declaration.mode().as_str()
            },
            replacement_resource: replacement_resource(&declaration),
            declaration,
        })
        .collect();

    // Nested override dirs may overlap.
    let override_files: BTreeSet<PathBuf> = registry
        .override_dirs()
        .iter()
        .flat_map(|dir| sbmock_util::fs::list_files(dir))
        .collect();

    let report = ExtractReport {
        preview_config_path: registry.preview().preview_config_path.clone(),
        fingerprint: registry.fingerprint(),
        mocks,
        override_files,
    };

    if config.json_logs {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).into_diagnostic()?
        );
        return Ok(());
    }

    println!("Preview: {}", report.preview_config_path.display());
    if report.mocks.is_empty() {
        println!("No mocks declared");
        return Ok(());
    }
    for entry in &report.mocks {
        println!(
            "  {:<9} {} -> {}",
            entry.mode,
            entry.declaration.path,
            entry.declaration.absolute_path.display()
        );
        if let Some(redirect) = &entry.declaration.redirect_path {
            println!("            served from {}", redirect.display());
        }
    }
    Ok(())
}
