//! Configuration for sbmock.
//!
//! Three layers:
//! - [`Config`]: CLI runtime options (cwd, verbosity, JSON output).
//! - [`PreviewConfig`]: where the preview configuration file lives.
//! - [`MockerSettings`]: mocking knobs, optionally read from
//!   `<configDir>/sbmock.json`.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global property the generated automock code reads the mocker runtime from.
pub const DEFAULT_GLOBAL_ACCESSOR: &str = "__STORYBOOK_MODULE_MOCKER__";

/// Directory name holding hand-written override modules.
pub const DEFAULT_OVERRIDE_DIR: &str = "__mocks__";

/// Settings file looked up inside the config directory.
pub const SETTINGS_FILE: &str = "sbmock.json";

/// Config directory used when none is given.
pub const DEFAULT_CONFIG_DIR: &str = ".storybook";

/// Preview file extensions in probe order.
const PREVIEW_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// Runtime configuration for the sbmock CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,

    /// Storybook config directory, relative to `cwd` unless absolute.
    pub config_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Set the Storybook config directory.
    #[must_use]
    pub fn with_config_dir(mut self, config_dir: impl Into<PathBuf>) -> Self {
        self.config_dir = config_dir.into();
        self
    }

    /// The config directory joined onto `cwd`.
    #[must_use]
    pub fn resolved_config_dir(&self) -> PathBuf {
        self.cwd.join(&self.config_dir)
    }
}

/// Options forwarded from the host's core configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreOptions {
    /// Log declarations that fail to resolve at WARN instead of DEBUG.
    #[serde(default)]
    pub warn_unresolved: bool,
}

/// Location of the preview configuration file that holds `sb.mock` calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewConfig {
    /// Path of the preview file (e.g. `.storybook/preview.ts`).
    pub preview_config_path: PathBuf,
    /// Directory the preview file lives in.
    pub config_dir: PathBuf,
    /// Host core options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_options: Option<CoreOptions>,
}

impl PreviewConfig {
    /// Build a preview config from an explicit preview file path.
    #[must_use]
    pub fn new(preview_config_path: impl Into<PathBuf>) -> Self {
        let preview_config_path = preview_config_path.into();
        let config_dir = preview_config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            preview_config_path,
            config_dir,
            core_options: None,
        }
    }

    /// Discover the preview file in `config_dir`.
    ///
    /// Returns `None` when there is no preview file; mocking is then disabled.
    #[must_use]
    pub fn discover(config_dir: &Path) -> Option<Self> {
        find_preview_config(config_dir).map(|path| Self {
            preview_config_path: path,
            config_dir: config_dir.to_path_buf(),
            core_options: None,
        })
    }

    /// Attach core options.
    #[must_use]
    pub fn with_core_options(mut self, core_options: CoreOptions) -> Self {
        self.core_options = Some(core_options);
        self
    }

    /// Whether unresolved declarations should be surfaced as warnings.
    #[must_use]
    pub fn warn_unresolved(&self) -> bool {
        self.core_options.is_some_and(|o| o.warn_unresolved)
    }
}

/// Find `preview.<ext>` in the config directory.
#[must_use]
pub fn find_preview_config(config_dir: &Path) -> Option<PathBuf> {
    PREVIEW_EXTENSIONS
        .iter()
        .map(|ext| config_dir.join(format!("preview.{ext}")))
        .find(|path| path.is_file())
}

/// Mocking settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MockerSettings {
    /// Global property exposing `mockObject(shape, mode)` at runtime.
    pub global_accessor: String,
    /// Name of the override directory (`__mocks__`).
    pub override_dir_name: String,
    /// Compare module ids without resolving symlinks.
    pub preserve_symlinks: bool,
    /// Surface unresolvable declarations as warnings.
    pub warn_unresolved: bool,
}

impl Default for MockerSettings {
    fn default() -> Self {
        Self {
            global_accessor: DEFAULT_GLOBAL_ACCESSOR.to_string(),
            override_dir_name: DEFAULT_OVERRIDE_DIR.to_string(),
            preserve_symlinks: false,
            warn_unresolved: false,
        }
    }
}

impl MockerSettings {
    /// Load settings from `<config_dir>/sbmock.json`.
    ///
    /// A missing file yields the defaults.
    pub fn load(config_dir: &Path) -> Result<Self, Error> {
        let path = config_dir.join(SETTINGS_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(Error::ConfigRead { path, source }),
        };
        serde_json::from_str(&content).map_err(|source| Error::ConfigParse { path, source })
    }

    /// Core options derived from these settings.
    #[must_use]
    pub fn core_options(&self) -> CoreOptions {
        CoreOptions {
            warn_unresolved: self.warn_unresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_dir_relative_to_cwd() {
        let config = Config::new(PathBuf::from("/project"));
        assert_eq!(config.resolved_config_dir(), PathBuf::from("/project/.storybook"));

        let config = config.with_config_dir("/elsewhere/sb");
        assert_eq!(config.resolved_config_dir(), PathBuf::from("/elsewhere/sb"));
    }

    #[test]
    fn test_find_preview_config_prefers_ts() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("preview.js"), "").unwrap();
        std::fs::write(dir.path().join("preview.ts"), "").unwrap();

        let found = find_preview_config(dir.path()).unwrap();
        assert!(found.ends_with("preview.ts"));
    }

    #[test]
    fn test_discover_missing_preview() {
        let dir = tempdir().unwrap();
        assert!(PreviewConfig::discover(dir.path()).is_none());
    }

    #[test]
    fn test_preview_config_new_sets_config_dir() {
        let preview = PreviewConfig::new("/project/.storybook/preview.tsx");
        assert_eq!(preview.config_dir, PathBuf::from("/project/.storybook"));
        assert!(!preview.warn_unresolved());

        let preview = preview.with_core_options(CoreOptions {
            warn_unresolved: true,
        });
        assert!(preview.warn_unresolved());
    }

    #[test]
    fn test_settings_default_when_missing() {
        let dir = tempdir().unwrap();
        let settings = MockerSettings::load(dir.path()).unwrap();
        assert_eq!(settings, MockerSettings::default());
        assert_eq!(settings.global_accessor, DEFAULT_GLOBAL_ACCESSOR);
    }

    #[test]
    fn test_settings_partial_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{ "globalAccessor": "__MY_MOCKER__", "warnUnresolved": true }"#,
        )
        .unwrap();

        let settings = MockerSettings::load(dir.path()).unwrap();
        assert_eq!(settings.global_accessor, "__MY_MOCKER__");
        assert_eq!(settings.override_dir_name, DEFAULT_OVERRIDE_DIR);
        assert!(settings.core_options().warn_unresolved);
    }

    #[test]
    fn test_settings_malformed_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{ nope").unwrap();

        let err = MockerSettings::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }
}
