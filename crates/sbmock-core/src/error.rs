use std::path::PathBuf;
use thiserror::Error;

/// Core error type for sbmock operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read settings at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No preview config found in {config_dir}")]
    PreviewNotFound { config_dir: PathBuf },

    #[error(transparent)]
    Compiler(#[from] crate::compiler::CompilerError),

    #[error(transparent)]
    Automock(#[from] crate::mocking::AutomockError),
}
