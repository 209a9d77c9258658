//! Mock declaration model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One `sb.mock(...)` call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockDeclaration {
    /// Specifier as written, extension-stripped for the `import(...)` form.
    pub path: String,
    /// Resolved path of the mocked module.
    pub absolute_path: PathBuf,
    /// Hand-written override, or `None` to generate an automock.
    pub redirect_path: Option<PathBuf>,
    /// Keep original behaviour while recording calls.
    pub spy: bool,
}

impl MockDeclaration {
    /// Automock mode for this declaration.
    #[must_use]
    pub fn mode(&self) -> AutomockMode {
        AutomockMode::from_spy(self.spy)
    }
}

/// Automock flavour requested from the runtime `mockObject`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutomockMode {
    /// Inert stand-ins.
    Automock,
    /// Spies wrapping the original implementation.
    Autospy,
}

impl AutomockMode {
    #[must_use]
    pub fn from_spy(spy: bool) -> Self {
        if spy {
            Self::Autospy
        } else {
            Self::Automock
        }
    }

    /// Mode string passed to `mockObject`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Automock => "automock",
            Self::Autospy => "autospy",
        }
    }

    #[must_use]
    pub fn is_spy(self) -> bool {
        matches!(self, Self::Autospy)
    }
}

impl fmt::Display for AutomockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declaration plus the resource the request-level adapter swaps in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMock {
    #[serde(flatten)]
    pub declaration: MockDeclaration,
    /// Override path, or a transform-loader request producing the automock.
    pub replacement_resource: String,
}
