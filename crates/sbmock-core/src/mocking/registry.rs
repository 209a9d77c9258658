//! Bundler-agnostic mock state shared by both adapters.
//!
//! The registry owns the current declaration list for one plugin instance.
//! Adapters ask it two questions: what to do with a module id
//! ([`MockRegistry::decide`]) and what changed after a re-extraction
//! ([`MockRegistry::refresh`]).

use super::{extract_mock_calls, AutomockMode, MockDeclaration};
use crate::compiler::{ParserBackend, SwcParser};
use crate::config::{MockerSettings, PreviewConfig};
use crate::resolver::{MocksDirFinder, OverrideFinder};
use std::collections::{BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// What to serve for a module id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockDecision {
    /// Not mocked.
    PassThrough,
    /// Serve the override file.
    Redirect(PathBuf),
    /// Serve the automocked rewrite of the module itself.
    Automock(AutomockMode),
}

/// Difference between two extraction generations, keyed by absolute path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockDelta {
    /// Mocked before, no longer declared.
    pub removed: Vec<PathBuf>,
    /// Newly declared.
    pub added: Vec<PathBuf>,
    /// Every path mocked after the refresh.
    pub current: Vec<PathBuf>,
    /// Whether the fingerprint changed.
    pub changed: bool,
}

impl MockDelta {
    /// Paths whose module-graph entries must be invalidated: the current set
    /// plus everything removed.
    #[must_use]
    pub fn affected(&self) -> Vec<PathBuf> {
        let set: BTreeSet<&PathBuf> = self.current.iter().chain(&self.removed).collect();
        set.into_iter().cloned().collect()
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    declarations: Vec<MockDeclaration>,
    by_path: HashMap<PathBuf, usize>,
    fingerprint: String,
    generation: u64,
}

/// Current mock declarations plus the collaborators needed to refresh them.
pub struct MockRegistry {
    preview: PreviewConfig,
    root: PathBuf,
    settings: MockerSettings,
    parser: Arc<dyn ParserBackend>,
    finder: Arc<dyn OverrideFinder>,
    state: RwLock<RegistryState>,
}

impl MockRegistry {
    /// Create an empty registry. Call [`refresh`](Self::refresh) to populate it.
    pub fn new(
        preview: PreviewConfig,
        root: impl Into<PathBuf>,
        settings: MockerSettings,
        parser: Arc<dyn ParserBackend>,
        finder: Arc<dyn OverrideFinder>,
    ) -> Self {
        let preview = if settings.warn_unresolved && !preview.warn_unresolved() {
            preview.with_core_options(settings.core_options())
        } else {
            preview
        };
        Self {
            preview,
            root: root.into(),
            settings,
            parser,
            finder,
            state: RwLock::new(RegistryState {
                fingerprint: fingerprint_of(&[]),
                ..RegistryState::default()
            }),
        }
    }

    /// Registry using the SWC parser and a `__mocks__` finder named per
    /// `settings`.
    pub fn with_defaults(
        preview: PreviewConfig,
        root: impl Into<PathBuf>,
        settings: MockerSettings,
    ) -> Self {
        let finder = MocksDirFinder::new(settings.override_dir_name.clone());
        Self::new(
            preview,
            root,
            settings,
            Arc::new(SwcParser::new()),
            Arc::new(finder),
        )
    }

    #[must_use]
    pub fn preview(&self) -> &PreviewConfig {
        &self.preview
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn settings(&self) -> &MockerSettings {
        &self.settings
    }

    #[must_use]
    pub fn parser(&self) -> &dyn ParserBackend {
        self.parser.as_ref()
    }

    /// Re-extract declarations and replace the current list wholesale.
    ///
    /// Returns once the new list is visible to [`decide`](Self::decide).
    pub fn refresh(&self) -> MockDelta {
        let extracted = extract_mock_calls(
            &self.preview,
            self.parser.as_ref(),
            &self.root,
            self.finder.as_ref(),
        );
        let (declarations, by_path) = dedupe(extracted);
        let fingerprint = fingerprint_of(&declarations);

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let removed: Vec<PathBuf> = state
            .declarations
            .iter()
            .filter(|d| !by_path.contains_key(&d.absolute_path))
            .map(|d| d.absolute_path.clone())
            .collect();
        let added: Vec<PathBuf> = declarations
            .iter()
            .filter(|d| !state.by_path.contains_key(&d.absolute_path))
            .map(|d| d.absolute_path.clone())
            .collect();
        let current: Vec<PathBuf> = declarations
            .iter()
            .map(|d| d.absolute_path.clone())
            .collect();
        let changed = fingerprint != state.fingerprint;

        state.generation += 1;
        state.declarations = declarations;
        state.by_path = by_path;
        state.fingerprint = fingerprint;

        if changed {
            info!(
                generation = state.generation,
                mocks = current.len(),
                added = added.len(),
                removed = removed.len(),
                "Mock declarations updated"
            );
        } else {
            debug!(generation = state.generation, "Mock declarations unchanged");
        }

        MockDelta {
            removed,
            added,
            current,
            changed,
        }
    }

    /// Snapshot of the current declarations.
    #[must_use]
    pub fn declarations(&self) -> Vec<MockDeclaration> {
        self.read().declarations.clone()
    }

    /// Number of completed refreshes.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// BLAKE3 fingerprint of the current declarations.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        self.read().fingerprint.clone()
    }

    /// Declaration matching a bundler module id.
    ///
    /// `match_specifier` also accepts ids equal to the declared specifier
    /// (pre-bundled dependency ids in serve mode).
    #[must_use]
    pub fn lookup(&self, id: &str, match_specifier: bool) -> Option<MockDeclaration> {
        let clean = clean_id(id);
        if clean.is_empty() {
            return None;
        }
        let path = self.normalize(Path::new(clean));

        let state = self.read();
        if let Some(&index) = state.by_path.get(&path) {
            return state.declarations.get(index).cloned();
        }
        if match_specifier {
            return state.declarations.iter().find(|d| d.path == clean).cloned();
        }
        None
    }

    /// Decide what to serve for a module id.
    #[must_use]
    pub fn decide(&self, id: &str, match_specifier: bool) -> MockDecision {
        match self.lookup(id, match_specifier) {
            None => MockDecision::PassThrough,
            Some(MockDeclaration {
                redirect_path: Some(redirect),
                ..
            }) => MockDecision::Redirect(redirect),
            Some(decl) => MockDecision::Automock(decl.mode()),
        }
    }

    /// Whether a changed file requires re-extraction: the preview file itself
    /// or anything inside an override directory.
    #[must_use]
    pub fn is_trigger(&self, path: &Path) -> bool {
        if self.is_preview_path(path) {
            return true;
        }
        path.components().any(
            |c| matches!(c, Component::Normal(name) if name == self.settings.override_dir_name.as_str()),
        )
    }

    /// Whether `id` names the preview configuration file.
    #[must_use]
    pub fn is_preview(&self, id: &str) -> bool {
        self.is_preview_path(Path::new(clean_id(id)))
    }

    /// Whether `path` is the preview file.
    #[must_use]
    pub fn is_preview_path(&self, path: &Path) -> bool {
        let preview = self.preview.preview_config_path.as_path();
        path == preview || self.normalize(path) == self.normalize(preview)
    }

    /// Override directories the current declarations depend on.
    ///
    /// Covers the project-level directory, every directory holding an
    /// override in use, and the sibling override directory of each mocked
    /// module, so a newly added override is noticed too.
    #[must_use]
    pub fn override_dirs(&self) -> Vec<PathBuf> {
        let dir_name = &self.settings.override_dir_name;
        let mut dirs = BTreeSet::new();
        dirs.insert(self.root.join(dir_name));

        for decl in &self.read().declarations {
            if let Some(parent) = decl.redirect_path.as_deref().and_then(Path::parent) {
                dirs.insert(parent.to_path_buf());
            }
            if let Some(parent) = decl.absolute_path.parent() {
                dirs.insert(parent.join(dir_name));
            }
        }
        dirs.into_iter().collect()
    }

    fn normalize(&self, path: &Path) -> PathBuf {
        if self.settings.preserve_symlinks {
            return path.to_path_buf();
        }
        dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRegistry")
            .field("preview", &self.preview.preview_config_path)
            .field("root", &self.root)
            .field("parser", &self.parser.name())
            .finish_non_exhaustive()
    }
}

/// Strip the virtual-module prefix and any query or hash suffix.
#[must_use]
pub fn clean_id(id: &str) -> &str {
    let id = id.strip_prefix('\0').unwrap_or(id);
    let end = id.find(|c| c == '?' || c == '#').unwrap_or(id.len());
    &id[..end]
}

/// Keep one declaration per absolute path; the last one wins but keeps the
/// position of the first.
fn dedupe(extracted: Vec<MockDeclaration>) -> (Vec<MockDeclaration>, HashMap<PathBuf, usize>) {
    let mut declarations: Vec<MockDeclaration> = Vec::with_capacity(extracted.len());
    let mut by_path = HashMap::new();
    for decl in extracted {
        if let Some(&index) = by_path.get(&decl.absolute_path) {
            declarations[index] = decl;
        } else {
            by_path.insert(decl.absolute_path.clone(), declarations.len());
            declarations.push(decl);
        }
    }
    (declarations, by_path)
}

fn fingerprint_of(declarations: &[MockDeclaration]) -> String {
    let parts: Vec<String> = declarations
        .iter()
        .map(|d| {
            format!(
                "{}|{}|{}",
                d.absolute_path.display(),
                d.redirect_path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                d.spy
            )
        })
        .collect();
    sbmock_util::hash::blake3_parts(parts.iter().map(String::as_str))
}
