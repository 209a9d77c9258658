//! Module mocking pipeline.
//!
//! - [`extract_mock_calls`]: read `sb.mock(...)` declarations from the
//!   preview file and resolve them.
//! - [`rewrite_sb_mock_import_calls`]: turn `sb.mock(import('x'))` into
//!   `sb.mock('x')` for the runtime.
//! - [`automock_module`]: rewrite a module so its exports come from the
//!   runtime `mockObject`.
//! - [`MockRegistry`]: current declarations and the per-id decision shared
//!   by the bundler adapters.

pub mod automock;
mod declaration;
mod extract;
mod registry;
mod rewrite;

pub use automock::{
    automock_module, collect_exports, AutomockError, AutomockOptions, ExportedBinding,
};
pub use declaration::{AutomockMode, MockDeclaration, ResolvedMock};
pub use extract::{extract_mock_calls, find_mock_calls, strip_source_extension, MockCall};
pub use registry::{clean_id, MockDecision, MockDelta, MockRegistry};
pub use rewrite::{rewrite_sb_mock_import_calls, RewriteOutput};
