#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod bundler;
pub mod compiler;
pub mod config;
pub mod error;
pub mod mocking;
pub mod plugins;
pub mod resolver;
pub mod version;

pub use config::{Config, MockerSettings, PreviewConfig};
pub use error::Error;
pub use mocking::{
    automock_module, extract_mock_calls, rewrite_sb_mock_import_calls, AutomockMode,
    MockDeclaration, MockRegistry, ResolvedMock,
};
pub use plugins::{
    MockLoaderPlugin, MockPreviewLoader, MockReplacementPlugin, MockTransformLoader,
};
pub use version::VERSION;
