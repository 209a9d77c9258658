//! Bundler adapters for the mocking pipeline.
//!
//! Both adapters are thin: every decision comes from a shared
//! [`MockRegistry`](crate::mocking::MockRegistry).

mod build;
mod dev_server;

pub use build::{
    parse_replacement_request, replacement_resource, MockPreviewLoader, MockReplacementPlugin,
    MockTransformLoader, MOCK_PREVIEW_LOADER, MOCK_REPLACEMENT_PLUGIN_NAME, MOCK_TRANSFORM_LOADER,
};
pub use dev_server::{MockLoaderPlugin, MOCK_LOADER_PLUGIN_NAME};
