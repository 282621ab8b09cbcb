//! Configuration for the renderer.
//!
//! `RenderConfig` (top-level settings with one section per subsystem),
//! `RenderPaths` for the platform config directory, and TOML persistence via
//! `RenderConfig::load` / `RenderConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::RenderPaths;
pub use settings::{AudioConfig, RenderConfig, StreamConfig};
