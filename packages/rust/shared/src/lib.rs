//! Shared types, error model, and configuration for FrameContext.
//!
//! This crate is the foundation depended on by all other FrameContext crates.
//! It provides:
//! - [`FrameContextError`], the unified error type
//! - Wire types ([`ContextBundle`], [`ContextSection`], [`ContextState`], [`Sentinel`])
//! - The runtime [`Mode`] object
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod mode;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ChannelSettings, DEFAULT_CHANNEL_ENV_VAR, RuntimeSettings, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_config,
};
pub use error::{FrameContextError, Result};
pub use mode::Mode;
pub use types::{
    AttributeMap, ContextBundle, ContextSection, ContextState, ExperimentToggles,
    IntersectionRecord, LayoutRect, Location, RuntimeConfig, Sentinel,
};
