//! Application configuration for FrameContext.
//!
//! User config lives at `~/.framecontext/framecontext.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FrameContextError, Result};
use crate::mode::Mode;
use crate::types::ExperimentToggles;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "framecontext.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".framecontext";

/// Environment variable used as the process-level channel by default.
pub const DEFAULT_CHANNEL_ENV_VAR: &str = "FRAMECONTEXT_NAME";

/// Script name of the embedded-side runtime, appended to the versioned base.
const AMPCONTEXT_SCRIPT: &str = "ampcontext-v0.js";

// ---------------------------------------------------------------------------
// Config structs (matching framecontext.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Runtime identity mirrored into every bundle.
    #[serde(default)]
    pub runtime: RuntimeSettings,

    /// Mode flags mirrored into every bundle.
    #[serde(default)]
    pub mode: Mode,

    /// Experiment toggles resolved for the host window.
    #[serde(default)]
    pub experiments: ExperimentToggles,

    /// Channel settings.
    #[serde(default)]
    pub channel: ChannelSettings,
}

/// `[runtime]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Base URL serving third-party frame scripts.
    #[serde(default = "default_third_party_url")]
    pub third_party_url: String,

    /// Runtime version string embedded in bundles.
    #[serde(default = "default_runtime_version")]
    pub runtime_version: String,

    /// Whether the host opted into the canary channel.
    #[serde(default)]
    pub canary: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            third_party_url: default_third_party_url(),
            runtime_version: default_runtime_version(),
            canary: false,
        }
    }
}

impl RuntimeSettings {
    /// Location of the embedded runtime script for this version.
    pub fn ampcontext_filepath(&self) -> String {
        format!(
            "{}/{}/{AMPCONTEXT_SCRIPT}",
            self.third_party_url.trim_end_matches('/'),
            self.runtime_version
        )
    }
}

fn default_third_party_url() -> String {
    "https://3p.ampproject.net".into()
}
fn default_runtime_version() -> String {
    env!("CARGO_PKG_VERSION").into()
}

/// `[channel]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Environment variable carrying the payload into a child process.
    #[serde(default = "default_env_var")]
    pub env_var: String,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            env_var: default_env_var(),
        }
    }
}

fn default_env_var() -> String {
    DEFAULT_CHANNEL_ENV_VAR.into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.framecontext/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| FrameContextError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.framecontext/framecontext.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FrameContextError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        FrameContextError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| FrameContextError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| FrameContextError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| FrameContextError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject settings that would produce malformed bundles.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    url::Url::parse(&config.runtime.third_party_url).map_err(|e| {
        FrameContextError::config(format!(
            "runtime.third_party_url '{}' is not a URL: {e}",
            config.runtime.third_party_url
        ))
    })?;
    if config.runtime.runtime_version.trim().is_empty() {
        return Err(FrameContextError::config("runtime.runtime_version is empty"));
    }
    if config.channel.env_var.is_empty() || config.channel.env_var.contains('=') {
        return Err(FrameContextError::config(format!(
            "channel.env_var '{}' is not a valid environment variable name",
            config.channel.env_var
        )));
    }
    Ok(())
}
