//! Runtime mode object.
//!
//! The host mirrors its own mode into every bundle (`context.mode` and
//! `config.mode`). The embedded side consults its *own* process-wide mode,
//! mainly to decide whether decode diagnostics are suppressed (`test`).

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FrameContextError, Result};

static CURRENT: OnceLock<Mode> = OnceLock::new();

/// Runtime mode flags, serialized in camelCase to match the wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Mode {
    pub local_dev: bool,
    pub development: bool,
    pub esm: bool,
    pub minified: bool,
    pub lite: bool,
    /// Test mode: decode diagnostics are suppressed.
    pub test: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtv_version: Option<String>,
    /// Host flags not modelled above (e.g. `filter`), carried through as sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Mode {
    /// A mode with only the `test` flag set.
    pub fn test() -> Self {
        Self {
            test: true,
            ..Self::default()
        }
    }

    /// The process-wide mode. Falls back to the default (non-test) mode if
    /// nothing was installed.
    pub fn current() -> &'static Mode {
        CURRENT.get_or_init(Mode::default)
    }

    /// Install the process-wide mode. Only the first install wins, and it
    /// must happen before anything reads [`Mode::current`].
    pub fn install(mode: Mode) -> Result<()> {
        CURRENT
            .set(mode)
            .map_err(|_| FrameContextError::config("runtime mode already installed"))
    }
}
