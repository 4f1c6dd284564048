//! The transport channel: a write-once string slot per execution context.
//!
//! The host writes the encoded bundle before the embed runs; the embed reads
//! it after load. Each channel also owns the memoized parse of its payload,
//! so "once per execution context" means "once per channel".

use std::sync::{Arc, OnceLock};

use tracing::debug;

use framecontext_shared::{DEFAULT_CHANNEL_ENV_VAR, FrameContextError, Result};

use crate::metadata::ContextMetadata;

static PROCESS_CHANNEL: OnceLock<FrameChannel> = OnceLock::new();

/// A single handoff slot.
#[derive(Debug, Default)]
pub struct FrameChannel {
    payload: OnceLock<String>,
    pub(crate) metadata: OnceLock<Arc<ContextMetadata>>,
}

impl FrameChannel {
    /// An empty channel, waiting for the host's write.
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel the host has already written.
    pub fn with_payload(payload: impl Into<String>) -> Self {
        let channel = Self::new();
        let _ = channel.payload.set(payload.into());
        channel
    }

    /// A channel seeded from an environment variable (unset reads as empty).
    pub fn from_env(var: &str) -> Self {
        match std::env::var(var) {
            Ok(payload) => Self::with_payload(payload),
            Err(e) => {
                debug!(var, error = %e, "channel variable not readable, channel left empty");
                Self::new()
            }
        }
    }

    /// The process-wide channel, seeded from [`DEFAULT_CHANNEL_ENV_VAR`]
    /// unless [`FrameChannel::init_process`] ran first.
    pub fn process() -> &'static FrameChannel {
        PROCESS_CHANNEL.get_or_init(|| FrameChannel::from_env(DEFAULT_CHANNEL_ENV_VAR))
    }

    /// Seed the process-wide channel from `var`. Fails if the process channel
    /// was already initialized.
    pub fn init_process(var: &str) -> Result<&'static FrameChannel> {
        PROCESS_CHANNEL
            .set(FrameChannel::from_env(var))
            .map_err(|_| FrameContextError::Channel("process channel already initialized".into()))?;
        Ok(Self::process())
    }

    /// Write the payload. Only one handoff per channel is supported, and a
    /// channel that has already been read is closed.
    pub fn write(&self, payload: impl Into<String>) -> Result<()> {
        self.payload.set(payload.into()).map_err(|_| {
            if self.metadata.get().is_some() {
                FrameContextError::Channel("channel already consumed by the embed".into())
            } else {
                FrameContextError::Channel("channel already written".into())
            }
        })
    }

    /// Close the channel to writes and return its payload. An unwritten
    /// channel is sealed with the empty string.
    pub(crate) fn claim(&self) -> &str {
        self.payload.get_or_init(String::new)
    }

    /// The raw payload; an unwritten channel reads as the empty string.
    pub fn read(&self) -> &str {
        self.payload.get().map(String::as_str).unwrap_or_default()
    }
}
