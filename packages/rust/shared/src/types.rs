//! Wire types for the frame context bundle.
//!
//! A [`ContextBundle`] is the only thing that crosses the channel. Every
//! field below the four top-level sections is optional and decoded
//! leniently: a field holding the wrong JSON type reads as absent rather than
//! failing the whole bundle.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Result;
use crate::mode::Mode;

/// Experiment flag name to on/off.
pub type ExperimentToggles = BTreeMap<String, bool>;

/// Free-form attribute map carried in the `attributes` section.
pub type AttributeMap = Map<String, Value>;

// ---------------------------------------------------------------------------
// Sentinel
// ---------------------------------------------------------------------------

/// Per-embed correlation token. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sentinel(String);

impl Sentinel {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a fresh, time-sortable sentinel.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Sentinel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A layout rectangle in CSS pixels. Hosts may send a full `DOMRect`, so the
/// derived edges and origin are carried through when present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

impl LayoutRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
            ..Self::default()
        }
    }
}

/// Snapshot of the host element's intersection with the viewport. Missing
/// members default, and members not modelled here are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IntersectionRecord {
    pub time: f64,
    pub root_bounds: Option<LayoutRect>,
    pub bounding_client_rect: LayoutRect,
    pub intersection_rect: LayoutRect,
    pub intersection_ratio: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `context.location`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub href: Option<String>,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// The `context` section as it appears on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSection {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub ampcontext_filepath: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub ampcontext_version: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub canary: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub dom_fingerprint: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub initial_intersection: Option<IntersectionRecord>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub initial_layout_rect: Option<LayoutRect>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub page_view_id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub sentinel: Option<Sentinel>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub experiment_toggles: Option<ExperimentToggles>,
}

/// The `config` section: runtime configuration the embed should mirror.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub experiment_toggles: Option<ExperimentToggles>,
}

// ---------------------------------------------------------------------------
// ContextState
// ---------------------------------------------------------------------------

/// The sixteen context fields exposed to embedded code, projected verbatim
/// from the `context` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextState {
    pub ampcontext_filepath: Option<String>,
    pub ampcontext_version: Option<String>,
    pub canary: Option<bool>,
    pub canonical_url: Option<String>,
    pub client_id: Option<String>,
    pub container: Option<String>,
    pub dom_fingerprint: Option<String>,
    pub hidden: Option<bool>,
    pub initial_intersection: Option<IntersectionRecord>,
    pub initial_layout_rect: Option<LayoutRect>,
    pub page_view_id: Option<String>,
    pub referrer: Option<String>,
    pub sentinel: Option<Sentinel>,
    pub source_url: Option<String>,
    pub start_time: Option<i64>,
    pub tag_name: Option<String>,
}

impl From<&ContextSection> for ContextState {
    fn from(ctx: &ContextSection) -> Self {
        Self {
            ampcontext_filepath: ctx.ampcontext_filepath.clone(),
            ampcontext_version: ctx.ampcontext_version.clone(),
            canary: ctx.canary,
            canonical_url: ctx.canonical_url.clone(),
            client_id: ctx.client_id.clone(),
            container: ctx.container.clone(),
            dom_fingerprint: ctx.dom_fingerprint.clone(),
            hidden: ctx.hidden,
            initial_intersection: ctx.initial_intersection.clone(),
            initial_layout_rect: ctx.initial_layout_rect,
            page_view_id: ctx.page_view_id.clone(),
            referrer: ctx.referrer.clone(),
            sentinel: ctx.sentinel.clone(),
            source_url: ctx.source_url.clone(),
            start_time: ctx.start_time,
            tag_name: ctx.tag_name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// ContextBundle
// ---------------------------------------------------------------------------

/// The channel payload. The three sections are always present; a bundle
/// that failed to decode is [`ContextBundle::default`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    /// Embed kind, e.g. the ad network that produced the frame.
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub embed_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub attributes: AttributeMap,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub context: ContextSection,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub config: RuntimeConfig,
}

impl ContextBundle {
    /// The degraded bundle: all three sections present and empty.
    pub fn fallback() -> Self {
        Self::default()
    }

    /// Serialize into the channel string.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a channel string. Fails only when the payload is not JSON or
    /// is not a JSON object; individual malformed fields read as absent.
    pub fn decode(payload: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(payload)?;
        if !value.is_object() {
            return Err(crate::FrameContextError::decode(format!(
                "expected a JSON object, found {}",
                json_kind(&value)
            )));
        }
        Ok(serde_json::from_value(value)?)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Lenient field decoding
// ---------------------------------------------------------------------------

/// Decode an optional field, treating a value of the wrong shape as absent.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| T::deserialize(v).ok()))
}

/// Decode a section, treating a value of the wrong shape as an empty section.
fn lenient_or_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}
