//! Host-side context assembly.
//!
//! [`ContextBuilder`] reads ambient state through the collaborator traits in
//! [`crate::host`] and produces the attributes (with their nested context)
//! for an embed about to be created. Every collaborator failure is absorbed
//! per field: the affected field is left absent and assembly continues.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use framecontext_shared::{
    AttributeMap, ContextBundle, ContextSection, Location, Result, RuntimeConfig,
    RuntimeSettings, Sentinel,
};

use crate::host::{HostElement, HostServices, HostWindow, SRCDOC_PLACEHOLDER};
use crate::length::length_numeral;

/// Attributes for a new embed, with the context that travels alongside them.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedAttributes {
    /// Presentation attributes (`width`, `height`, `title`, `src`, plus any
    /// pre-seeded entries).
    pub attributes: AttributeMap,
    /// The nested context section.
    pub context: ContextSection,
}

impl EmbedAttributes {
    /// Hoist into the wire bundle. `config` mirrors the context's mode and
    /// experiment toggles.
    pub fn into_bundle(self, embed_type: Option<String>) -> ContextBundle {
        let config = RuntimeConfig {
            mode: self.context.mode.clone(),
            experiment_toggles: self.context.experiment_toggles.clone(),
        };
        ContextBundle {
            embed_type,
            attributes: self.attributes,
            context: self.context,
            config,
        }
    }
}

/// Assembles embed context from the hosting window and element.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    ampcontext_version: String,
    ampcontext_filepath: String,
}

impl ContextBuilder {
    pub fn new(runtime: &RuntimeSettings) -> Self {
        Self {
            ampcontext_version: runtime.runtime_version.clone(),
            ampcontext_filepath: runtime.ampcontext_filepath(),
        }
    }

    /// Produce the attributes for an embed hosted by `element`.
    ///
    /// Reads ambient state only; calling it repeatedly with different
    /// sentinels yields independent results. `seed` is consumed, so no call
    /// can observe another call's output through it.
    #[instrument(skip_all, fields(sentinel = %sentinel, tag = %element.tag_name()))]
    pub fn build_attributes(
        &self,
        window: &dyn HostWindow,
        element: &dyn HostElement,
        services: &dyn HostServices,
        sentinel: &Sentinel,
        seed: Option<AttributeMap>,
    ) -> EmbedAttributes {
        let start_time = Utc::now().timestamp_millis();
        let mut attributes = seed.unwrap_or_default();

        // Unusable lengths leave the key out entirely.
        for dimension in ["width", "height"] {
            match length_value(element.attribute(dimension).as_deref()) {
                Some(n) => attributes.insert(dimension.into(), n),
                None => attributes.remove(dimension),
            };
        }
        if let Some(title) = non_empty(element.attribute("title")) {
            attributes.insert("title".into(), Value::String(title));
        }

        let doc_info = soft("document-info", services.document_info(element));
        let referrer = soft("referrer", services.unconfirmed_referrer_url(element)).flatten();
        let hidden = soft("visibility", services.is_visible(element)).map(|visible| !visible);
        let dom_fingerprint = soft("fingerprint", element.dom_fingerprint());
        let experiment_toggles = soft("experiment-flags", services.experiment_toggles(window));
        let canary = soft("canary-check", services.is_canary(window));
        let mode = soft("mode-config", services.mode());

        let context = ContextSection {
            ampcontext_version: Some(self.ampcontext_version.clone()),
            ampcontext_filepath: Some(self.ampcontext_filepath.clone()),
            source_url: doc_info.as_ref().map(|d| d.source_url.clone()),
            canonical_url: doc_info.as_ref().map(|d| d.canonical_url.clone()),
            page_view_id: doc_info.map(|d| d.page_view_id),
            referrer,
            location: resolve_location(window).map(|href| Location { href: Some(href) }),
            start_time: Some(start_time),
            tag_name: Some(element.tag_name()),
            mode,
            canary,
            hidden,
            initial_layout_rect: element.page_layout_box(),
            initial_intersection: element.intersection_change_entry(),
            dom_fingerprint,
            experiment_toggles,
            sentinel: Some(sentinel.clone()),
            client_id: None,
            container: None,
        };

        if let Some(src) = non_empty(element.attribute("src")) {
            attributes.insert("src".into(), Value::String(src));
        }

        debug!(attributes = attributes.len(), "embed attributes assembled");
        EmbedAttributes {
            attributes,
            context,
        }
    }

    /// Build attributes and hoist them into a complete wire bundle.
    pub fn build_bundle(
        &self,
        embed_type: Option<String>,
        window: &dyn HostWindow,
        element: &dyn HostElement,
        services: &dyn HostServices,
        sentinel: &Sentinel,
        seed: Option<AttributeMap>,
    ) -> ContextBundle {
        self.build_attributes(window, element, services, sentinel, seed)
            .into_bundle(embed_type)
    }
}

/// The host's effective address. An anonymous `srcdoc` document reports its
/// parent's address instead, since children treat the host as their origin.
fn resolve_location(window: &dyn HostWindow) -> Option<String> {
    let mut href = window.location_href()?;
    if href == SRCDOC_PLACEHOLDER {
        href = window.parent()?.location_href()?;
    }
    match Url::parse(&href) {
        Ok(_) => Some(href),
        Err(e) => {
            debug!(%href, error = %e, "host location is not a URL, leaving it absent");
            None
        }
    }
}

/// Keep a collaborator's value, or log and drop it.
fn soft<T>(collaborator: &'static str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(collaborator, error = %e, "collaborator failed, field left absent");
            None
        }
    }
}

/// A length as a JSON number. Whole values are written as integers so a
/// `"300"` attribute travels as `300`, not `300.0`.
fn length_value(raw: Option<&str>) -> Option<Value> {
    let n = length_numeral(raw)?;
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Some(Value::from(n as i64))
    } else {
        serde_json::Number::from_f64(n).map(Value::Number)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
