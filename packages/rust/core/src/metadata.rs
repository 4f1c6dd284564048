//! Embedded-side view of the context bundle.
//!
//! [`ContextMetadata`] decodes the channel payload once and serves typed,
//! section-complete projections of it. Decode failure never propagates: the
//! reader logs one diagnostic (unless the process runs in test mode) and
//! continues with [`ContextBundle::fallback`].

use std::sync::Arc;

use tracing::{info, instrument};
use url::Url;

use framecontext_shared::{
    AttributeMap, ContextBundle, ContextState, Mode, RuntimeConfig, Sentinel,
};

use crate::channel::FrameChannel;

/// How the bundle behind a [`ContextMetadata`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// The payload decoded (possibly into a valid-but-empty bundle).
    Decoded,
    /// The payload did not decode; the fallback bundle is in use.
    Fallback,
}

/// Parsed, read-only context for an embedded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextMetadata {
    bundle: ContextBundle,
    status: ParseStatus,
}

impl ContextMetadata {
    /// The parsed payload of `channel`. The first call decodes; every later
    /// call returns the same instance without re-reading the channel.
    pub fn from_channel(channel: &FrameChannel) -> Arc<Self> {
        channel
            .metadata
            .get_or_init(|| Arc::new(Self::from_string(channel.claim())))
            .clone()
    }

    /// [`ContextMetadata::from_channel`] over the process-wide channel.
    pub fn from_process_channel() -> Arc<Self> {
        Self::from_channel(FrameChannel::process())
    }

    /// Decode `payload` under the process-wide [`Mode`].
    pub fn from_string(payload: &str) -> Self {
        Self::from_string_in_mode(payload, Mode::current())
    }

    /// Decode `payload`; `mode.test` suppresses the decode diagnostic.
    #[instrument(skip_all, fields(len = payload.len()))]
    pub fn from_string_in_mode(payload: &str, mode: &Mode) -> Self {
        match ContextBundle::decode(payload) {
            Ok(bundle) => Self {
                bundle,
                status: ParseStatus::Decoded,
            },
            Err(e) => {
                if !mode.test {
                    info!(payload, error = %e, "could not parse context from channel payload");
                }
                Self {
                    bundle: ContextBundle::fallback(),
                    status: ParseStatus::Fallback,
                }
            }
        }
    }

    /// Wrap an already-decoded bundle.
    pub fn from_object(bundle: ContextBundle) -> Self {
        Self {
            bundle,
            status: ParseStatus::Decoded,
        }
    }

    /// The host's address, parsed. `None` when absent or not a URL.
    pub fn location(&self) -> Option<Url> {
        let href = self.bundle.context.location.as_ref()?.href.as_deref()?;
        Url::parse(href).ok()
    }

    pub fn context_state(&self) -> ContextState {
        ContextState::from(&self.bundle.context)
    }

    pub fn embed_type(&self) -> Option<&str> {
        self.bundle.embed_type.as_deref()
    }

    /// The `{mode, experimentToggles}` pair the embed should mirror.
    pub fn runtime_config(&self) -> &RuntimeConfig {
        &self.bundle.config
    }

    pub fn attribute_data(&self) -> &AttributeMap {
        &self.bundle.attributes
    }

    /// The sentinel, with an empty value reading as none.
    pub fn sentinel_optional(&self) -> Option<&Sentinel> {
        self.bundle.context.sentinel.as_ref().filter(|s| !s.is_empty())
    }

    pub fn parse_status(&self) -> ParseStatus {
        self.status
    }

    pub fn bundle(&self) -> &ContextBundle {
        &self.bundle
    }
}

#[cfg(test)]
mod tests {
    use framecontext_shared::{
        ContextSection, ExperimentToggles, IntersectionRecord, LayoutRect, Location,
    };
    use serde_json::json;
    use tracing_test::traced_test;

    use super::*;

    const DIAGNOSTIC: &str = "could not parse context from channel payload";

    fn full_bundle() -> ContextBundle {
        let mut attributes = AttributeMap::new();
        attributes.insert("width".into(), json!(300));
        attributes.insert("height".into(), json!(250));
        attributes.insert("title".into(), json!("Advertisement"));
        let toggles: ExperimentToggles = [("flying-carpet".to_string(), true)].into();
        let mode = Mode {
            development: true,
            ..Mode::default()
        };

        ContextBundle {
            embed_type: Some("doubleclick".into()),
            attributes,
            context: ContextSection {
                ampcontext_filepath: Some("https://3p.example/1/ampcontext-v0.js".into()),
                ampcontext_version: Some("1".into()),
                canary: Some(true),
                canonical_url: Some("https://host.example/canonical".into()),
                client_id: Some("amp-xyz".into()),
                container: Some("amp-sticky-ad".into()),
                dom_fingerprint: Some("2847910383".into()),
                hidden: Some(false),
                initial_intersection: Some(IntersectionRecord {
                    time: 12.5,
                    root_bounds: None,
                    bounding_client_rect: LayoutRect::new(0.0, 0.0, 300.0, 250.0),
                    intersection_rect: LayoutRect::new(0.0, 0.0, 300.0, 125.0),
                    intersection_ratio: 0.5,
                    ..IntersectionRecord::default()
                }),
                initial_layout_rect: Some(LayoutRect::new(8.0, 900.0, 300.0, 250.0)),
                page_view_id: Some("4821".into()),
                referrer: Some("https://search.example/".into()),
                sentinel: Some(Sentinel::new("0-7731")),
                source_url: Some("https://host.example/page".into()),
                start_time: Some(1_547_829_113_000),
                tag_name: Some("AMP-AD".into()),
                location: Some(Location {
                    href: Some("https://host.example/page".into()),
                }),
                mode: Some(mode.clone()),
                experiment_toggles: Some(toggles.clone()),
            },
            config: RuntimeConfig {
                mode: Some(mode),
                experiment_toggles: Some(toggles),
            },
        }
    }

    #[test]
    fn encoded_bundle_decodes_field_for_field() {
        let bundle = full_bundle();
        let payload = bundle.encode().expect("encode");
        let meta = ContextMetadata::from_string_in_mode(&payload, &Mode::test());

        assert_eq!(meta.parse_status(), ParseStatus::Decoded);
        assert_eq!(meta.bundle(), &bundle);
        assert_eq!(meta.context_state(), ContextState::from(&bundle.context));
        assert_eq!(meta.embed_type(), Some("doubleclick"));
        assert_eq!(meta.attribute_data()["title"], "Advertisement");
        assert_eq!(meta.runtime_config(), &bundle.config);
        assert_eq!(
            meta.location().map(|u| u.host_str().map(String::from)),
            Some(Some("host.example".into()))
        );
        assert_eq!(meta.sentinel_optional().map(Sentinel::as_str), Some("0-7731"));
    }

    #[test]
    fn malformed_payloads_fall_back_to_empty_sections() {
        for payload in ["", "{", "[1,2]", "\"name\"", "null", "true", "{\"context\": {\"location\""] {
            let meta = ContextMetadata::from_string_in_mode(payload, &Mode::test());
            assert_eq!(meta.parse_status(), ParseStatus::Fallback, "payload {payload:?}");
            assert!(meta.attribute_data().is_empty());
            assert_eq!(meta.context_state(), ContextState::default());
            assert_eq!(meta.runtime_config(), &RuntimeConfig::default());
            assert_eq!(meta.embed_type(), None);
            assert_eq!(meta.location(), None);
            assert_eq!(meta.sentinel_optional(), None);
        }
    }

    #[test]
    fn valid_but_empty_is_distinguishable_from_fallback() {
        let empty = ContextMetadata::from_string_in_mode("{}", &Mode::test());
        let broken = ContextMetadata::from_string_in_mode("}{", &Mode::test());
        assert_eq!(empty.bundle(), broken.bundle());
        assert_eq!(empty.parse_status(), ParseStatus::Decoded);
        assert_eq!(broken.parse_status(), ParseStatus::Fallback);
    }

    #[test]
    fn partial_bundle_reads_absent_fields_as_none() {
        let meta = ContextMetadata::from_string_in_mode(
            r#"{"context": {"sentinel": "s-9", "location": {"href": "no scheme"}}}"#,
            &Mode::test(),
        );
        let state = meta.context_state();
        assert_eq!(state.sentinel, Some(Sentinel::new("s-9")));
        assert_eq!(state.referrer, None);
        assert_eq!(state.initial_layout_rect, None);
        assert_eq!(meta.location(), None);
        assert_eq!(meta.runtime_config().mode, None);
    }

    #[test]
    fn empty_sentinel_reads_as_none() {
        let mut bundle = full_bundle();
        bundle.context.sentinel = Some(Sentinel::new(""));
        let meta = ContextMetadata::from_object(bundle);
        assert_eq!(meta.sentinel_optional(), None);
        assert_eq!(meta.context_state().sentinel, Some(Sentinel::new("")));
    }

    #[test]
    fn from_object_does_not_reparse() {
        let bundle = full_bundle();
        let meta = ContextMetadata::from_object(bundle.clone());
        assert_eq!(meta.parse_status(), ParseStatus::Decoded);
        assert_eq!(meta.bundle(), &bundle);
    }

    #[test]
    fn channel_parse_is_memoized() {
        let payload = full_bundle().encode().expect("encode");
        let channel = FrameChannel::with_payload(payload);
        let first = ContextMetadata::from_channel(&channel);
        let second = ContextMetadata::from_channel(&channel);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.context_state(), second.context_state());
    }

    #[test]
    fn separate_channels_parse_separately() {
        let a = FrameChannel::with_payload(r#"{"type": "a"}"#);
        let b = FrameChannel::with_payload(r#"{"type": "b"}"#);
        assert_eq!(ContextMetadata::from_channel(&a).embed_type(), Some("a"));
        assert_eq!(ContextMetadata::from_channel(&b).embed_type(), Some("b"));
    }

    #[traced_test]
    #[test]
    fn empty_payload_logs_one_diagnostic() {
        let meta = ContextMetadata::from_string_in_mode("", &Mode::default());
        let state = meta.context_state();
        assert_eq!(state, ContextState::default());
        assert_eq!(state.ampcontext_filepath, None);
        assert_eq!(state.tag_name, None);

        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|line| line.contains(DIAGNOSTIC)).count() {
                1 => Ok(()),
                n => Err(format!("expected one diagnostic, found {n}")),
            }
        });
    }

    #[traced_test]
    #[test]
    fn test_mode_suppresses_diagnostic() {
        let meta = ContextMetadata::from_string_in_mode("not json", &Mode::test());
        assert_eq!(meta.parse_status(), ParseStatus::Fallback);
        assert!(!logs_contain(DIAGNOSTIC));
    }
}
