//! Static HTML host for the context builder.
//!
//! Lets the builder run against a saved page: the host element is picked
//! with a CSS selector, document identity comes from the page and the
//! caller, and runtime flags come from [`AppConfig`]. A static page is never
//! laid out, so layout and intersection are always absent.

use std::path::Path;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use framecontext_core::{
    DocumentInfo, FingerprintNode, HostElement, HostServices, HostWindow, dom_fingerprint,
};
use framecontext_shared::{
    AppConfig, ExperimentToggles, FrameContextError, IntersectionRecord, LayoutRect, Mode, Result,
};

// ---------------------------------------------------------------------------
// HtmlDocument
// ---------------------------------------------------------------------------

/// A parsed HTML page.
pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    /// Read and parse a page from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| FrameContextError::io(path, e))?;
        Ok(Self::parse(&source))
    }

    /// First element matching `selector`.
    pub fn select(&self, selector: &str) -> Result<HtmlElement<'_>> {
        let sel = Selector::parse(selector).map_err(|e| {
            FrameContextError::validation(format!("invalid selector '{selector}': {e}"))
        })?;
        self.html
            .select(&sel)
            .next()
            .map(HtmlElement)
            .ok_or_else(|| {
                FrameContextError::validation(format!("no element matches '{selector}'"))
            })
    }

    /// The raw `href` of `<link rel="canonical">`, if declared.
    pub fn canonical_href(&self) -> Option<String> {
        let sel = Selector::parse(r#"link[rel="canonical"][href]"#).expect("valid selector");
        self.html
            .select(&sel)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(String::from)
    }
}

// ---------------------------------------------------------------------------
// HtmlElement
// ---------------------------------------------------------------------------

/// An element of an [`HtmlDocument`].
#[derive(Clone, Copy)]
pub struct HtmlElement<'a>(ElementRef<'a>);

impl HostElement for HtmlElement<'_> {
    fn attribute(&self, name: &str) -> Option<String> {
        self.0.value().attr(name).map(String::from)
    }

    fn tag_name(&self) -> String {
        self.0.value().name().to_ascii_uppercase()
    }

    fn page_layout_box(&self) -> Option<LayoutRect> {
        None
    }

    fn intersection_change_entry(&self) -> Option<IntersectionRecord> {
        None
    }

    fn dom_fingerprint(&self) -> Result<String> {
        Ok(dom_fingerprint(self))
    }
}

impl FingerprintNode for HtmlElement<'_> {
    fn node_name(&self) -> String {
        self.0.value().name().to_ascii_lowercase()
    }

    fn id(&self) -> Option<String> {
        self.0.value().id().map(String::from)
    }

    fn parent_element(&self) -> Option<Self> {
        self.0.parent().and_then(ElementRef::wrap).map(HtmlElement)
    }

    fn previous_element_sibling(&self) -> Option<Self> {
        self.0.prev_siblings().find_map(ElementRef::wrap).map(HtmlElement)
    }
}

// ---------------------------------------------------------------------------
// PageServices
// ---------------------------------------------------------------------------

/// Document and runtime services for a static page.
pub struct PageServices<'a> {
    document: &'a HtmlDocument,
    config: &'a AppConfig,
    source_url: Option<Url>,
    referrer: Option<String>,
    visible: bool,
    page_view_id: String,
}

impl<'a> PageServices<'a> {
    pub fn new(document: &'a HtmlDocument, config: &'a AppConfig) -> Self {
        Self {
            document,
            config,
            source_url: None,
            referrer: None,
            visible: true,
            page_view_id: generate_page_view_id(),
        }
    }

    /// Address the page was served from.
    pub fn with_source_url(mut self, url: Url) -> Self {
        self.source_url = Some(url);
        self
    }

    pub fn with_referrer(mut self, referrer: Option<String>) -> Self {
        self.referrer = referrer;
        self
    }

    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

impl HostServices for PageServices<'_> {
    #[instrument(skip_all)]
    fn document_info(&self, _element: &dyn HostElement) -> Result<DocumentInfo> {
        let source = self
            .source_url
            .as_ref()
            .ok_or_else(|| FrameContextError::collaborator("document-info", "no source URL"))?;

        // Canonical defaults to the source address when undeclared or unresolvable.
        let canonical = match self.document.canonical_href() {
            Some(href) => source.join(&href).unwrap_or_else(|e| {
                debug!(%href, error = %e, "canonical link unresolvable, using source URL");
                source.clone()
            }),
            None => source.clone(),
        };

        Ok(DocumentInfo {
            source_url: source.to_string(),
            canonical_url: canonical.to_string(),
            page_view_id: self.page_view_id.clone(),
        })
    }

    fn unconfirmed_referrer_url(&self, _element: &dyn HostElement) -> Result<Option<String>> {
        Ok(self.referrer.clone())
    }

    fn is_visible(&self, _element: &dyn HostElement) -> Result<bool> {
        Ok(self.visible)
    }

    fn experiment_toggles(&self, _window: &dyn HostWindow) -> Result<ExperimentToggles> {
        Ok(self.config.experiments.clone())
    }

    fn is_canary(&self, _window: &dyn HostWindow) -> Result<bool> {
        Ok(self.config.runtime.canary)
    }

    fn mode(&self) -> Result<Mode> {
        Ok(self.config.mode.clone())
    }
}

/// Four-digit page view id, drawn from the random tail of a UUID v7.
fn generate_page_view_id() -> String {
    format!("{:04}", Uuid::now_v7().as_u128() % 10_000)
}

#[cfg(test)]
mod tests {
    use framecontext_core::{ContextBuilder, StaticWindow, dom_fingerprint_plain};
    use framecontext_shared::Sentinel;

    use super::*;

    fn load_fixture() -> HtmlDocument {
        HtmlDocument::load(Path::new("../../../fixtures/html/embed.html")).expect("read fixture")
    }

    #[test]
    fn select_reads_attributes_and_tag() {
        let doc = load_fixture();
        let el = doc.select("amp-ad").expect("select");
        assert_eq!(el.tag_name(), "AMP-AD");
        assert_eq!(el.attribute("type").as_deref(), Some("doubleclick"));
        assert_eq!(el.attribute("title"), None);
        assert_eq!(el.page_layout_box(), None);
    }

    #[test]
    fn select_reports_bad_or_missing_selectors() {
        let doc = load_fixture();
        assert!(doc.select("amp-iframe").is_err());
        assert!(doc.select("[[").is_err());
    }

    #[test]
    fn fingerprint_walks_ancestry() {
        let doc = load_fixture();
        let first = doc.select("amp-ad").expect("select");
        let second = doc.select(r#"amp-ad[type="adsense"]"#).expect("select");
        assert_eq!(
            dom_fingerprint_plain(&first),
            "amp-ad/top-slot.0,main/content.0,body.0,html.0"
        );
        assert_eq!(
            dom_fingerprint_plain(&second),
            "amp-ad.1,main/content.0,body.0,html.0"
        );
        assert_ne!(
            first.dom_fingerprint().expect("fingerprint"),
            second.dom_fingerprint().expect("fingerprint")
        );
    }

    #[test]
    fn document_info_resolves_canonical_against_source() {
        let doc = load_fixture();
        let config = AppConfig::default();
        let services = PageServices::new(&doc, &config)
            .with_source_url(Url::parse("https://host.example/articles/story").unwrap());
        let el = doc.select("amp-ad").expect("select");

        let info = services.document_info(&el).expect("document info");
        assert_eq!(info.source_url, "https://host.example/articles/story");
        assert_eq!(info.canonical_url, "https://host.example/articles/canonical-story");
        assert_eq!(info.page_view_id.len(), 4);
    }

    #[test]
    fn document_info_without_source_fails() {
        let doc = HtmlDocument::parse("<amp-ad></amp-ad>");
        let config = AppConfig::default();
        let services = PageServices::new(&doc, &config);
        let el = doc.select("amp-ad").expect("select");
        assert!(services.document_info(&el).is_err());
    }

    #[test]
    fn builder_runs_against_static_page() {
        let doc = load_fixture();
        let mut config = AppConfig::default();
        config.experiments.insert("flying-carpet".into(), true);
        let services = PageServices::new(&doc, &config)
            .with_source_url(Url::parse("https://host.example/page").unwrap())
            .with_visibility(false);
        let window = StaticWindow::new("https://host.example/page");
        let el = doc.select("amp-ad").expect("select");

        let bundle = ContextBuilder::new(&config.runtime).build_bundle(
            el.attribute("type"),
            &window,
            &el,
            &services,
            &Sentinel::new("abc123"),
            None,
        );

        assert_eq!(bundle.embed_type.as_deref(), Some("doubleclick"));
        assert_eq!(bundle.attributes["width"], 300);
        assert_eq!(bundle.attributes["height"], 250);
        assert_eq!(bundle.attributes["src"], "https://ads.example/creative.html");
        assert_eq!(bundle.context.hidden, Some(true));
        assert_eq!(bundle.context.referrer, None);
        assert_eq!(bundle.context.initial_layout_rect, None);
        assert_eq!(
            bundle.context.canonical_url.as_deref(),
            Some("https://host.example/articles/canonical-story")
        );
        assert_eq!(
            bundle.config.experiment_toggles.and_then(|t| t.get("flying-carpet").copied()),
            Some(true)
        );
    }

    #[test]
    fn builder_normalizes_suffixed_and_auto_lengths() {
        let doc = load_fixture();
        let config = AppConfig::default();
        let services = PageServices::new(&doc, &config);
        let el = doc.select(r#"amp-ad[type="adsense"]"#).expect("select");

        let out = ContextBuilder::new(&config.runtime).build_attributes(
            &StaticWindow::new("https://host.example/"),
            &el,
            &services,
            &Sentinel::new("s"),
            None,
        );
        assert!(!out.attributes.contains_key("width"));
        assert_eq!(out.attributes["height"], 90);
        assert_eq!(out.attributes["title"], "Sponsored");
        assert_eq!(out.context.source_url, None);
    }
}
