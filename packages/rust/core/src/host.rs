//! Host-side collaborator interfaces.
//!
//! The context builder only reads ambient state through these traits. A
//! browser integration, a static HTML page, and the unit-test fakes all plug
//! in here.

use framecontext_shared::{ExperimentToggles, IntersectionRecord, LayoutRect, Mode, Result};

/// Placeholder address of an anonymous (`srcdoc`) document.
pub const SRCDOC_PLACEHOLDER: &str = "about:srcdoc";

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// The window hosting the embed.
pub trait HostWindow {
    /// The window's own address, if it can be read.
    fn location_href(&self) -> Option<String>;

    /// The parent window, if any.
    fn parent(&self) -> Option<&dyn HostWindow>;
}

/// The element that will host the embed.
pub trait HostElement {
    /// Raw attribute value as declared in markup.
    fn attribute(&self, name: &str) -> Option<String>;

    /// Tag name as the DOM reports it (uppercase for HTML elements).
    fn tag_name(&self) -> String;

    /// Layout box in page coordinates; `None` before the first layout.
    fn page_layout_box(&self) -> Option<LayoutRect>;

    /// Current intersection with the viewport, if one has been measured.
    fn intersection_change_entry(&self) -> Option<IntersectionRecord>;

    /// Stable fingerprint of the element's position in the DOM.
    fn dom_fingerprint(&self) -> Result<String>;
}

/// Document and runtime services resolved for a host element or window.
pub trait HostServices {
    fn document_info(&self, element: &dyn HostElement) -> Result<DocumentInfo>;

    /// The referrer as the viewer reports it. `None` means the viewer has
    /// nothing to report; the value is passed on without further checks.
    fn unconfirmed_referrer_url(&self, element: &dyn HostElement) -> Result<Option<String>>;

    fn is_visible(&self, element: &dyn HostElement) -> Result<bool>;

    fn experiment_toggles(&self, window: &dyn HostWindow) -> Result<ExperimentToggles>;

    fn is_canary(&self, window: &dyn HostWindow) -> Result<bool>;

    fn mode(&self) -> Result<Mode>;
}

/// Identity of the hosting document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub source_url: String,
    pub canonical_url: String,
    pub page_view_id: String,
}

// ---------------------------------------------------------------------------
// StaticWindow
// ---------------------------------------------------------------------------

/// A window with a fixed address and an optional parent chain.
#[derive(Debug, Clone, Default)]
pub struct StaticWindow {
    href: Option<String>,
    parent: Option<Box<StaticWindow>>,
}

impl StaticWindow {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            parent: None,
        }
    }

    /// A window whose address cannot be read.
    pub fn opaque() -> Self {
        Self::default()
    }

    pub fn with_parent(mut self, parent: StaticWindow) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }
}

impl HostWindow for StaticWindow {
    fn location_href(&self) -> Option<String> {
        self.href.clone()
    }

    fn parent(&self) -> Option<&dyn HostWindow> {
        self.parent.as_deref().map(|p| p as &dyn HostWindow)
    }
}
