//! Context handoff between a hosting document and its embedded frames.
//!
//! The host side ([`ContextBuilder`]) assembles a [`ContextBundle`] from
//! ambient state read through the [`host`] collaborator traits and writes its
//! encoding into a [`FrameChannel`]. The embedded side ([`ContextMetadata`])
//! decodes that payload once and serves typed accessors over it.
//!
//! [`ContextBundle`]: framecontext_shared::ContextBundle

pub mod builder;
pub mod channel;
pub mod fingerprint;
pub mod host;
pub mod length;
pub mod metadata;

pub use builder::{ContextBuilder, EmbedAttributes};
pub use channel::FrameChannel;
pub use fingerprint::{FingerprintNode, dom_fingerprint, dom_fingerprint_plain, string_hash32};
pub use host::{DocumentInfo, HostElement, HostServices, HostWindow, SRCDOC_PLACEHOLDER, StaticWindow};
pub use length::length_numeral;
pub use metadata::{ContextMetadata, ParseStatus};
