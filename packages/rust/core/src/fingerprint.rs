//! DOM position fingerprinting.
//!
//! The plain fingerprint walks up to [`MAX_LEVELS`] ancestors and records
//! `tag[/id].N` per level, where `N` counts earlier siblings with the same
//! tag. The published fingerprint is a 32-bit hash of that string.

use sha2::{Digest, Sha256};

/// Maximum number of ancestor levels recorded.
pub const MAX_LEVELS: usize = 25;

/// Same-tag sibling count at which the index is reported as overflow.
const MAX_SAME_TAG_SIBLINGS: usize = 25;

/// Total siblings scanned before the index is reported as overflow.
const MAX_SIBLINGS_SCANNED: usize = 100;

/// A DOM element the fingerprint can walk. Implementors are cheap handles.
pub trait FingerprintNode: Clone {
    /// Lowercase node name (`div`, `amp-ad`).
    fn node_name(&self) -> String;

    fn id(&self) -> Option<String>;

    fn parent_element(&self) -> Option<Self>;

    fn previous_element_sibling(&self) -> Option<Self>;
}

/// Hashed fingerprint for `element`.
pub fn dom_fingerprint<N: FingerprintNode>(element: &N) -> String {
    string_hash32(&dom_fingerprint_plain(element))
}

/// Unhashed fingerprint: one `tag[/id][.N]` entry per level, comma separated.
/// An overflowed sibling index is left out of its entry.
pub fn dom_fingerprint_plain<N: FingerprintNode>(element: &N) -> String {
    let mut ids = Vec::with_capacity(MAX_LEVELS);
    let mut current = Some(element.clone());

    while let Some(node) = current {
        if ids.len() >= MAX_LEVELS {
            break;
        }
        let id = match node.id() {
            Some(id) if !id.is_empty() => format!("/{id}"),
            _ => String::new(),
        };
        let index = index_within_parent(&node)
            .map(|i| format!(".{i}"))
            .unwrap_or_default();
        ids.push(format!("{}{id}{index}", node.node_name()));
        current = node.parent_element();
    }

    ids.join(",")
}

/// 32-bit hash of `input` as a decimal string (SHA-256 prefix).
pub fn string_hash32(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]).to_string()
}

/// Number of earlier siblings sharing the element's tag, or `None` once the
/// scan limits are hit.
fn index_within_parent<N: FingerprintNode>(element: &N) -> Option<usize> {
    let name = element.node_name();
    let mut scanned = 0;
    let mut same_tag = 0;
    let mut sibling = element.previous_element_sibling();

    while let Some(node) = sibling {
        if same_tag >= MAX_SAME_TAG_SIBLINGS || scanned >= MAX_SIBLINGS_SCANNED {
            break;
        }
        if node.node_name() == name {
            same_tag += 1;
        }
        scanned += 1;
        sibling = node.previous_element_sibling();
    }

    (same_tag < MAX_SAME_TAG_SIBLINGS && scanned < MAX_SIBLINGS_SCANNED).then_some(same_tag)
}
