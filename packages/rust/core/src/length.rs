//! Length normalization for declared `width`/`height` attributes.

use std::sync::LazyLock;

use regex::Regex;

/// Parse the leading numeric part of a declared length, the way browsers
/// read `parseFloat`: `"300"`, `"300px"`, and `" 12.5em"` all yield a number,
/// anything without a leading number (or a non-finite one) yields `None`.
///
/// Absent is the normalized form of an unusable length; it is never an error.
pub fn length_numeral(raw: Option<&str>) -> Option<f64> {
    static LEADING_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)").expect("valid regex")
    });

    let caps = LEADING_NUMBER_RE.captures(raw?)?;
    let value: f64 = caps[1].parse().ok()?;
    value.is_finite().then_some(value)
}
