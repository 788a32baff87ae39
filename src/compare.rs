//! Whitespace-normalizing text comparison, the default check for run
//! steps: token sequences must match, whitespace layout must not.

/// Collapse every run of whitespace (spaces, tabs, newlines) to a single
/// space and drop leading/trailing runs.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Token-wise equality under [normalize_whitespace].
pub fn text_equal(expected: &str, actual: &str) -> bool {
    normalize_whitespace(expected) == normalize_whitespace(actual)
}
