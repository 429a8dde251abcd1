//! Name and barcode normalization.
//!
//! Outlet names arrive in free text with inconsistent casing and spacing;
//! barcodes arrive as numbers, text, or text with embedded spaces. All
//! matching in the directory and ledgers happens on the normalized forms.

/// Trim and collapse internal whitespace runs to single spaces.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical form for outlet/article names: whitespace-normalized, uppercase.
#[must_use]
pub fn normalize_name(text: &str) -> String {
    normalize_whitespace(text).to_uppercase()
}

/// Canonical barcode form: trimmed, all spaces removed, kept as a string.
///
/// Barcodes are never treated as numbers; leading zeros are significant.
#[must_use]
pub fn normalize_barcode(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
