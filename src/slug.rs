//! Slug derivation for collection anchors.
//!
//! Every collection is addressed on the generated page by an anchor derived
//! from its display name. The derivation is lossy:
//!
//! - `"Alpha"` → `"alpha"`
//! - `"My Best Server!"` → `"my-best-server"`
//! - `"--EU West 2--"` → `"eu-west-2"`
//! - `"Ünïcode"` → `"n-code"`
//!
//! Because distinct names can collapse to the same slug (`"EU West"` and
//! `"eu-west"`), the stored slug of a collection goes through
//! [`unique_slug`] once, when the collection is created.

/// Base used when a name has no ASCII alphanumerics at all.
pub const FALLBACK_SLUG: &str = "collection";

/// Derive the anchor slug for a collection name.
///
/// Lowercases, collapses every run of characters outside `[a-z0-9]` into a
/// single `-`, and trims leading and trailing dashes. Pure and idempotent:
/// `slugify(&slugify(x)) == slugify(x)`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Pick a slug for a new collection that no existing collection uses.
///
/// Starts from `slugify(name)` (or [`FALLBACK_SLUG`] when that is empty) and
/// appends `-2`, `-3`, … until `is_taken` rejects no more.
pub fn unique_slug(name: &str, is_taken: impl Fn(&str) -> bool) -> String {
    let base = match slugify(name) {
        s if s.is_empty() => FALLBACK_SLUG.to_string(),
        s => s,
    };
    if !is_taken(&base) {
        return base;
    }
    (2u32..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or(base)
}
