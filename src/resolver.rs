// URL resolver (§4.B). Given a base URL and a reference extracted from HTML
// or CSS, produce the resource-table key that the reference designates.

use indexmap::IndexMap;
use url::Url;

use crate::resource::Resource;

/// Strip a single layer of surrounding single or double quotes.
pub(crate) fn strip_quotes(reference: &str) -> &str {
    let r = reference.trim();
    let bytes = r.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &r[1..r.len() - 1];
        }
    }
    r
}

/// Resolve `reference` (relative to `base`) against `media`, trying the four
/// strategies in order. Returns the matched key, not the resource, since
/// callers also need the key as the new base for recursive CSS resolution.
pub fn resolve(base: &str, reference: &str, media: &IndexMap<String, Resource>) -> Option<String> {
    let cleaned = strip_quotes(reference);
    if cleaned.is_empty() {
        return None;
    }

    // 1. Direct.
    if media.contains_key(cleaned) {
        return Some(cleaned.to_string());
    }

    // 2. Relative join: pop the last segment of `base`, fold `.`/`..`.
    if let Some(joined) = relative_join(base, cleaned) {
        if media.contains_key(&joined) {
            return Some(joined);
        }
    }

    // 3. Root-relative.
    if cleaned.starts_with('/') {
        if let Ok(base_url) = Url::parse(base) {
            let candidate = format!("{}{}", base_url.origin().ascii_serialization(), cleaned);
            if media.contains_key(&candidate) {
                return Some(candidate);
            }
        }
    }

    // 4. Filename tail: last path segment, if longer than 3 chars, matched
    // against the suffix of any media key. First hit wins (insertion order).
    let tail = cleaned.rsplit('/').next().unwrap_or(cleaned);
    if tail.len() > 3 {
        for key in media.keys() {
            if key == tail || key.ends_with(&format!("/{tail}")) {
                return Some(key.clone());
            }
        }
    }

    None
}

/// Path-only join: pop the last segment of `base`, fold `.`/`..` segments of
/// `reference` against the remaining stack. No scheme/authority manipulation
/// beyond what `base` already provides.
fn relative_join(base: &str, reference: &str) -> Option<String> {
    // Absolute reference (has its own scheme) — not a relative join.
    if reference.contains("://") {
        return None;
    }

    let (prefix, path) = split_authority(base)?;

    let mut stack: Vec<&str> = path.split('/').collect();
    // Pop the trailing filename segment of base, keeping the directory.
    stack.pop();

    for segment in reference.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            seg => stack.push(seg),
        }
    }

    Some(format!("{prefix}{}", stack.join("/")))
}

/// Split a URL-ish string into `(scheme://authority, path)`. Returns `None`
/// if `base` doesn't look like an absolute URL (no `://`).
fn split_authority(base: &str) -> Option<(String, &str)> {
    let idx = base.find("://")?;
    let after_scheme = idx + 3;
    let rest = &base[after_scheme..];
    match rest.find('/') {
        Some(slash) => Some((base[..after_scheme + slash + 1].to_string(), &rest[slash + 1..])),
        None => Some((format!("{}/", &base[..after_scheme + rest.len()]), "")),
    }
}
