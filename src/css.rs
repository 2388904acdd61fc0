// The CSS rewriter (§4.D): a textual substitution pass, not a CSS parser.
//
// Scans left-to-right for `url(...)` payloads, resolves each reference
// against the archive, and replaces it with an inlined data URI. Recurses
// into nested stylesheets (`@import`) using the nested asset's own URL as
// the new base, bounded by a processed-URL memo and a depth cap so a
// reference cycle between two stylesheets can't recurse forever.

use std::collections::HashSet;

use crate::decode::{self, data_uri_base64};
use crate::resolver::{self, strip_quotes};
use crate::resource::Archive;

/// §9 design note: "Recommended bound: 32."
const MAX_DEPTH: usize = 32;

/// Rewrite every resolvable `url(...)` reference in `css`, recursing into
/// referenced stylesheets.
pub fn rewrite(css: &str, base: &str, archive: &Archive) -> String {
    let mut seen = HashSet::new();
    rewrite_inner(css, base, archive, &mut seen, 0)
}

fn rewrite_inner(css: &str, base: &str, archive: &Archive, seen: &mut HashSet<String>, depth: usize) -> String {
    if depth > MAX_DEPTH {
        tracing::warn!(base, "css recursion depth exceeded, leaving remaining references unresolved");
        return css.to_string();
    }

    let mut out = String::with_capacity(css.len());
    let mut i = 0;

    while i < css.len() {
        let Some(rel) = css[i..].find("url(") else {
            out.push_str(&css[i..]);
            break;
        };
        let match_start = i + rel;
        out.push_str(&css[i..match_start]);
        let after = match_start + "url(".len();

        match scan_url_arg(&css[after..]) {
            Some((raw_ref, consumed)) => {
                out.push_str(&replace_reference(raw_ref, base, archive, seen, depth));
                i = after + consumed;
            }
            None => {
                // Malformed `url(` with no closing paren — preserve verbatim
                // and stop scanning (nothing sane left to parse).
                out.push_str(&css[match_start..]);
                i = css.len();
            }
        }
    }

    out
}

/// Resolve a single `url(...)` payload and return the full replacement text
/// (`url('data:...')`), or the original `url(raw_ref)` unchanged if the
/// reference can't be resolved or embedded.
fn replace_reference(
    raw_ref: &str,
    base: &str,
    archive: &Archive,
    seen: &mut HashSet<String>,
    depth: usize,
) -> String {
    let original = format!("url({raw_ref})");
    let cleaned = strip_quotes(raw_ref);

    let Some(key) = resolver::resolve(base, cleaned, &archive.media) else {
        tracing::debug!(reference = cleaned, "css url() reference did not resolve, leaving unchanged");
        return original;
    };

    let resource = &archive.media[&key];
    let Some(raw_bytes) = decode::decode(&resource.data, resource.transfer_encoding) else {
        tracing::warn!(url = key, "failed to decode css-referenced asset, leaving reference unchanged");
        return original;
    };

    let embedded_bytes = if resource.is_css() {
        if seen.contains(&key) {
            tracing::warn!(url = key, "css @import cycle detected, leaving reference unchanged");
            return original;
        }
        seen.insert(key.clone());
        let nested_css = String::from_utf8_lossy(&raw_bytes).into_owned();
        let rewritten = rewrite_inner(&nested_css, &key, archive, seen, depth + 1);
        rewritten.into_bytes()
    } else {
        raw_bytes
    };

    let data_uri = data_uri_base64(&embedded_bytes, &resource.content_type);
    format!("url('{data_uri}')")
}

/// Scan the text immediately following `url(` for its argument, returning
/// `(reference, bytes_consumed_including_closing_paren)`. Handles both
/// quoted and unquoted forms.
fn scan_url_arg(s: &str) -> Option<(&str, usize)> {
    let bytes = s.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() && (bytes[idx] as char).is_whitespace() {
        idx += 1;
    }
    if idx >= bytes.len() {
        return None;
    }

    if bytes[idx] == b'"' || bytes[idx] == b'\'' {
        let quote = bytes[idx];
        let start = idx;
        idx += 1;
        while idx < bytes.len() && bytes[idx] != quote {
            idx += 1;
        }
        if idx >= bytes.len() {
            return None;
        }
        idx += 1; // past closing quote
        let value_end = idx;
        while idx < bytes.len() && (bytes[idx] as char).is_whitespace() {
            idx += 1;
        }
        if idx >= bytes.len() || bytes[idx] != b')' {
            return None;
        }
        Some((&s[start..value_end], idx + 1))
    } else {
        let start = idx;
        while idx < bytes.len() && bytes[idx] != b')' {
            idx += 1;
        }
        if idx >= bytes.len() {
            return None;
        }
        Some((&s[start..idx], idx + 1))
    }
}
