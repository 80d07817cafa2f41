//! Content hashing and URL-derived identities.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of normalized content.
///
/// Byte-identical input always yields the same digest; any change to the
/// input yields a different one.
#[must_use]
pub fn content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

/// Canonical form of a URL used for identity: lowercase scheme and host, no
/// fragment, no trailing slash on the path. The query string is kept because
/// it often selects distinct content.
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_fragment = trimmed.split('#').next().unwrap_or(trimmed);

    let (scheme, rest) = match without_fragment.split_once("://") {
        Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
        None => ("https".to_string(), without_fragment),
    };

    let split_at = rest.find(|c: char| c == '/' || c == '?').unwrap_or(rest.len());
    let (authority, path_and_query) = rest.split_at(split_at);
    let authority = authority.to_ascii_lowercase();

    let (path, query) = match path_and_query.split_once('?') {
        Some((path, query)) if !query.is_empty() => (path, format!("?{query}")),
        Some((path, _)) => (path, String::new()),
        None => (path_and_query, String::new()),
    };
    let path = path.trim_end_matches('/');

    format!("{scheme}://{authority}{path}{query}")
}

/// Stable post identity for content that has no platform-assigned id.
#[must_use]
pub fn derive_post_id(url: &str) -> String {
    let digest = content_hash(&normalize_url(url));
    format!("url-{}", &digest[..16])
}
