//! Requesting-domain resolution

use url::Url;

/// Used whenever the requesting domain cannot be determined.
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// Reduce a host-supplied origin to the domain used for scoping.
///
/// Full URLs collapse to their host. Either form comes back lower-cased.
pub fn normalize_domain(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return UNKNOWN_DOMAIN.to_string();
    }

    if !trimmed.contains("://") {
        return trimmed.to_lowercase();
    }

    Url::parse(trimmed)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_lowercase()))
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| UNKNOWN_DOMAIN.to_string())
}
