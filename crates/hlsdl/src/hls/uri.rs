// URI resolution for playlist entries.

use tracing::debug;
use url::Url;

fn has_http_scheme(uri: &str) -> bool {
    let lower = uri.get(..8).unwrap_or(uri).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Makes a playlist URI absolute against `base_url`.
///
/// - `http(s)://` URIs are returned as they are.
/// - `//host/path` borrows the scheme of `base_url`.
/// - Everything else, including `/path`, goes through RFC 3986 resolution
///   against the full base URL, so relative entries keep any path prefix a
///   rewriting proxy put in front of the origin URL.
///
/// Empty input is returned unchanged. If the base cannot be parsed the
/// trimmed input is returned.
pub fn resolve(base_url: &str, raw_uri: &str) -> String {
    let uri = raw_uri.trim();
    if uri.is_empty() {
        return raw_uri.to_string();
    }
    if has_http_scheme(uri) {
        return uri.to_string();
    }

    let base = match Url::parse(base_url.trim()) {
        Ok(base) => base,
        Err(e) => {
            debug!(base = base_url, uri, error = %e, "Cannot resolve against invalid base URL");
            return uri.to_string();
        }
    };

    if uri.starts_with("//") {
        return format!("{}:{uri}", base.scheme());
    }

    match base.join(uri) {
        Ok(joined) => joined.to_string(),
        Err(e) => {
            debug!(base = base_url, uri, error = %e, "Failed to join URI with base");
            uri.to_string()
        }
    }
}
