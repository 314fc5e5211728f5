//! Backend URL normalization, validation and scheme selection.
//!
//! # Responsibilities
//! - Turn loosely written backends (`host`, `host:port`, `://host`,
//!   `ws://host/dir`) into canonical absolute URLs
//! - Reject anything that is not absolute
//! - Map schemes between the HTTP and WebSocket families
//!
//! # Design Decisions
//! - Normalization never errors; an empty string means "invalid"
//! - Scheme correction always runs as two passes: the first pass only reads
//!   and corrects the scheme token, the second re-tokenizes host, port and
//!   path against the corrected scheme. A scheme-less `host:port` would
//!   otherwise parse as scheme `host`.

use url::{ParseError, Url};

use crate::error::ProxyError;

const SCHEME_SEPARATOR: &str = "://";

/// Pick the HTTP-family scheme matching `scheme`. Defaults to `http`.
pub fn http_scheme(scheme: &str) -> &'static str {
    match scheme {
        "https" | "wss" => "https",
        _ => "http",
    }
}

/// Pick the WebSocket-family scheme matching `scheme`. Defaults to `ws`.
pub fn websocket_scheme(scheme: &str) -> &'static str {
    match scheme {
        "https" | "wss" => "wss",
        _ => "ws",
    }
}

/// Canonicalize a raw backend string into an absolute URL.
///
/// Returns an empty string when the result has no host. Input that cannot be
/// parsed at all is returned unchanged so validation can reject it.
pub fn normalize_url(raw: &str) -> String {
    let (scheme, rest) = split_scheme(raw);

    // Pass one: correct the scheme token on its own.
    let scheme = http_scheme(&scheme.unwrap_or_default().to_ascii_lowercase());

    // Pass two: tokenize host/port/path against the corrected scheme.
    let mut parsed = match Url::parse(&format!("{scheme}{SCHEME_SEPARATOR}{rest}")) {
        Ok(url) => url,
        Err(ParseError::EmptyHost) => return String::new(),
        Err(_) => return raw.to_string(),
    };

    if parsed.host_str().map_or(true, str::is_empty) {
        return String::new();
    }

    if parsed.path().is_empty() {
        parsed.set_path("/");
    }

    parsed.to_string()
}

/// Ensure `raw` parses as an absolute URL with a host.
pub fn validate_url(raw: &str) -> Result<(), ProxyError> {
    let parsed = Url::parse(raw).map_err(|_| ProxyError::InvalidUrl(raw.to_string()))?;

    if parsed.cannot_be_a_base() || parsed.host_str().map_or(true, str::is_empty) {
        return Err(ProxyError::InvalidUrl(raw.to_string()));
    }

    Ok(())
}

/// Join a backend mount path with a request path.
///
/// The result is always absolute and lexically clean: empty and `.` segments
/// are dropped, `..` pops a segment, and there is no trailing slash except
/// for the root.
pub fn join_paths(base: &str, tail: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(tail.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Split off a leading `scheme://` when the prefix is a syntactically valid
/// scheme. `"://host"` yields an empty scheme.
fn split_scheme(raw: &str) -> (Option<&str>, &str) {
    let Some(index) = raw.find(SCHEME_SEPARATOR) else {
        return (None, raw);
    };

    let candidate = &raw[..index];
    let rest = &raw[index + SCHEME_SEPARATOR.len()..];

    if candidate.is_empty() {
        return (None, rest);
    }

    let mut chars = candidate.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

    if valid {
        (Some(candidate), rest)
    } else {
        (None, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_inputs_normalize_to_nothing() {
        assert_eq!(normalize_url(""), "");
        assert_eq!(normalize_url("://"), "");
        assert_eq!(normalize_url("http://"), "");
        assert_eq!(normalize_url("https://"), "");
    }

    #[test]
    fn bare_hosts_get_http() {
        assert_eq!(normalize_url("192.168.1.1"), "http://192.168.1.1/");
        assert_eq!(normalize_url("://192.168.1.1"), "http://192.168.1.1/");
        assert_eq!(normalize_url("http://192.168.1.1"), "http://192.168.1.1/");
        assert_eq!(normalize_url("https://192.168.1.1"), "https://192.168.1.1/");
        assert_eq!(normalize_url("example.com"), "http://example.com/");
        assert_eq!(normalize_url("example.com/dir/"), "http://example.com/dir/");
    }

    #[test]
    fn host_port_is_not_a_scheme() {
        assert_eq!(normalize_url("example.com:3000"), "http://example.com:3000/");
        assert_eq!(normalize_url("localhost:8080/api"), "http://localhost:8080/api");
        assert_eq!(normalize_url("https://example.com:3000"), "https://example.com:3000/");
    }

    #[test]
    fn websocket_and_unknown_schemes_map_to_http() {
        assert_eq!(normalize_url("ws://example.com/socket"), "http://example.com/socket");
        assert_eq!(normalize_url("wss://example.com"), "https://example.com/");
        assert_eq!(normalize_url("ftp://example.com"), "http://example.com/");
        assert_eq!(normalize_url("HTTPS://Example.com"), "https://example.com/");
    }

    #[test]
    fn query_containing_separator_is_not_a_scheme() {
        assert_eq!(
            normalize_url("example.com/r?to=http://other"),
            "http://example.com/r?to=http://other"
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in [
            "192.168.1.1",
            "example.com:3000",
            "https://example.com:3000",
            "wss://chat.example.com/rooms/",
            "example.com/api/v1",
            "[::1]:9000",
        ] {
            let once = normalize_url(raw);
            assert!(!once.is_empty(), "{raw} should normalize");
            assert_eq!(normalize_url(&once), once, "{raw} not idempotent");
        }
    }

    #[test]
    fn validation() {
        assert!(validate_url("").is_err());
        assert!(validate_url("http://").is_err());
        assert!(validate_url("/relative/path").is_err());
        assert!(validate_url("mailto:ops@example.com").is_err());
        assert!(validate_url("http://127.0.0.1:5000/").is_ok());
    }

    #[test]
    fn test_http_scheme() {
        assert_eq!(http_scheme("http"), "http");
        assert_eq!(http_scheme("https"), "https");
        assert_eq!(http_scheme("ws"), "http");
        assert_eq!(http_scheme("wss"), "https");
        assert_eq!(http_scheme(""), "http");
        assert_eq!(http_scheme("abcd"), "http");
    }

    #[test]
    fn test_websocket_scheme() {
        assert_eq!(websocket_scheme("ws"), "ws");
        assert_eq!(websocket_scheme("wss"), "wss");
        assert_eq!(websocket_scheme("http"), "ws");
        assert_eq!(websocket_scheme("https"), "wss");
        assert_eq!(websocket_scheme(""), "ws");
        assert_eq!(websocket_scheme("abcd"), "ws");
    }

    #[test]
    fn scheme_mappings_round_trip() {
        for scheme in ["http", "https"] {
            assert_eq!(http_scheme(websocket_scheme(scheme)), scheme);
        }
        for scheme in ["ws", "wss"] {
            assert_eq!(websocket_scheme(http_scheme(scheme)), scheme);
        }
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/", "/a/b"), "/a/b");
        assert_eq!(join_paths("/api", "/a"), "/api/a");
        assert_eq!(join_paths("/api/", "/"), "/api");
        assert_eq!(join_paths("/", "/"), "/");
        assert_eq!(join_paths("/api", "/a/./b//c/../d"), "/api/a/b/d");
        assert_eq!(join_paths("/", "/../../etc"), "/etc");
    }
}
