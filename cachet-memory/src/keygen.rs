//! Cache-key and variant-key generation.
//!
//! The primary key for a resource is its canonical request URI. Varying
//! resources add a second level: a variant key derived from the request
//! headers the response's `Vary` names, and a variant cache key
//! (`{variant-key}canonical-uri`) the representation is stored under.

use http::header::{HeaderName, HeaderValue};
use http::Uri;

use cachet_core::CacheRequest;

/// Canonical cache key for the request: lowercased scheme and host,
/// default ports elided, empty paths normalized to `/`, query preserved.
pub fn cache_key(request: &CacheRequest) -> String {
    canonical_uri(request.uri())
}

pub(crate) fn canonical_uri(uri: &Uri) -> String {
    let scheme = uri.scheme_str().unwrap_or("http").to_ascii_lowercase();
    let path = if uri.path().is_empty() { "/" } else { uri.path() };

    let mut key = String::new();
    if let Some(authority) = uri.authority() {
        key.push_str(&scheme);
        key.push_str("://");
        key.push_str(&authority.host().to_ascii_lowercase());
        match uri.port_u16() {
            Some(443) if scheme == "https" => {}
            Some(80) if scheme == "http" => {}
            Some(port) => {
                key.push(':');
                key.push_str(&port.to_string());
            }
            None => {}
        }
    }
    key.push_str(path);
    if let Some(query) = uri.query() {
        key.push('?');
        key.push_str(query);
    }
    key
}

/// Deterministic key over the request's values for the given `Vary`
/// header names: `{name=value&name2=value2}`, names sorted, values joined
/// across repeated headers.
pub(crate) fn variant_key(vary: &[String], request: &CacheRequest) -> String {
    let mut names: Vec<&str> = vary.iter().map(String::as_str).collect();
    names.sort_unstable();
    names.dedup();

    let mut parts = Vec::with_capacity(names.len());
    for name in names {
        let value = name
            .parse::<HeaderName>()
            .ok()
            .and_then(|header| joined_values(request, &header))
            .unwrap_or_default();
        parts.push(format!("{name}={value}"));
    }
    format!("{{{}}}", parts.join("&"))
}

/// Storage key a variant representation lives under.
pub(crate) fn variant_cache_key(variant_key: &str, cache_key: &str) -> String {
    format!("{variant_key}{cache_key}")
}

/// Snapshot of the request headers named by `Vary`, recorded on the entry
/// so suitability checks can compare them against later requests.
pub(crate) fn selecting_headers(
    vary: &[String],
    request: &CacheRequest,
) -> Vec<(HeaderName, Option<HeaderValue>)> {
    let mut selected = Vec::with_capacity(vary.len());
    for name in vary {
        let Ok(header) = name.parse::<HeaderName>() else {
            continue;
        };
        let value = joined_values(request, &header)
            .and_then(|joined| HeaderValue::from_str(&joined).ok());
        selected.push((header, value));
    }
    selected
}

fn joined_values(request: &CacheRequest, header: &HeaderName) -> Option<String> {
    let values: Vec<&str> = request
        .headers()
        .get_all(header)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn request(uri: &str, headers: &[(&str, &str)]) -> CacheRequest {
        let mut builder = http::Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Bytes::new()).unwrap()
    }

    #[test]
    fn canonicalizes_scheme_host_and_port() {
        assert_eq!(
            cache_key(&request("HTTP://Example.COM/a", &[])),
            "http://example.com/a"
        );
        assert_eq!(
            cache_key(&request("http://example.com:80/a", &[])),
            "http://example.com/a"
        );
        assert_eq!(
            cache_key(&request("http://example.com:8080/a", &[])),
            "http://example.com:8080/a"
        );
        assert_eq!(
            cache_key(&request("http://example.com", &[])),
            "http://example.com/"
        );
    }

    #[test]
    fn query_is_part_of_the_key() {
        assert_ne!(
            cache_key(&request("http://example.com/a?p=1", &[])),
            cache_key(&request("http://example.com/a?p=2", &[]))
        );
    }

    #[test]
    fn variant_key_sorts_names_and_joins_values() {
        let request = request(
            "http://example.com/v",
            &[("accept-language", "en"), ("accept-encoding", "gzip")],
        );
        let vary = vec!["accept-language".to_owned(), "accept-encoding".to_owned()];
        assert_eq!(
            variant_key(&vary, &request),
            "{accept-encoding=gzip&accept-language=en}"
        );
    }

    #[test]
    fn absent_selecting_header_yields_empty_value() {
        let request = request("http://example.com/v", &[]);
        let vary = vec!["accept-language".to_owned()];
        assert_eq!(variant_key(&vary, &request), "{accept-language=}");

        let selected = selecting_headers(&vary, &request);
        assert_eq!(selected.len(), 1);
        assert!(selected[0].1.is_none());
    }

    #[test]
    fn variant_cache_key_prefixes_uri() {
        assert_eq!(
            variant_cache_key("{accept-language=en}", "http://example.com/v"),
            "{accept-language=en}http://example.com/v"
        );
    }
}
