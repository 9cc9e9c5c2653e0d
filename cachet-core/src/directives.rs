//! `Cache-Control` and `Pragma` directive parsing.
//!
//! Directives are `name` or `name=value` elements, comma-separated, spread
//! over any number of header instances. Names compare case-insensitively;
//! values may be quoted.

use http::header::HeaderName;
use http::HeaderMap;

/// A single parsed directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    name: String,
    value: Option<String>,
}

impl Directive {
    /// Lowercased directive name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directive argument with surrounding quotes stripped, if present.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

fn parse_element(element: &str) -> Option<Directive> {
    let element = element.trim();
    if element.is_empty() {
        return None;
    }
    let (name, value) = match element.split_once('=') {
        Some((name, value)) => {
            let value = value.trim().trim_matches('"').to_owned();
            (name, Some(value))
        }
        None => (element, None),
    };
    Some(Directive {
        name: name.trim().to_ascii_lowercase(),
        value,
    })
}

/// Iterates the directives of every instance of `header` in `headers`.
pub fn directives<'a>(
    headers: &'a HeaderMap,
    header: &HeaderName,
) -> impl Iterator<Item = Directive> + 'a {
    headers
        .get_all(header)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(parse_element)
}

/// Whether any instance of `header` carries the named directive.
pub fn has_directive(headers: &HeaderMap, header: &HeaderName, name: &str) -> bool {
    directives(headers, header).any(|d| d.name() == name)
}

/// The argument of the first occurrence of the named directive.
pub fn directive_value(headers: &HeaderMap, header: &HeaderName, name: &str) -> Option<String> {
    directives(headers, header)
        .find(|d| d.name() == name)
        .and_then(|d| d.value.clone())
}

/// Parses a delta-seconds directive argument.
///
/// Returns `None` for malformed or negative values.
pub fn delta_seconds(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok().filter(|secs| *secs >= 0)
}
