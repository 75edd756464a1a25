//! Custom response headers configured with `--header`.

use serde_json::Value;

use crate::error::HeaderParseError;
use crate::matcher::PathMatcher;

/// Header names that rules are never allowed to set.
pub const BLOCKED_HEADERS: &[&str] = &["content-encoding", "content-length"];

/// A set of headers, optionally limited to some paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRule {
    /// Segment patterns for local paths; `None` means every response.
    pub include: Option<Vec<String>>,
    pub headers: Vec<(String, String)>,
}

impl HeaderRule {
    /// Parses a `--header` value.
    ///
    /// Accepts `Name: Value` or a JSON object of headers, either one
    /// optionally preceded by comma-separated include patterns and
    /// whitespace:
    ///
    /// ```
    /// use servitsy::HeaderRule;
    ///
    /// let rule = HeaderRule::parse("*.js,*.css Cache-Control: max-age=60").unwrap();
    /// assert_eq!(rule.include.as_deref(), Some(&["*.js".to_string(), "*.css".to_string()][..]));
    /// assert_eq!(rule.headers, [("Cache-Control".to_string(), "max-age=60".to_string())]);
    ///
    /// let rule = HeaderRule::parse(r#"{"X-Frame-Options": "DENY", "X-Count": 2}"#).unwrap();
    /// assert_eq!(rule.headers.len(), 2);
    /// ```
    pub fn parse(input: &str) -> Result<Self, HeaderParseError> {
        let input = input.trim();
        let (include, body) = split_include(input);

        let headers = if body.starts_with('{') {
            parse_json_headers(body)
        } else {
            parse_single_header(body).into_iter().collect()
        };

        if headers.is_empty() {
            return Err(HeaderParseError::new(input));
        }
        Ok(HeaderRule { include, headers })
    }
}

fn split_include(input: &str) -> (Option<Vec<String>>, &str) {
    if input.starts_with('{') {
        return (None, input);
    }
    match input.split_once(char::is_whitespace) {
        Some((first, rest)) if !first.contains(':') && !first.starts_with('{') => {
            let include: Vec<String> = first
                .split(',')
                .map(str::trim)
                .filter(|pattern| !pattern.is_empty())
                .map(str::to_owned)
                .collect();
            let include = (!include.is_empty()).then_some(include);
            (include, rest.trim())
        }
        _ => (None, input),
    }
}

fn parse_single_header(input: &str) -> Option<(String, String)> {
    let (name, value) = input.split_once(':')?;
    let (name, value) = (name.trim(), value.trim());
    (is_header_name(name) && !value.is_empty()).then(|| (name.to_owned(), value.to_owned()))
}

fn parse_json_headers(input: &str) -> Vec<(String, String)> {
    let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<Value>(input) else {
        return Vec::new();
    };

    map.into_iter()
        .filter_map(|(name, value)| {
            let value = match value {
                Value::String(value) => value,
                Value::Number(value) => value.to_string(),
                Value::Bool(value) => value.to_string(),
                _ => return None,
            };
            let (name, value) = (name.trim(), value.trim());
            (is_header_name(name) && !value.is_empty())
                .then(|| (name.to_owned(), value.to_owned()))
        })
        .collect()
}

// RFC 9110 token
fn is_header_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

/// Collects the headers of all rules that apply to `local_path`.
///
/// Rules apply in order. Names in `blocklist` (lowercase) and
/// [`BLOCKED_HEADERS`] are skipped.
pub fn file_headers(
    local_path: &str,
    rules: &[HeaderRule],
    blocklist: &[&str],
) -> Vec<(String, String)> {
    let mut result = Vec::new();
    for rule in rules {
        if let Some(include) = &rule.include {
            if !PathMatcher::new(include, true).test(local_path) {
                continue;
            }
        }
        for (name, value) in &rule.headers {
            let lower = name.to_ascii_lowercase();
            if BLOCKED_HEADERS.contains(&lower.as_str()) || blocklist.contains(&lower.as_str()) {
                continue;
            }
            result.push((name.clone(), value.clone()));
        }
    }
    result
}
