//! One line per request.

use chrono::{DateTime, Local};
use http::{Method, StatusCode};

use crate::resolver::decode_url_path;

/// What gets logged about a finished request.
#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    pub status: StatusCode,
    pub method: Method,
    pub url_path: String,
    pub local_path: Option<String>,
    pub start: DateTime<Local>,
    pub close: DateTime<Local>,
    pub error: Option<String>,
}

impl AccessLogEntry {
    /// Renders the line, plus the error on a second line if there is one.
    ///
    /// For successful responses the part of the served file's path that the
    /// URL doesn't show (such as an added `.html`) is appended to the URL.
    pub fn render(&self) -> String {
        let mut line = format!(
            "{} {} — {} {}",
            self.start.format("%H:%M:%S"),
            self.status.as_u16(),
            self.method,
            self.url_path,
        );

        if self.status.is_success() {
            if let Some(suffix) = self
                .local_path
                .as_deref()
                .and_then(|local| path_suffix(&self.url_path, local))
            {
                line.push_str(&suffix);
            }
        }

        let duration = (self.close - self.start).num_milliseconds().max(0);
        line.push_str(&format!("  ({duration}ms)"));

        if let Some(error) = &self.error {
            line.push('\n');
            line.push_str(error);
        }
        line
    }
}

fn path_suffix(url_path: &str, local_path: &str) -> Option<String> {
    let url = decode_url_path(url_path).unwrap_or_else(|| url_path.to_owned());
    let local = format!("/{}", local_path.replace('\\', "/"));
    local
        .strip_prefix(url.as_str())
        .filter(|suffix| !suffix.is_empty())
        .map(str::to_owned)
}
