//! HTML for directory listings and error responses.

use std::fmt::Write;

use http::StatusCode;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::assets;
use crate::fs::{DirEntry, FsKind};

/// Characters escaped in path segments of generated links.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\');

pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

fn page(title: &str, body_class: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n\
        <html lang=\"en\">\n\
        <head>\n\
        <meta charset=\"UTF-8\">\n\
        <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
        <title>{title}</title>\n\
        <style>\n{styles}\n</style>\n\
        </head>\n\
        <body class=\"{body_class}\">\n{body}\n</body>\n\
        </html>\n",
        title = html_escape(title),
        styles = assets::styles(),
    )
}

/// Renders the page for an error status.
pub fn error_page(status: StatusCode, url_path: &str) -> String {
    let reason = status.canonical_reason().unwrap_or("Error");
    let path = html_escape(url_path);
    let message = match status {
        StatusCode::BAD_REQUEST => format!("Invalid request for <code>{path}</code>"),
        StatusCode::FORBIDDEN => format!("Could not access <code>{path}</code>"),
        StatusCode::NOT_FOUND => format!("Could not find <code>{path}</code>"),
        StatusCode::METHOD_NOT_ALLOWED => "Method not allowed".to_owned(),
        _ => format!("Something went wrong while serving <code>{path}</code>"),
    };
    let title = format!("{} {}", status.as_u16(), reason);
    let body = format!("<h1>{}</h1>\n<p>{}</p>", html_escape(&title), message);
    page(&title, "error", &body)
}

/// Renders a directory listing.
///
/// `url_path` is the decoded URL path of the directory and `local_path`
/// its path relative to the root. Directories come first, then files.
pub fn dir_list_page(url_path: &str, local_path: &str, entries: &[DirEntry]) -> String {
    let trimmed = url_path.trim_matches('/');
    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    let base = if segments.is_empty() {
        "/".to_owned()
    } else {
        format!(
            "/{}/",
            segments.iter().map(|s| encode_segment(s)).collect::<Vec<_>>().join("/")
        )
    };

    let mut body = String::new();
    body.push_str(assets::icons());
    body.push_str("\n<h1>Index of ");
    body.push_str(&breadcrumbs(&segments));
    body.push_str("</h1>\n<ul class=\"files\">\n");

    if !segments.is_empty() {
        let parent = if segments.len() == 1 {
            "/".to_owned()
        } else {
            format!(
                "/{}/",
                segments[..segments.len() - 1]
                    .iter()
                    .map(|s| encode_segment(s))
                    .collect::<Vec<_>>()
                    .join("/")
            )
        };
        let _ = writeln!(
            body,
            "<li><a href=\"{}\" aria-label=\"Parent directory\">{}<span>..</span></a></li>",
            html_escape(&parent),
            icon("up"),
        );
    }

    let (dirs, files): (Vec<&DirEntry>, Vec<&DirEntry>) = entries
        .iter()
        .partition(|entry| entry.effective_kind() == FsKind::Dir);

    for entry in dirs.iter().chain(files.iter()) {
        let name = entry.name();
        let is_dir = entry.effective_kind() == FsKind::Dir;
        let href = format!(
            "{}{}{}",
            base,
            encode_segment(&name),
            if is_dir { "/" } else { "" }
        );
        let icon_name = match (entry.location.kind, is_dir) {
            (FsKind::Link, _) => "link",
            (_, true) => "dir",
            _ => "file",
        };
        let label = if is_dir { format!("{name}/") } else { name };
        let _ = writeln!(
            body,
            "<li><a href=\"{}\">{}<span>{}</span></a></li>",
            html_escape(&href),
            icon(icon_name),
            html_escape(&label),
        );
    }

    if entries.is_empty() {
        body.push_str("<li class=\"empty\">No files</li>\n");
    }
    body.push_str("</ul>");

    let title = if local_path.is_empty() {
        "Index of /".to_owned()
    } else {
        format!("Index of {}", local_path.replace('\\', "/"))
    };
    page(&title, "list", &body)
}

fn icon(name: &str) -> String {
    format!("<svg aria-hidden=\"true\"><use href=\"#icon-{name}\"></use></svg>")
}

fn breadcrumbs(segments: &[&str]) -> String {
    let mut out = String::from("<a href=\"/\">/</a>");
    let mut href = String::from("/");
    for (idx, segment) in segments.iter().enumerate() {
        href.push_str(&encode_segment(segment));
        href.push('/');
        if idx > 0 {
            out.push_str("<span class=\"sep\">/</span>");
        }
        if idx + 1 == segments.len() {
            out.push_str(&html_escape(segment));
        } else {
            let _ = write!(
                out,
                "<a href=\"{}\">{}</a>",
                html_escape(&href),
                html_escape(segment)
            );
        }
    }
    out
}
