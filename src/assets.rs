//! CSS and SVG used by the generated pages, embedded at build time.

use std::sync::OnceLock;

use include_dir::{include_dir, Dir};

static ASSETS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/assets");

fn embedded(name: &str) -> &'static str {
    ASSETS
        .get_file(name)
        .and_then(|file| file.contents_utf8())
        .unwrap_or_default()
}

/// Stylesheet shared by the listing and error pages.
pub fn styles() -> &'static str {
    static STYLES: OnceLock<String> = OnceLock::new();
    STYLES.get_or_init(|| minify(embedded("styles.css")))
}

/// SVG sprite with the icons of the listing page.
pub fn icons() -> &'static str {
    static ICONS: OnceLock<String> = OnceLock::new();
    ICONS.get_or_init(|| minify(embedded("icons.svg")))
}

// Drops indentation and blank lines.
fn minify(source: &str) -> String {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assets_are_embedded() {
        assert!(styles().contains(".files"));
        assert!(icons().contains("id=\"icon-dir\""));
        assert!(icons().contains("id=\"icon-file\""));
        assert!(std::ptr::eq(styles(), styles()));
    }
}
