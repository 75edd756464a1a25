use std::fmt;
use std::io::SeekFrom;
use std::path::Path;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

/// How many leading bytes are inspected when the name alone is not enough.
pub const SNIFF_LIMIT: usize = 2000;

const DEFAULT_CHARSET: &str = "UTF-8";
const TEXT_PLAIN: &str = "text/plain";
const OCTET_STREAM: &str = "application/octet-stream";

/// Extensions with a well-known text type.
const TEXT_TYPES: &[(&str, &str)] = &[
    ("atom", "application/atom+xml"),
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("geojson", "application/geo+json"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("ics", "text/calendar"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("jsonld", "application/ld+json"),
    ("manifest", "text/cache-manifest"),
    ("map", "application/json"),
    ("markdown", "text/markdown"),
    ("md", "text/markdown"),
    ("mdown", "text/markdown"),
    ("mjs", "text/javascript"),
    ("rss", "application/rss+xml"),
    ("rtf", "application/rtf"),
    ("svg", "image/svg+xml"),
    ("tsv", "text/tab-separated-values"),
    ("txt", "text/plain"),
    ("vcard", "text/vcard"),
    ("vcf", "text/vcard"),
    ("vtt", "text/vtt"),
    ("webmanifest", "application/manifest+json"),
    ("xhtml", "application/xhtml+xml"),
    ("xml", "application/xml"),
    ("xsl", "application/xslt+xml"),
    ("yaml", "text/yaml"),
    ("yml", "text/yaml"),
];

/// Extensions with a well-known binary type. The MIME type itself comes
/// from `mime_guess`.
const BIN_TYPES: &[&str] = &[
    "7z", "aac", "apng", "avi", "avif", "bmp", "bz2", "epub", "flac", "gif", "gz", "heic",
    "heif", "ico", "jpeg", "jpg", "m4a", "m4v", "mid", "midi", "mov", "mp3", "mp4", "mpeg",
    "oga", "ogg", "ogv", "opus", "otf", "pdf", "png", "rar", "tar", "tif", "tiff", "ttf",
    "wasm", "wav", "weba", "webm", "webp", "woff", "woff2", "xz", "zip",
];

/// Extensions known to hold text without a more specific type.
const TEXT_EXTENSIONS: &[&str] = &[
    "asp", "aspx", "astro", "bat", "c", "cc", "cfg", "cjs", "clj", "cmd", "conf", "cpp",
    "cs", "cts", "cxx", "d", "dart", "diff", "editorconfig", "env", "erb", "erl", "ex",
    "exs", "fish", "fs", "gitattributes", "gitignore", "go", "gql", "graphql", "groovy",
    "h", "hbs", "hh", "hpp", "hs", "ini", "java", "jl", "jsx", "kt", "kts", "less", "lock",
    "log", "lua", "mts", "mustache", "nim", "njk", "nix", "patch", "php", "pl", "pm", "properties",
    "ps1", "py", "r", "rb", "rs", "sass", "scala", "scss", "sh", "sql", "styl", "svelte",
    "swift", "tcl", "tex", "toml", "ts", "tsx", "twig", "vb", "vue", "zig", "zsh",
];

/// Extensions known to hold binary data without a more specific type.
const BIN_EXTENSIONS: &[&str] = &[
    "a", "bin", "class", "dat", "db", "deb", "dll", "dmg", "dylib", "exe", "img", "iso",
    "jar", "lib", "o", "obj", "pyc", "so", "sqlite", "sqlite3",
];

/// Extension-less file names known to hold text.
const TEXT_NAMES: &[&str] = &[
    ".editorconfig",
    ".env",
    ".gitattributes",
    ".gitignore",
    ".gitkeep",
    ".htaccess",
    ".npmignore",
    ".npmrc",
    ".prettierrc",
    "authors",
    "changelog",
    "contributing",
    "copying",
    "dockerfile",
    "license",
    "makefile",
    "notice",
    "readme",
];

/// Name suffixes which make an extension-less file text.
const TEXT_SUFFIXES: &[&str] = &["config", "ignore", "rc"];

/// Broad classification of a file's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeGroup {
    Text,
    Bin,
    Unknown,
}

/// Outcome of classifying a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeResult {
    pub group: TypeGroup,
    pub mime: String,
    pub charset: Option<String>,
}

impl TypeResult {
    fn text(mime: &str) -> Self {
        TypeResult {
            group: TypeGroup::Text,
            mime: mime.to_owned(),
            charset: Some(DEFAULT_CHARSET.to_owned()),
        }
    }

    fn bin(mime: &str) -> Self {
        TypeResult {
            group: TypeGroup::Bin,
            mime: mime.to_owned(),
            charset: None,
        }
    }

    fn unknown() -> Self {
        TypeResult {
            group: TypeGroup::Unknown,
            mime: OCTET_STREAM.to_owned(),
            charset: None,
        }
    }

    pub fn is_text(&self) -> bool {
        self.group == TypeGroup::Text
    }

    /// The value for a `Content-Type` header.
    pub fn to_header_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TypeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.group, &self.charset) {
            (TypeGroup::Text, Some(charset)) => write!(f, "{}; charset={}", self.mime, charset),
            _ => f.write_str(&self.mime),
        }
    }
}

/// Classifies a file by its name only.
///
/// Returns `None` when the name does not tell, in which case the content
/// needs to be looked at.
pub fn type_from_name(path: &Path) -> Option<TypeResult> {
    let name = path.file_name()?.to_string_lossy().to_lowercase();
    let extension = match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => Some(&name[idx + 1..]),
        _ => None,
    };

    match extension {
        Some(ext) => {
            if let Some((_, mime)) = TEXT_TYPES.iter().find(|(known, _)| *known == ext) {
                return Some(TypeResult::text(mime));
            }
            if BIN_TYPES.contains(&ext) {
                let mime = mime_guess::from_ext(ext)
                    .first_raw()
                    .unwrap_or(OCTET_STREAM);
                return Some(TypeResult::bin(mime));
            }
            if TEXT_EXTENSIONS.contains(&ext) {
                return Some(TypeResult::text(TEXT_PLAIN));
            }
            if BIN_EXTENSIONS.contains(&ext) {
                return Some(TypeResult::bin(OCTET_STREAM));
            }
            None
        }
        None => {
            // Windows drops trailing dots from file names
            let name = name.trim_end_matches('.');
            let known_name = TEXT_NAMES.contains(&name)
                || TEXT_SUFFIXES.iter().any(|suffix| name.ends_with(suffix));
            known_name.then(|| TypeResult::text(TEXT_PLAIN))
        }
    }
}

/// Classifies a chunk of leading file bytes.
pub fn type_from_bytes(bytes: &[u8]) -> TypeResult {
    if has_text_bom(bytes) || !has_binary_bytes(bytes) {
        TypeResult::text(TEXT_PLAIN)
    } else {
        TypeResult::bin(OCTET_STREAM)
    }
}

/// Classifies a file by name, falling back to sniffing the content of
/// `file`. The reader is rewound to its start afterwards.
pub async fn classify<F>(path: &Path, file: Option<&mut F>) -> TypeResult
where
    F: AsyncRead + AsyncSeek + Unpin,
{
    if let Some(result) = type_from_name(path) {
        return result;
    }

    match file {
        Some(file) => match sniff(file).await {
            Ok(bytes) => type_from_bytes(&bytes),
            Err(err) => {
                tracing::debug!("cannot sniff {}: {}", path.display(), err);
                TypeResult::unknown()
            }
        },
        None => TypeResult::unknown(),
    }
}

async fn sniff<F>(file: &mut F) -> std::io::Result<Vec<u8>>
where
    F: AsyncRead + AsyncSeek + Unpin,
{
    let mut buf = Vec::with_capacity(SNIFF_LIMIT);
    (&mut *file).take(SNIFF_LIMIT as u64).read_to_end(&mut buf).await?;
    file.seek(SeekFrom::Start(0)).await?;
    Ok(buf)
}

fn has_text_bom(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0xEF, 0xBB, 0xBF])
        || bytes.starts_with(&[0xFF, 0xFE])
        || bytes.starts_with(&[0xFE, 0xFF])
}

// https://mimesniff.spec.whatwg.org/#binary-data-byte
fn is_binary_data_byte(byte: u8) -> bool {
    matches!(byte, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

fn has_binary_bytes(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .take(SNIFF_LIMIT)
        .any(|byte| is_binary_data_byte(*byte))
}
