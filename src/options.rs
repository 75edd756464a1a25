//! Server options and their validation.

use std::net::IpAddr;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use crate::error::OptionsError;
use crate::fs::{self, disk, FsKind};
use crate::headers::HeaderRule;

pub const DEFAULT_HOST: &str = "::";
pub const DEFAULT_PORT: u16 = 8080;
/// Number of ports tried for `N+`.
pub const PORTS_CONFIG_COUNT: u16 = 10;
/// Upper bound on the length of a `N-M` range.
pub const MAX_PORTS: usize = 100;

/// Options of a running server. Built once at startup and read-only
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Absolute path of the served directory.
    pub root: PathBuf,
    pub host: String,
    pub ports: Vec<u16>,
    pub headers: Vec<HeaderRule>,
    pub cors: bool,
    pub gzip: bool,
    pub dir_list: bool,
    /// Index file names tried for directories, in order.
    pub dir_file: Vec<String>,
    /// Extensions tried for missing paths, in order, with leading dot.
    pub ext: Vec<String>,
    /// Segment patterns for paths that are never served.
    pub exclude: Vec<String>,
}

impl ServerOptions {
    /// Default options for serving `root`.
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            root,
            host: DEFAULT_HOST.to_owned(),
            ports: port_run(DEFAULT_PORT, PORTS_CONFIG_COUNT),
            headers: Vec::new(),
            cors: false,
            gzip: true,
            dir_list: true,
            dir_file: vec!["index.html".to_owned()],
            ext: vec![".html".to_owned()],
            exclude: vec![".*".to_owned(), "!.well-known".to_owned()],
        }
    }
}

/// Options as given by the user, before validation.
///
/// `None` means "not given", so the default applies.
#[derive(Debug, Clone, Default)]
pub struct RawOptions {
    pub root: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub headers: Vec<String>,
    pub cors: Option<bool>,
    pub gzip: Option<bool>,
    pub dir_list: Option<bool>,
    pub dir_file: Option<Vec<String>>,
    pub ext: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
}

impl RawOptions {
    /// Validates all options, collecting every problem found.
    pub async fn validate(self, cwd: &Path) -> Result<ServerOptions, OptionsError> {
        let mut errors = Vec::new();

        let root = match self.root {
            Some(root) => cwd.join(root),
            None => cwd.to_path_buf(),
        };
        let root = match validate_root(&root).await {
            Ok(root) => root,
            Err(err) => {
                errors.push(err);
                root
            }
        };
        let mut options = ServerOptions::with_root(root);

        if let Some(host) = self.host {
            if is_valid_host(&host) {
                options.host = host;
            } else {
                errors.push(format!("invalid --host value: {host:?}"));
            }
        }

        if let Some(port) = self.port {
            match parse_port(&port) {
                Some(ports) => options.ports = ports,
                None => errors.push(format!("invalid --port value: {port:?}")),
            }
        }

        for header in &self.headers {
            match HeaderRule::parse(header) {
                Ok(rule) => options.headers.push(rule),
                Err(err) => errors.push(err.to_string()),
            }
        }

        if let Some(cors) = self.cors {
            options.cors = cors;
        }
        if let Some(gzip) = self.gzip {
            options.gzip = gzip;
        }
        if let Some(dir_list) = self.dir_list {
            options.dir_list = dir_list;
        }

        if let Some(dir_file) = self.dir_file {
            options.dir_file.clear();
            for name in split_list(&dir_file) {
                if is_valid_file_name(&name) {
                    push_unique(&mut options.dir_file, name);
                } else {
                    errors.push(format!("invalid --dir-file value: {name:?}"));
                }
            }
        }

        if let Some(ext) = self.ext {
            options.ext.clear();
            for ext in split_list(&ext) {
                let ext = if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                };
                if ext.len() > 1 && is_valid_file_name(&ext) {
                    push_unique(&mut options.ext, ext);
                } else {
                    errors.push(format!("invalid --ext value: {ext:?}"));
                }
            }
        }

        if let Some(exclude) = self.exclude {
            options.exclude.clear();
            for pattern in split_list(&exclude) {
                if pattern.contains(['/', '\\']) {
                    errors.push(format!("invalid --exclude pattern: {pattern:?}"));
                } else {
                    push_unique(&mut options.exclude, pattern);
                }
            }
        }

        if errors.is_empty() {
            Ok(options)
        } else {
            Err(OptionsError { errors })
        }
    }
}

async fn validate_root(root: &Path) -> Result<PathBuf, String> {
    let Some(real) = disk::real_path(root).await else {
        return Err(format!("not a directory: {}", root.display()));
    };
    let root = fs::trim_slash(real);
    if disk::kind(&root).await != FsKind::Dir {
        return Err(format!("not a directory: {}", root.display()));
    }
    if !disk::readable(&root, FsKind::Dir).await {
        return Err(format!("directory is not readable: {}", root.display()));
    }
    Ok(root)
}

fn split_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .collect()
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

fn is_valid_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', MAIN_SEPARATOR])
}

fn is_valid_host(host: &str) -> bool {
    if host.parse::<IpAddr>().is_ok() {
        return true;
    }
    !host.is_empty()
        && host.len() <= 253
        && host
            .split('.')
            .all(|label| {
                !label.is_empty()
                    && !label.starts_with('-')
                    && !label.ends_with('-')
                    && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
            })
}

fn port_run(start: u16, count: u16) -> Vec<u16> {
    let end = start.saturating_add(count - 1);
    (start..=end).collect()
}

/// Parses the `--port` syntax: `N`, `N+` or `N-M`.
///
/// ```
/// use servitsy::options::parse_port;
///
/// assert_eq!(parse_port("3000"), Some(vec![3000]));
/// assert_eq!(parse_port("3000+").map(|ports| ports.len()), Some(10));
/// assert_eq!(parse_port("3002-3000"), Some(vec![3002, 3001, 3000]));
/// assert_eq!(parse_port("0"), None);
/// ```
pub fn parse_port(input: &str) -> Option<Vec<u16>> {
    let input = input.trim();
    let number = |value: &str| -> Option<u16> {
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        value.parse::<u16>().ok().filter(|port| *port > 0)
    };

    if let Some(start) = input.strip_suffix('+') {
        return number(start).map(|start| port_run(start, PORTS_CONFIG_COUNT));
    }
    if let Some((start, end)) = input.split_once('-') {
        let (start, end) = (number(start)?, number(end)?);
        let ports: Vec<u16> = if start <= end {
            (start..=end).take(MAX_PORTS).collect()
        } else {
            (end..=start).rev().take(MAX_PORTS).collect()
        };
        return Some(ports);
    }
    number(input).map(|port| vec![port])
}

/// Renders a port list back to the `--port` syntax.
pub fn render_ports(ports: &[u16]) -> String {
    match ports {
        [] => String::new(),
        [port] => port.to_string(),
        [first, .., last] => {
            if ports == port_run(*first, PORTS_CONFIG_COUNT).as_slice() {
                format!("{first}+")
            } else {
                format!("{first}-{last}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ServerOptions::with_root(PathBuf::from("/srv"));
        assert_eq!(options.host, "::");
        assert_eq!(options.ports, (8080..=8089).collect::<Vec<_>>());
        assert!(options.gzip);
        assert!(!options.cors);
        assert!(options.dir_list);
        assert_eq!(options.dir_file, ["index.html"]);
        assert_eq!(options.ext, [".html"]);
        assert_eq!(options.exclude, [".*", "!.well-known"]);
        assert!(options.headers.is_empty());
    }

    #[test]
    fn port_syntax() {
        assert_eq!(parse_port("80"), Some(vec![80]));
        assert_eq!(parse_port("65535"), Some(vec![65535]));
        assert_eq!(parse_port("8080+"), Some((8080..=8089).collect()));
        assert_eq!(parse_port("65530+"), Some((65530..=65535).collect()));
        assert_eq!(parse_port("1-3"), Some(vec![1, 2, 3]));
        assert_eq!(parse_port("3-1"), Some(vec![3, 2, 1]));
        assert_eq!(parse_port("1000-2000").map(|p| p.len()), Some(MAX_PORTS));
        assert_eq!(parse_port("2000-1000").map(|p| p[99]), Some(1901));

        for invalid in ["", "0", "65536", "-1", "80-", "+", "a", "80++", "1-2-3", " 8 0"] {
            assert_eq!(parse_port(invalid), None, "{invalid:?}");
        }
    }

    #[test]
    fn port_round_trip() {
        for input in ["8080", "8080+", "3000-3005", "3005-3000", "1-100"] {
            let ports = parse_port(input).unwrap();
            let rendered = render_ports(&ports);
            assert_eq!(rendered, input);
            assert_eq!(parse_port(&rendered).unwrap(), ports);
        }
    }

    #[test]
    fn hosts() {
        for host in ["::", "0.0.0.0", "127.0.0.1", "::1", "localhost", "my-box.local"] {
            assert!(is_valid_host(host), "{host}");
        }
        for host in ["", "bad host", "-x", "a..b", "http://x"] {
            assert!(!is_valid_host(host), "{host}");
        }
    }

    #[tokio::test]
    async fn validation_applies_values() {
        let dir = tempfile::tempdir().unwrap();
        let raw = RawOptions {
            root: Some(dir.path().to_path_buf()),
            host: Some("127.0.0.1".into()),
            port: Some("3000".into()),
            headers: vec!["X-Test: 1".into()],
            cors: Some(true),
            gzip: Some(false),
            dir_list: Some(false),
            dir_file: Some(vec!["index.html,index.htm".into()]),
            ext: Some(vec!["html".into(), ".htm".into()]),
            exclude: Some(vec![]),
        };
        let options = raw.validate(Path::new("/")).await.unwrap();
        assert_eq!(options.root, std::fs::canonicalize(dir.path()).unwrap());
        assert_eq!(options.host, "127.0.0.1");
        assert_eq!(options.ports, [3000]);
        assert_eq!(options.headers.len(), 1);
        assert!(options.cors);
        assert!(!options.gzip);
        assert!(!options.dir_list);
        assert_eq!(options.dir_file, ["index.html", "index.htm"]);
        assert_eq!(options.ext, [".html", ".htm"]);
        assert!(options.exclude.is_empty());
    }

    #[tokio::test]
    async fn validation_collects_errors() {
        let dir = tempfile::tempdir().unwrap();
        let raw = RawOptions {
            root: Some(dir.path().join("missing")),
            host: Some("no such host!".into()),
            port: Some("99999".into()),
            headers: vec!["nonsense".into()],
            ext: Some(vec!["a/b".into()]),
            ..RawOptions::default()
        };
        let err = raw.validate(Path::new("/")).await.unwrap_err();
        assert_eq!(err.errors.len(), 5, "{err}");
        assert!(err.errors[0].starts_with("not a directory"));
    }

    #[tokio::test]
    async fn root_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file.txt"), "x").unwrap();
        let raw = RawOptions {
            root: Some("file.txt".into()),
            ..RawOptions::default()
        };
        assert!(raw.validate(dir.path()).await.is_err());

        let raw = RawOptions::default();
        let options = raw.validate(dir.path()).await.unwrap();
        assert_eq!(options.root, std::fs::canonicalize(dir.path()).unwrap());
    }
}
