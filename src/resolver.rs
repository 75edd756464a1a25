//! Mapping request URLs to entries of the served directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use http::StatusCode;
use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::fs::{self, disk, DirEntry, FsKind, FsLocation, ResolvedFile};
use crate::matcher::PathMatcher;
use crate::options::ServerOptions;

/// Outcome of resolving a URL path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveResult {
    pub url_path: String,
    pub status: StatusCode,
    pub file: Option<ResolvedFile>,
}

/// Checks a raw request path before anything touches the filesystem.
///
/// Rejected are paths which don't start with a slash, contain empty
/// segments, or have segments which are or decode to `.` and `..`, contain
/// `?`, `#` or backslashes, or encode a separator.
pub fn is_valid_url_path(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    if !path.starts_with('/') || path.contains("//") {
        return false;
    }
    if percent_decode_str(path).decode_utf8().is_err() {
        return false;
    }

    path.split('/').skip(1).all(|segment| {
        if segment.contains(['?', '#', '\\']) {
            return false;
        }
        let lower = segment.to_ascii_lowercase();
        if lower.contains("%2f") || lower.contains("%5c") {
            return false;
        }
        match percent_decode_str(segment).decode_utf8() {
            Ok(decoded) => decoded != "." && decoded != "..",
            Err(_) => false,
        }
    })
}

/// Decodes a request path. Only meaningful for paths which passed
/// [`is_valid_url_path`].
pub fn decode_url_path(path: &str) -> Option<String> {
    percent_decode_str(path)
        .decode_utf8()
        .ok()
        .map(|path| path.into_owned())
}

/// Resolves URL paths to files and directories under the root.
#[derive(Debug, Clone)]
pub struct FileResolver {
    options: Arc<ServerOptions>,
    excluded: Arc<PathMatcher>,
}

impl FileResolver {
    pub fn new(options: Arc<ServerOptions>) -> Self {
        let excluded = PathMatcher::new(&options.exclude, true);
        Self {
            options,
            excluded: Arc::new(excluded),
        }
    }

    pub fn root(&self) -> &Path {
        &self.options.root
    }

    /// Resolves `url_path`, which is the raw path of a request target.
    pub async fn find(&self, url_path: &str) -> ResolveResult {
        let mut result = ResolveResult {
            url_path: url_path.to_owned(),
            status: StatusCode::NOT_FOUND,
            file: None,
        };

        let target = match self.url_to_target_path(url_path) {
            Ok(Some(target)) => target,
            Ok(None) => return result,
            Err(()) => {
                result.status = StatusCode::BAD_REQUEST;
                return result;
            }
        };

        let mut location = self.locate_file(target).await;
        if location.kind == FsKind::Link {
            location = self.locate_link_target(&location.file_path).await;
        }
        if !matches!(location.kind, FsKind::File | FsKind::Dir) {
            return result;
        }

        let Some(local_path) = fs::local_path(self.root(), &location.file_path) else {
            return result;
        };
        let file = ResolvedFile {
            file_path: location.file_path,
            kind: location.kind,
            local_path,
        };

        let allowed = self.allowed_path(&file.local_path)
            && (file.kind != FsKind::Dir || self.options.dir_list);
        if allowed {
            result.status = if disk::readable(&file.file_path, file.kind).await {
                StatusCode::OK
            } else {
                StatusCode::FORBIDDEN
            };
        }
        result.file = Some(file);
        result
    }

    /// Lists a directory for the index page.
    ///
    /// Excluded entries are dropped, and links pointing inside the root get
    /// their target attached. Read errors give an empty listing.
    pub async fn index(&self, dir_path: &Path) -> Vec<DirEntry> {
        let locations = match disk::read_dir(dir_path).await {
            Ok(locations) => locations,
            Err(err) => {
                debug!("cannot list {}: {}", dir_path.display(), err);
                return Vec::new();
            }
        };

        let mut entries = Vec::with_capacity(locations.len());
        for location in locations {
            let allowed = fs::local_path(self.root(), &location.file_path)
                .map(|local| self.allowed_path(&local))
                .unwrap_or(false);
            if !allowed {
                continue;
            }

            let target = if location.kind == FsKind::Link {
                let target = self.locate_link_target(&location.file_path).await;
                matches!(target.kind, FsKind::File | FsKind::Dir).then_some(target)
            } else {
                None
            };
            entries.push(DirEntry { location, target });
        }

        entries.sort_by(|a, b| a.location.file_path.cmp(&b.location.file_path));
        entries
    }

    /// Returns `false` if some segment of `local_path` is excluded.
    pub fn allowed_path(&self, local_path: &str) -> bool {
        !self.excluded.test(local_path)
    }

    /// Joins a URL path with the root.
    ///
    /// Gives `Err` for invalid paths and `Ok(None)` for paths escaping the
    /// root.
    fn url_to_target_path(&self, url_path: &str) -> Result<Option<PathBuf>, ()> {
        if !is_valid_url_path(url_path) {
            return Err(());
        }
        let decoded = decode_url_path(url_path).ok_or(())?;
        let joined = fs::trim_slash(self.root().join(decoded.trim_start_matches('/')));
        if fs::is_within_root(self.root(), &joined) {
            Ok(Some(joined))
        } else {
            Ok(None)
        }
    }

    /// Finds the entry at `file_path`, trying index files for directories
    /// and extensions for missing paths.
    async fn locate_file(&self, file_path: PathBuf) -> FsLocation {
        let kind = disk::kind(&file_path).await;
        match kind {
            FsKind::File | FsKind::Link => FsLocation::new(file_path, kind),
            FsKind::Dir => {
                for name in &self.options.dir_file {
                    let candidate = file_path.join(name);
                    if let Some(found) = self.locate_alt_file(candidate).await {
                        return found;
                    }
                }
                FsLocation::new(file_path, FsKind::Dir)
            }
            FsKind::None => {
                for ext in &self.options.ext {
                    let mut candidate = file_path.clone().into_os_string();
                    candidate.push(ext);
                    if let Some(found) = self.locate_alt_file(candidate.into()).await {
                        return found;
                    }
                }
                FsLocation::none(file_path)
            }
        }
    }

    async fn locate_alt_file(&self, candidate: PathBuf) -> Option<FsLocation> {
        match disk::kind(&candidate).await {
            kind @ (FsKind::File | FsKind::Link) => Some(FsLocation::new(candidate, kind)),
            _ => None,
        }
    }

    /// Follows a link. Targets outside of the root count as missing.
    async fn locate_link_target(&self, link_path: &Path) -> FsLocation {
        let Some(real) = disk::real_path(link_path).await else {
            return FsLocation::none(link_path.to_path_buf());
        };
        if !fs::is_within_root(self.root(), &real) {
            debug!(
                "link {} points outside of the root, ignoring it",
                link_path.display()
            );
            return FsLocation::none(link_path.to_path_buf());
        }

        // A canonical path has no links left, so this cannot recurse.
        let target = match disk::kind(&real).await {
            FsKind::File => FsLocation::new(real, FsKind::File),
            FsKind::Dir => self.locate_real_dir(real).await,
            _ => FsLocation::none(real),
        };
        if matches!(target.kind, FsKind::File | FsKind::Dir)
            && fs::is_within_root(self.root(), &target.file_path)
        {
            target
        } else {
            FsLocation::none(link_path.to_path_buf())
        }
    }

    /// Like [`Self::locate_file`] for a directory, with link index files
    /// resolved through their canonical path.
    async fn locate_real_dir(&self, dir_path: PathBuf) -> FsLocation {
        for name in &self.options.dir_file {
            let candidate = dir_path.join(name);
            match disk::kind(&candidate).await {
                FsKind::File => return FsLocation::new(candidate, FsKind::File),
                FsKind::Link => {
                    if let Some(real) = disk::real_path(&candidate).await {
                        if disk::kind(&real).await == FsKind::File {
                            return FsLocation::new(real, FsKind::File);
                        }
                    }
                }
                _ => {}
            }
        }
        FsLocation::new(dir_path, FsKind::Dir)
    }
}
