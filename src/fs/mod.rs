use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

pub mod disk;

/// What kind of entry lives at a path.
///
/// `Link` is only observed before following links; the resolver always
/// reports `File`, `Dir` or `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsKind {
    File,
    Dir,
    Link,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsLocation {
    pub file_path: PathBuf,
    pub kind: FsKind,
}

impl FsLocation {
    pub fn new(file_path: PathBuf, kind: FsKind) -> Self {
        Self { file_path, kind }
    }

    pub fn none(file_path: PathBuf) -> Self {
        Self::new(file_path, FsKind::None)
    }
}

/// A file or directory inside the served root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub file_path: PathBuf,
    pub kind: FsKind,
    /// Path relative to the root with the host separator. Empty for the root.
    pub local_path: String,
}

/// An entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub location: FsLocation,
    /// Where a link entry points to, if inside the root.
    pub target: Option<FsLocation>,
}

impl DirEntry {
    /// The kind to show this entry as, looking through links.
    pub fn effective_kind(&self) -> FsKind {
        match (&self.location.kind, &self.target) {
            (FsKind::Link, Some(target)) => target.kind,
            (kind, _) => *kind,
        }
    }

    pub fn name(&self) -> String {
        self.location
            .file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Returns `true` if `path` is `root` or lies below it.
pub fn is_within_root(root: &Path, path: &Path) -> bool {
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return false;
    }
    path.starts_with(root)
}

/// The path of `path` relative to `root`, or `None` when outside of it.
pub fn local_path(root: &Path, path: &Path) -> Option<String> {
    if !is_within_root(root, path) {
        return None;
    }
    let relative = path.strip_prefix(root).ok()?;
    let local = relative.to_string_lossy();
    Some(local.trim_start_matches(MAIN_SEPARATOR).to_owned())
}

/// Removes trailing separators, except for a filesystem root.
pub fn trim_slash(path: PathBuf) -> PathBuf {
    let trimmed = {
        let text = path.to_string_lossy();
        let trimmed = text.trim_end_matches(['/', MAIN_SEPARATOR]);
        (!trimmed.is_empty() && trimmed.len() != text.len()).then(|| PathBuf::from(trimmed))
    };
    trimmed.unwrap_or(path)
}
