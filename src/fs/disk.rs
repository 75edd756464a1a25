use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::fs::{FsKind, FsLocation};

fn kind_of(file_type: std::fs::FileType) -> FsKind {
    if file_type.is_symlink() {
        FsKind::Link
    } else if file_type.is_dir() {
        FsKind::Dir
    } else if file_type.is_file() {
        FsKind::File
    } else {
        FsKind::None
    }
}

/// The kind of entry at `path`, without following links.
pub async fn kind(path: &Path) -> FsKind {
    match fs::symlink_metadata(path).await {
        Ok(meta) => kind_of(meta.file_type()),
        Err(_) => FsKind::None,
    }
}

/// The canonical path of `path`, with all links followed.
pub async fn real_path(path: &Path) -> Option<PathBuf> {
    fs::canonicalize(path).await.ok()
}

/// Checks that the current process may read `path`, and also list it if it
/// is a directory.
#[cfg(unix)]
pub async fn readable(path: &Path, kind: FsKind) -> bool {
    use nix::unistd::{access, AccessFlags};

    let mode = match kind {
        FsKind::Dir => AccessFlags::R_OK | AccessFlags::X_OK,
        _ => AccessFlags::R_OK,
    };
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || access(&path, mode).is_ok())
        .await
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub async fn readable(path: &Path, kind: FsKind) -> bool {
    match kind {
        FsKind::Dir => fs::read_dir(path).await.is_ok(),
        _ => fs::File::open(path).await.is_ok(),
    }
}

/// Lists the entries of a directory. Entries of other kinds than files,
/// directories and links are left out.
pub async fn read_dir(path: &Path) -> io::Result<Vec<FsLocation>> {
    let mut entries = Vec::new();
    let mut dir = fs::read_dir(path).await?;
    while let Some(entry) = dir.next_entry().await? {
        let kind = match entry.file_type().await {
            Ok(file_type) => kind_of(file_type),
            Err(_) => continue,
        };
        if kind != FsKind::None {
            entries.push(FsLocation::new(entry.path(), kind));
        }
    }
    Ok(entries)
}

/// Returns `true` if the error means the file is locked by someone else.
pub fn is_busy(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(nix::errno::Errno::EBUSY as i32)
    }
    #[cfg(windows)]
    {
        // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
        matches!(err.raw_os_error(), Some(32) | Some(33))
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = err;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn kinds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        assert_eq!(kind(&dir.path().join("file.txt")).await, FsKind::File);
        assert_eq!(kind(&dir.path().join("sub")).await, FsKind::Dir);
        assert_eq!(kind(&dir.path().join("missing")).await, FsKind::None);

        #[cfg(unix)]
        {
            std::os::unix::fs::symlink("file.txt", dir.path().join("link")).unwrap();
            assert_eq!(kind(&dir.path().join("link")).await, FsKind::Link);
        }
    }

    #[tokio::test]
    async fn listing_skips_nothing_regular() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), "x").unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();

        let mut entries = read_dir(dir.path()).await.unwrap();
        entries.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        let kinds: Vec<_> = entries.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, [FsKind::File, FsKind::Dir]);

        assert!(read_dir(&dir.path().join("missing")).await.is_err());
    }

    #[tokio::test]
    async fn readable_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), "x").unwrap();
        assert!(readable(&dir.path().join("a"), FsKind::File).await);
        assert!(readable(dir.path(), FsKind::Dir).await);
        assert!(!readable(&dir.path().join("missing"), FsKind::File).await);
    }
}
