use std::path::Path;

use http::StatusCode;
use tokio::fs::File;
use tracing::debug;

use crate::content_type::{self, TypeResult};
use crate::fs::disk;

/// A file ready to be streamed.
#[derive(Debug)]
pub(crate) struct FileOpened {
    pub(crate) file: File,
    pub(crate) len: u64,
    pub(crate) content_type: TypeResult,
}

pub(crate) enum OpenOutcome {
    Opened(Box<FileOpened>),
    /// Opening or inspecting the file failed; respond with this status.
    Failed(StatusCode, String),
}

/// Opens a resolved file, reads its size and classifies its content.
///
/// The handle is dropped again on every failure.
pub(crate) async fn open_file(path: &Path) -> OpenOutcome {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(err) => {
            debug!("cannot open {}: {}", path.display(), err);
            let status = if disk::is_busy(&err) {
                StatusCode::FORBIDDEN
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            return OpenOutcome::Failed(status, err.to_string());
        }
    };

    let len = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(err) => {
            return OpenOutcome::Failed(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };

    let content_type = content_type::classify(path, Some(&mut file)).await;

    OpenOutcome::Opened(Box::new(FileOpened {
        file,
        len,
        content_type,
    }))
}
