use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read archive {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("unknown archive \"{name}\"")]
    UnknownArchive { name: String },

    #[error("\"{path}\" not found in archive \"{archive}\"")]
    EntryNotFound { archive: String, path: String },

    #[error("invalid resource url \"{url}\"")]
    InvalidUrl { url: String },

    #[error("invalid class file for {name}: {reason}")]
    ClassFormat { name: String, reason: String },

    #[error("class not found: {name}")]
    ClassNotFound { name: String },

    #[error("resource stream was closed")]
    StreamClosed,
}

impl ArchiveError {
    pub fn is_class_not_found(&self) -> bool {
        matches!(self, ArchiveError::ClassNotFound { .. })
    }
}
