use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Metadata,
    Chapters,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("{0}")]
    Metadata(String),
    #[error("{0}")]
    Chapters(String),
}

impl FetchError {
    pub fn new(source: FetchSource, err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");
        match source {
            FetchSource::Metadata => FetchError::Metadata(message),
            FetchSource::Chapters => FetchError::Chapters(message),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to delete chapters: {message}")]
pub struct DeleteError {
    pub message: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MergeError {
    /// The owning screen was cancelled while the merge ran. The merge itself
    /// completed; callers must propagate this rather than report it.
    #[error("merge cancelled")]
    Cancelled,
    #[error("Failed to merge item: {0}")]
    Failed(String),
}
