use serde_json::Error as SerdeJsonError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Channel send error")]
    SendError,

    #[error("Root directory does not exist: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("Failed to parse descriptor {}: {source}", .path.display())]
    DescriptorParse {
        path: PathBuf,
        #[source]
        source: SerdeJsonError,
    },

    #[error("Failed to remove {}: {source}", .path.display())]
    Deletion {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported media format: {}", .0.display())]
    Unsupported(PathBuf),

    #[error("No capture timestamp in descriptor or directory for {}", .0.display())]
    MissingTimestamp(PathBuf),

    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    #[error("Generic error: {0}")]
    Generic(String),
}

impl<T> From<crossbeam_channel::SendError<T>> for AppError {
    fn from(_: crossbeam_channel::SendError<T>) -> Self {
        AppError::SendError
    }
}
