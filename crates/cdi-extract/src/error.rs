use thiserror::Error;

/// Errors produced while reading a CD-i track image.
///
/// `PathNotFound` from the design notes is deliberately not a variant here:
/// path lookups return `Option`/`bool` rather than an error, matching how
/// the rest of the crate treats "absent" as a normal outcome rather than a
/// failure.
#[derive(Debug, Error)]
pub enum CdiError {
    #[error("no sector sync pattern found in track image")]
    NotFound,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt track image: {0}")]
    Corruption(String),
}

pub type Result<T> = std::result::Result<T, CdiError>;
