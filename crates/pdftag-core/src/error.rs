use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfTagError {
    #[error("Invalid password")]
    InvalidPassword,

    #[error("Malformed PDF: {0}")]
    MalformedPdf(String),

    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid encryption settings: {0}")]
    InvalidEncryptionSettings(String),

    #[error("No StructTreeRoot found")]
    MissingStructTree,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PdfTagError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PdfTagError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PdfTagError>;
