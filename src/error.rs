use thiserror::Error;

#[derive(Error, Debug)]
pub enum CashbookError {
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Invalid {kind} record #{index}: {details}")]
    InvalidRecord {
        kind: &'static str,
        index: usize,
        details: String,
    },

    #[error("Invalid classification rules: {0}")]
    InvalidRules(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "gemini")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[cfg(feature = "gemini")]
    #[error("JSON patch error: {0}")]
    PatchError(#[from] json_patch::PatchError),
}

pub type Result<T> = std::result::Result<T, CashbookError>;
