//! Error handling for the CV screener

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a whole screening run.
#[derive(Error, Debug)]
pub enum ScreenerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No valid documents found in {0}")]
    NoDocuments(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("LLM provider error: {0}")]
    Llm(#[from] LlmError),
}

pub type Result<T> = std::result::Result<T, ScreenerError>;

/// Failure to turn one document into text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("corrupt or unreadable document '{}': {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("unsupported file type '{extension}' for '{}'", path.display())]
    UnsupportedType { path: PathBuf, extension: String },
}

impl ExtractionError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ExtractionError::Corrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, ExtractionError::Corrupt { .. })
    }
}

/// OCR failures never fail a document; the recognized text just stays empty.
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("page rendering failed: {0}")]
    Render(String),

    #[error("text recognition failed: {0}")]
    Recognize(String),

    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the structured extraction call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Transport(err.to_string())
    }
}

/// Disk write failures while emitting artifacts.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("failed to write '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write spreadsheet '{}': {reason}", path.display())]
    Spreadsheet { path: PathBuf, reason: String },

    #[error("failed to write archive '{}': {reason}", path.display())]
    Zip { path: PathBuf, reason: String },
}
