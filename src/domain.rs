use polars::error::PolarsError;
use std::io::Error;
use thiserror::Error;

// Crate wide error type. Validation, empty dataset and missing dataset errors are
// recoverable: the session stays usable and the caller may load another table.
#[derive(Debug, Error)]
pub enum LensError {
    #[error("I/O error: {0}")]
    IoError(#[from] Error),
    #[error("Failed to read table: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Loading failed: {0}")]
    LoadingFailed(String),
    #[error("File not found")]
    FileNotFound,
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Unknown file type, expected a .csv file")]
    UnknownFileType,
    #[error("Serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Column '{0}' not found in the uploaded table")]
    MissingColumn(String),
    #[error("No rows with a valid rating and review count to analyze")]
    EmptyDataset,
    #[error("No dataset loaded, load a table first")]
    NoActiveDataset,
    #[error("Invalid page request: {0}")]
    InvalidPage(String),
    #[error("Error while analyzing data: {0}")]
    Aggregation(String),
}

impl LensError {
    /// True for errors that leave the session usable and only need a new upload.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LensError::MissingColumn(_)
                | LensError::EmptyDataset
                | LensError::NoActiveDataset
                | LensError::InvalidPage(_)
        )
    }
}

impl From<toml::de::Error> for LensError {
    fn from(err: toml::de::Error) -> Self {
        LensError::Config(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Quit,
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    Export,
    Close,
    Help,
    Exit,
    Resize(usize, usize),
}

pub const HELP_TEXT: &str = "\
n / → / PageDown   next page
p / ← / PageUp     previous page
g / Home           first page
G / End            last page
e                  export report
c                  close dataset
?                  toggle help
q                  quit";
