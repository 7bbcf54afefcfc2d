use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SalesPivotError {
    #[error("Folder not found or not a directory: {}", .0.display())]
    FolderNotFound(PathBuf),

    #[error("Spreadsheet error in {file}: {source}")]
    Spreadsheet {
        file: String,
        #[source]
        source: calamine::Error,
    },

    #[error("Workbook {0} contains no sheets")]
    EmptyWorkbook(String),

    #[error("Batch load was cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SalesPivotError>;
