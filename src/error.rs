use thiserror::Error;

/// Main error type of the pivot compiler.
/// Aggregates errors from the standard library, dependencies, and internal modules.
/// Every variant is fatal to a run; recoverable conditions are logged instead.
#[derive(Error, Debug)]
pub enum RustyPivotError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    PersistError(#[from] tempfile::PersistError),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    // Destination workbook errors
    #[error("{0}")]
    WorkbookError(#[from] crate::workbook::WorkbookError),

    // Pivot configuration errors
    #[error("{0}")]
    ConfigError(#[from] crate::pivot::ConfigError),
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, RustyPivotError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| RustyPivotError::WithContextError(format!("{}: {}", message, e)))
    }
}
