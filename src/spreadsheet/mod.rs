//! # Source Workbook Module
//!
//! Read-only access to the source workbook: sheet names in order and, per sheet,
//! the header row and the last populated row. Only the parts the pivot compiler
//! needs are parsed; worksheet parts are streamed, never held in memory.
pub(crate) mod cell;
pub(crate) mod excel;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod xlsx;

use crate::error::RustyPivotError;
use thiserror::Error;

pub use sheet::Sheet;
pub use xlsx::XlsxSpreadsheet;

/// Default ceiling for a single part read into memory (about 600 MB)
pub const DEFAULT_MAX_PART_SIZE: u64 = 600_000_000;

/// Errors raised while reading a source workbook.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Open file '{0}' failed: {1}")]
    FileOpenError(String, std::io::Error),

    #[error("Part '{0}' is missing from the workbook package")]
    FileError(String),

    #[error("Spreadsheet '{0}' is password protected or not an xlsx package")]
    SpreadsheetCompoundFileError(String),

    #[error("Spreadsheet '{0}' has no sheets")]
    SpreadsheetEmptyError(String),

    #[error("Sheet '{1}' not found in '{0}'")]
    SheetNotFoundError(String, String),

    #[error("Part '{0}' is {1} bytes, above the {2} byte limit")]
    PartTooLargeError(String, u64, u64),
}

/// Size limits applied when workbook parts are read into memory.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackageLimits {
    /// Largest part, in bytes, that may be buffered in memory
    pub max_part_size: u64,
}

impl Default for PackageLimits {
    fn default() -> Self {
        PackageLimits {
            max_part_size: DEFAULT_MAX_PART_SIZE,
        }
    }
}

/// Read-only view of a source workbook.
pub trait Spreadsheet {
    /// Returns the file name of this spreadsheet
    fn name(&self) -> String;

    /// Sheet names in workbook order
    fn sheet_names(&self) -> Vec<String>;

    /// Reads the header row and data extent of a sheet
    fn read_sheet(&mut self, sheet_name: &str) -> Result<Sheet, RustyPivotError>;
}
