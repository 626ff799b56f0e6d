use crate::spreadsheet::reference::area_to_reference;
use crate::spreadsheet::Sheet;

/// Inclusive rectangle of a source sheet that feeds a pivot cache.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SourceArea {
    pub first_row: usize,
    pub first_col: usize,
    pub last_row: usize,
    pub last_col: usize,
}

impl SourceArea {
    /// Spans from A1 to the last populated row, across exactly the header's
    /// populated columns. Cells right of the header are never included.
    ///
    /// Returns `None` when the sheet has no header row.
    pub fn resolve(sheet: &Sheet) -> Option<SourceArea> {
        if !sheet.has_header() {
            return None;
        }
        Some(SourceArea {
            first_row: 0,
            first_col: 0,
            last_row: sheet.last_row().unwrap_or(0),
            last_col: sheet.header_len() - 1,
        })
    }

    /// A1-style reference, e.g. `A1:E11`
    pub fn reference(&self) -> String {
        area_to_reference((self.first_row, self.first_col), (self.last_row, self.last_col))
    }

    pub fn width(&self) -> usize {
        self.last_col - self.first_col + 1
    }
}
