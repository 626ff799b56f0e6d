use crate::spreadsheet::reference::index_to_reference;
use std::collections::HashMap;

/// Types of cell data in worksheet parts.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values stored as 0/1
    Boolean,
    /// Numeric values, including dates stored as serial numbers
    Number,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// Inline and formula string values
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error values
    Error,
}

impl CellType {
    /// Maps the `t` attribute of a `<c>` element to a cell type.
    pub(crate) fn parse(kind: Option<&str>) -> Self {
        match kind {
            Some("inlineStr") | Some("str") => Self::InlineString,
            Some("s") => Self::SharedString,
            Some("d") => Self::IsoDateTime,
            Some("b") => Self::Boolean,
            Some("e") => Self::Error,
            _ => Self::Number,
        }
    }
}

/// Represents a single cell with position, type, and raw stored value.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    /// Cell data type
    pub(crate) kind: CellType,
    /// Cell value as stored in the part
    pub(crate) value: String,
}

impl Cell {
    /// Returns the A1-style reference of the cell (e.g., "A1", "B2").
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Shared string index referenced by this cell, if it is a shared string cell.
    pub(crate) fn shared_string_index(&self) -> Option<usize> {
        match self.kind {
            CellType::SharedString => self.value.trim().parse().ok(),
            _ => None,
        }
    }

    /// Textual value of the cell, read verbatim.
    ///
    /// Errors and empty cells have no text; booleans render as `TRUE`/`FALSE`.
    pub(crate) fn text(&self, shared_strings: &HashMap<usize, String>) -> Option<String> {
        match self.kind {
            CellType::Empty | CellType::Error => None,
            CellType::Boolean => Some(if self.value == "1" { "TRUE" } else { "FALSE" }.to_owned()),
            CellType::SharedString => self
                .shared_string_index()
                .and_then(|index| shared_strings.get(&index))
                .cloned(),
            CellType::Number | CellType::IsoDateTime | CellType::InlineString => Some(self.value.to_owned()),
        }
        .filter(|text| !text.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(kind: CellType, value: &str) -> Cell {
        Cell { row: 0, col: 2, kind, value: value.to_owned() }
    }

    #[test]
    fn test_cell_text() {
        let shared = HashMap::from([(3usize, "House Id".to_owned())]);
        assert_eq!(cell(CellType::SharedString, "3").text(&shared).as_deref(), Some("House Id"));
        assert_eq!(cell(CellType::SharedString, "4").text(&shared), None);
        assert_eq!(cell(CellType::Number, "2024").text(&shared).as_deref(), Some("2024"));
        assert_eq!(cell(CellType::Boolean, "1").text(&shared).as_deref(), Some("TRUE"));
        assert_eq!(cell(CellType::Error, "#REF!").text(&shared), None);
        assert_eq!(cell(CellType::InlineString, "").text(&shared), None);
        assert_eq!(cell(CellType::Number, "1").reference(), "C1");
    }

    #[test]
    fn test_parse_cell_type() {
        assert_eq!(CellType::parse(Some("s")), CellType::SharedString);
        assert_eq!(CellType::parse(Some("str")), CellType::InlineString);
        assert_eq!(CellType::parse(None), CellType::Number);
    }
}
