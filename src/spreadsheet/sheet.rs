/// A source worksheet as the pivot compiler sees it: its header row and data extent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sheet {
    /// Source file name
    pub(crate) file_name: String,
    /// Sheet name
    pub(crate) name: String,
    /// Textual values of row 0, indexed by column; `None` marks a blank cell.
    /// The length is the header's populated cell count (last cell index + 1).
    pub(crate) header: Vec<Option<String>>,
    /// Largest row index holding a cell with a value
    pub(crate) last_row: Option<usize>,
}

impl Sheet {
    pub fn new(file_name: &str, name: &str) -> Self {
        Sheet {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            ..Default::default()
        }
    }

    /// Builds a sheet from literal header text, for callers that already hold the data.
    pub fn with_header<S: AsRef<str>>(name: &str, header: &[S], last_row: usize) -> Self {
        Sheet {
            file_name: String::new(),
            name: name.to_owned(),
            header: header
                .iter()
                .map(|text| Some(text.as_ref().to_owned()).filter(|text| !text.is_empty()))
                .collect(),
            last_row: Some(last_row),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File the sheet was read from, empty for sheets built in memory
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Header cells of row 0; blank cells are `None`
    pub fn header(&self) -> &[Option<String>] {
        &self.header
    }

    /// Number of header cells up to and including the last populated one
    pub fn header_len(&self) -> usize {
        self.header.len()
    }

    pub fn last_row(&self) -> Option<usize> {
        self.last_row
    }

    /// Whether row 0 exists and holds at least one non-blank cell
    pub fn has_header(&self) -> bool {
        self.header.iter().any(Option::is_some)
    }

    /// Records a header cell, growing the row with blanks as needed
    pub(crate) fn set_header_cell(&mut self, col: usize, text: Option<String>) {
        if self.header.len() <= col {
            self.header.resize(col + 1, None);
        }
        self.header[col] = text;
    }

    /// Records that `row` holds a value
    pub(crate) fn touch_row(&mut self, row: usize) {
        self.last_row = Some(self.last_row.map_or(row, |last| last.max(row)));
    }

    /// Drops trailing blank header cells so the length reflects populated cells only
    pub(crate) fn finish(&mut self) {
        while matches!(self.header.last(), Some(None)) {
            self.header.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_cells_and_rows() {
        let mut sheet = Sheet::new("data.xlsx", "house_data");
        assert!(!sheet.has_header());
        sheet.set_header_cell(2, Some("Date".to_owned()));
        sheet.set_header_cell(4, None);
        sheet.touch_row(0);
        sheet.touch_row(7);
        sheet.touch_row(3);
        sheet.finish();
        assert_eq!(sheet.header(), &[None, None, Some("Date".to_owned())]);
        assert_eq!(sheet.header_len(), 3);
        assert_eq!(sheet.last_row(), Some(7));
        assert!(sheet.has_header());
    }

    #[test]
    fn test_with_header_marks_blanks() {
        let sheet = Sheet::with_header("s", &["Unit", "", "Date"], 4);
        assert_eq!(sheet.header()[1], None);
        assert_eq!(sheet.header_len(), 3);
    }
}
