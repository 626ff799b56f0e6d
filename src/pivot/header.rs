use crate::spreadsheet::Sheet;
use std::collections::HashMap;

/// Case-insensitive lookup from header text to zero-based column index.
///
/// Blank header cells are skipped and the leftmost occurrence of a name wins.
#[derive(Clone, Debug, Default)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn build(sheet: &Sheet) -> Self {
        let mut positions = HashMap::new();
        for (col, text) in sheet.header().iter().enumerate() {
            let Some(text) = text else { continue };
            let key = text.to_lowercase();
            if let Some(first) = positions.get(&key) {
                log::debug!(
                    "Sheet '{}' repeats header '{}' at column {}; column {} is used",
                    sheet.name(),
                    text,
                    col,
                    first
                );
            } else {
                positions.insert(key, col);
            }
        }
        HeaderIndex { positions }
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.positions.get(&name.to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let sheet = Sheet::with_header("house_data", &["UNIT", "Camp Name"], 3);
        let index = HeaderIndex::build(&sheet);
        assert_eq!(index.lookup("Unit"), Some(0));
        assert_eq!(index.lookup("camp name"), Some(1));
        assert_eq!(index.lookup("Date"), None);
    }

    #[test]
    fn test_leftmost_wins_and_blanks_skipped() {
        let sheet = Sheet::with_header("house_data", &["Unit", "", "unit", "Date"], 3);
        let index = HeaderIndex::build(&sheet);
        assert_eq!(index.lookup("UNIT"), Some(0));
        assert_eq!(index.lookup(""), None);
        assert_eq!(index.lookup("date"), Some(3));
        assert_eq!(index.len(), 2);
    }
}
