use crate::error::RustyPivotError;
use crate::error::ResultMessage;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::excel::FileReader;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::PackageLimits;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::collections::HashSet;
use std::io::BufRead;
use zip::ZipArchive;

// XML tag names for parsing xlsx parts
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");   // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");       // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                  // Text content within strings
const TAG_SHEET: QName = QName(b"sheet");             // Worksheet definition
const TAG_ROW: QName = QName(b"row");                 // Row in worksheet
const TAG_CELL: QName = QName(b"c");                  // Cell in worksheet
const TAG_INLINE_STRING: QName = QName(b"is");        // Inline string value
const TAG_VALUE: QName = QName(b"v");                 // Cell value content

/// Represents an xlsx source workbook opened for reading
pub struct XlsxSpreadsheet {
    /// File name of the spreadsheet
    pub(crate) name: String,
    /// ZIP archive containing the package parts
    pub(crate) zip: ZipArchive<FileReader>,
    /// Size limits for parts read into memory
    pub(crate) limits: PackageLimits,
    /// List of worksheets with (name, zip_path) pairs
    sheets: Vec<(String, String)>,
}

impl XlsxSpreadsheet {
    /// Opens an xlsx workbook and parses its sheet list
    ///
    /// # Arguments
    /// * `file_name` - Path to the xlsx file
    /// * `limits` - Size limits for parts read into memory
    ///
    /// # Returns
    /// Result containing the initialized XlsxSpreadsheet or an error
    pub fn open(file_name: &str, limits: PackageLimits) -> Result<XlsxSpreadsheet, RustyPivotError> {
        let mut zip = excel::open(file_name)?;
        let sheets = load_workbook(&mut zip).with_prefix(file_name)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(file_name.to_owned()))?
        }
        Ok(XlsxSpreadsheet {
            name: file_name.to_owned(),
            zip,
            limits,
            sheets,
        })
    }

    /// Reads a whole part into memory, honouring the size limits
    pub(crate) fn read_part(&mut self, path: &str) -> Result<Option<Vec<u8>>, RustyPivotError> {
        self.zip.read_bytes(path, &self.limits)
    }

    /// Loads the shared strings with the given indexes
    ///
    /// Shared strings are stored in a separate XML part and referenced by index;
    /// only the requested entries are kept, and reading stops once all were found.
    fn load_shared_strings(&mut self, mut indexes: HashSet<usize>) -> Result<HashMap<usize, String>, RustyPivotError> {
        let mut shared_strings = HashMap::<usize, String>::new();
        if indexes.is_empty() {
            return Ok(shared_strings);
        }
        let mut reader = match self.zip.xml_reader("xl/sharedStrings.xml")? {
            Some(reader) => reader,
            None => return Ok(shared_strings),
        };

        let mut id = 0usize;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
                if indexes.remove(&id) {
                    let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
                    shared_strings.insert(id, string);
                    if indexes.is_empty() {
                        break;
                    }
                }
                id += 1;
            }
        });
        Ok(shared_strings)
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Streams the worksheet part once, keeping the cells of row 0 and
    /// the largest row index that holds a value
    fn read_sheet(&mut self, sheet_name: &str) -> Result<Sheet, RustyPivotError> {
        let zip_path = self.sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, path)| path.to_owned())
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError(self.name.to_owned(), sheet_name.to_owned()))?;

        let mut sheet = Sheet::new(&self.name, sheet_name);
        let mut header_cells = Vec::<Cell>::new();
        {
            let mut reader = self.zip.xml_reader(&zip_path)?
                .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
            let mut row_count = 0usize;
            let mut col_count = 0usize;
            let mut row = 0usize;
            let mut col = 0usize;
            let mut kind = CellType::default();
            let mut value = String::new();
            match_xml_events!(reader => {
                Event::Start(event) if event.name() == TAG_ROW => {
                    if let Some(number) = event.parse_attribute_value::<usize>("r")? {
                        row_count = number.saturating_sub(1);
                    }
                    col_count = 0;
                }
                Event::End(event) if event.name() == TAG_ROW => {
                    row_count += 1;
                }
                Event::Start(event) if event.name() == TAG_CELL => {
                    (row, col) = event.get_attribute_value("r")?
                        .and_then(|reference| reference_to_index(&reference))
                        .unwrap_or((row_count, col_count));
                    col_count = col + 1;
                    kind = CellType::parse(event.get_attribute_value("t")?.as_deref());
                    value.clear();
                }
                Event::Start(event) if event.name() == TAG_INLINE_STRING => {
                    value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
                }
                Event::Start(event) if event.name() == TAG_VALUE => {
                    value = read_string_value(&mut reader, TAG_VALUE, true)?;
                }
                Event::End(event) if event.name() == TAG_CELL => {
                    if !value.is_empty() {
                        sheet.touch_row(row);
                        if row == 0 {
                            header_cells.push(Cell { row, col, kind, value: std::mem::take(&mut value) });
                        }
                    }
                    kind = CellType::default();
                }
            });
        }

        let indexes = header_cells.iter().filter_map(Cell::shared_string_index).collect();
        let shared_strings = self.load_shared_strings(indexes)?;
        for cell in &header_cells {
            let text = cell.text(&shared_strings);
            if text.is_none() {
                log::debug!("Header cell {} of sheet '{}' has no text", cell.reference(), sheet_name);
            }
            sheet.set_header_cell(cell.col, text);
        }
        sheet.finish();
        Ok(sheet)
    }
}

/// Loads the worksheet list from the workbook part
///
/// Parses workbook.xml to extract worksheet names and their corresponding
/// part paths; chart sheets and dialog sheets have no worksheet relationship
/// and are left out.
///
/// # Returns
/// Worksheets as (name, zip_path) pairs in workbook order
fn load_workbook(zip: &mut ZipArchive<FileReader>) -> Result<Vec<(String, String)>, RustyPivotError> {
    let relationships = load_relationships(zip, excel::WORKBOOK_RELS_PATH)?;
    let mut reader = zip.xml_reader(excel::WORKBOOK_PATH)?
        .ok_or_else(|| SpreadsheetError::FileError(excel::WORKBOOK_PATH.to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
    });
    Ok(sheets)
}

/// Reads string value from XML content, handling text and CDATA sections
///
/// Extracts string content from XML elements, skipping phonetic text annotations.
///
/// # Arguments
/// * `reader` - XML reader positioned at the start of the string content
/// * `end_tag` - XML tag that marks the end of the string content
/// * `is_text_content` - Whether to treat the content as text by default
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, RustyPivotError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_bytes_text(&event)?,
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_string_value_skips_phonetic_runs() -> Result<(), RustyPivotError> {
        let xml = "<si><r><t>Camp</t></r><r><t xml:space=\"preserve\"> Name</t></r><rPh><t>kana</t></rPh></si>";
        let mut reader = XmlReader::new(xml.as_bytes());
        reader.next()?;
        let text = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
        assert_eq!(text, "Camp Name");
        Ok(())
    }
}
