//! # Destination Workbook Module
//!
//! The destination starts as the source package. New sheets and their pivot
//! tables are kept in memory and written on [`PivotWorkbook::save`], which copies
//! every source part verbatim and patches only the package-level parts that
//! list sheets, pivot caches, relationships and content types.
pub(crate) mod package;
pub(crate) mod parts;
pub(crate) mod pivot;

use crate::error::ResultMessage;
use crate::error::RustyPivotError;
use crate::pivot::SourceArea;
use crate::spreadsheet::excel;
use crate::spreadsheet::Sheet;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::XlsxSpreadsheet;
use package::CacheEntry;
use package::IdAllocator;
use package::SheetEntry;
use parts::PartLink;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

pub use pivot::Aggregation;
pub use pivot::Axis;
pub use pivot::DataField;
pub use pivot::FieldChange;
pub use pivot::PivotTable;

/// Longest sheet name spreadsheet applications accept
const MAX_SHEET_NAME_LENGTH: usize = 31;
const FORBIDDEN_SHEET_NAME_CHARACTERS: [char; 7] = [':', '\\', '/', '?', '*', '[', ']'];

/// Errors raised by the destination workbook.
#[derive(Error, Debug)]
pub enum WorkbookError {
    #[error("Sheet '{0}' already exists")]
    DuplicateSheetError(String),

    #[error("Sheet name '{0}' {1}")]
    InvalidSheetNameError(String, &'static str),

    #[error("Sheet #{0} was not created by this workbook")]
    UnknownSheetError(usize),

    #[error("Column {1} is outside the source area of '{0}' (last column {2})")]
    ColumnOutOfRangeError(String, usize, usize),

    #[error("Source sheet '{0}' has no header row")]
    MissingHeaderError(String),
}

/// Handle to a sheet created in the destination workbook
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SheetId(usize);

/// A sheet added to the package
#[derive(Clone, Debug)]
pub(crate) struct NewSheet {
    pub(crate) entry: SheetEntry,
    pub(crate) part: u32,
    pub(crate) widths: BTreeMap<usize, f64>,
    /// Indexes into `PivotWorkbook::pivots`
    pub(crate) pivots: Vec<usize>,
}

/// A pivot table with the parts it is written to
#[derive(Clone, Debug)]
pub(crate) struct NewPivot {
    pub(crate) table: PivotTable,
    pub(crate) table_part: u32,
    pub(crate) cache_part: u32,
    pub(crate) cache: CacheEntry,
}

/// Destination workbook: the source package plus pivot sheets.
pub struct PivotWorkbook {
    source_file: String,
    workbook_xml: Vec<u8>,
    workbook_rels: Vec<u8>,
    content_types: Vec<u8>,
    /// Every sheet name, source sheets first
    sheet_names: Vec<String>,
    ids: IdAllocator,
    pub(crate) sheets: Vec<NewSheet>,
    pub(crate) pivots: Vec<NewPivot>,
}

impl PivotWorkbook {
    /// Starts a destination workbook from an opened source workbook
    pub fn from_source(source: &mut XlsxSpreadsheet) -> Result<PivotWorkbook, RustyPivotError> {
        let mut read = |path: &str| -> Result<Vec<u8>, RustyPivotError> {
            source.read_part(path)?
                .ok_or_else(|| SpreadsheetError::FileError(path.to_owned()).into())
        };
        let workbook_xml = read(excel::WORKBOOK_PATH)?;
        let workbook_rels = read(excel::WORKBOOK_RELS_PATH)?;
        let content_types = read(excel::CONTENT_TYPES_PATH)?;
        let part_names: Vec<String> = source.zip.file_names().map(str::to_owned).collect();
        PivotWorkbook::from_parts(&source.name, workbook_xml, workbook_rels, content_types, part_names)
            .with_prefix(&source.name)
    }

    pub(crate) fn from_parts(
        source_file: &str,
        workbook_xml: Vec<u8>,
        workbook_rels: Vec<u8>,
        content_types: Vec<u8>,
        part_names: Vec<String>,
    ) -> Result<PivotWorkbook, RustyPivotError> {
        let scan = package::scan_workbook(&workbook_xml)?;
        let relationship_ids = package::relationship_ids(&workbook_rels)?;
        Ok(PivotWorkbook {
            source_file: source_file.to_owned(),
            ids: IdAllocator::new(&scan, relationship_ids, part_names),
            sheet_names: scan.sheet_names,
            workbook_xml,
            workbook_rels,
            content_types,
            sheets: Vec::new(),
            pivots: Vec::new(),
        })
    }

    /// Whether a sheet of that name exists, compared case-insensitively
    pub fn contains_sheet(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.sheet_names.iter().any(|sheet| sheet.to_lowercase() == name)
    }

    /// Every sheet name, source sheets first
    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    /// Names of the sheets this workbook added
    pub fn new_sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|sheet| sheet.entry.name.as_str()).collect()
    }

    /// Checks that `name` can be given to a new sheet
    pub fn check_sheet_name(&self, name: &str) -> Result<(), WorkbookError> {
        let invalid = |reason| Err(WorkbookError::InvalidSheetNameError(name.to_owned(), reason));
        if self.contains_sheet(name) {
            return Err(WorkbookError::DuplicateSheetError(name.to_owned()));
        }
        if name.trim().is_empty() {
            return invalid("is blank");
        }
        if name.chars().count() > MAX_SHEET_NAME_LENGTH {
            return invalid("is longer than 31 characters");
        }
        if name.contains(FORBIDDEN_SHEET_NAME_CHARACTERS) {
            return invalid("contains one of : \\ / ? * [ ]");
        }
        if name.starts_with('\'') || name.ends_with('\'') {
            return invalid("starts or ends with an apostrophe");
        }
        Ok(())
    }

    /// Appends an empty worksheet
    pub fn create_sheet(&mut self, name: &str) -> Result<SheetId, WorkbookError> {
        self.check_sheet_name(name)?;
        let part = self.ids.part_number(&[
            ("xl/worksheets/sheet", ".xml"),
            ("xl/worksheets/_rels/sheet", ".xml.rels"),
        ]);
        let entry = SheetEntry {
            name: name.to_owned(),
            sheet_id: self.ids.sheet_id(),
            relationship_id: self.ids.relationship_id(),
        };
        log::debug!("Sheet '{}' becomes xl/worksheets/sheet{}.xml ({})", name, part, entry.relationship_id);
        self.sheet_names.push(name.to_owned());
        self.sheets.push(NewSheet {
            entry,
            part,
            widths: BTreeMap::new(),
            pivots: Vec::new(),
        });
        Ok(SheetId(self.sheets.len() - 1))
    }

    /// Sets the width, in characters, of a zero-based column
    pub fn set_column_width(&mut self, sheet: SheetId, col: usize, width: f64) -> Result<(), WorkbookError> {
        let sheet = self.sheets.get_mut(sheet.0).ok_or(WorkbookError::UnknownSheetError(sheet.0))?;
        sheet.widths.insert(col, width);
        Ok(())
    }

    /// Places a pivot table over `area` of `source` with its top-left cell at `anchor`
    pub fn create_pivot_table(
        &mut self,
        sheet: SheetId,
        source: &Sheet,
        area: SourceArea,
        anchor: (usize, usize),
    ) -> Result<&mut PivotTable, WorkbookError> {
        if !source.has_header() {
            return Err(WorkbookError::MissingHeaderError(source.name().to_owned()));
        }
        let owner = self.sheets.get(sheet.0).ok_or(WorkbookError::UnknownSheetError(sheet.0))?;
        let name = format!("PivotTable{}", owner.pivots.len() + 1);
        let table_part = self.ids.part_number(&[
            ("xl/pivotTables/pivotTable", ".xml"),
            ("xl/pivotTables/_rels/pivotTable", ".xml.rels"),
        ]);
        let cache_part = self.ids.part_number(&[
            ("xl/pivotCache/pivotCacheDefinition", ".xml"),
            ("xl/pivotCache/_rels/pivotCacheDefinition", ".xml.rels"),
            ("xl/pivotCache/pivotCacheRecords", ".xml"),
        ]);
        let cache = CacheEntry {
            cache_id: self.ids.cache_id(),
            relationship_id: self.ids.relationship_id(),
        };
        let table = PivotTable::new(name, cache.cache_id, source.name(), area, anchor, source.header());

        let index = self.pivots.len();
        self.sheets[sheet.0].pivots.push(index);
        self.pivots.push(NewPivot {
            table,
            table_part,
            cache_part,
            cache,
        });
        Ok(&mut self.pivots[index].table)
    }

    /// Writes the package to `path`.
    ///
    /// The package is assembled in a temporary file next to `path` and moved into
    /// place once complete, so a failed save leaves no output behind.
    pub fn save(&self, path: &str) -> Result<(), RustyPivotError> {
        let directory = Path::new(path)
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let file = NamedTempFile::new_in(directory)?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut patched = self.patched_parts()?;
        let mut source = excel::open(&self.source_file)?;
        for index in 0..source.len() {
            let part = source.by_index_raw(index)?;
            let name = part.name().to_owned();
            match patched.iter().position(|(patched_name, _)| patched_name.eq_ignore_ascii_case(&name)) {
                Some(position) => {
                    drop(part);
                    let (_, bytes) = patched.swap_remove(position);
                    zip.start_file(name, options)?;
                    zip.write_all(&bytes)?;
                }
                None => zip.raw_copy_file(part)?,
            }
        }
        for (name, bytes) in self.new_parts()? {
            zip.start_file(name, options)?;
            zip.write_all(&bytes)?;
        }

        let file = zip.finish()?;
        file.as_file().sync_all()?;
        file.persist(path)?;
        log::debug!("Wrote {} new sheet(s) and {} pivot table(s) to '{}'", self.sheets.len(), self.pivots.len(), path);
        Ok(())
    }

    /// Package-level parts with the new entries added
    fn patched_parts(&self) -> Result<Vec<(&'static str, Vec<u8>)>, RustyPivotError> {
        let sheets: Vec<SheetEntry> = self.sheets.iter().map(|sheet| sheet.entry.clone()).collect();
        let caches: Vec<CacheEntry> = self.pivots.iter().map(|pivot| pivot.cache.clone()).collect();

        let mut links = Vec::new();
        let mut overrides = Vec::new();
        for sheet in &self.sheets {
            links.push(PartLink {
                id: sheet.entry.relationship_id.to_owned(),
                kind: parts::WORKSHEET_TYPE,
                target: format!("worksheets/sheet{}.xml", sheet.part),
            });
            overrides.push((format!("/xl/worksheets/sheet{}.xml", sheet.part), parts::WORKSHEET_CONTENT_TYPE));
        }
        for pivot in &self.pivots {
            links.push(PartLink {
                id: pivot.cache.relationship_id.to_owned(),
                kind: parts::PIVOT_CACHE_DEFINITION_TYPE,
                target: format!("pivotCache/pivotCacheDefinition{}.xml", pivot.cache_part),
            });
            overrides.push((format!("/xl/pivotTables/pivotTable{}.xml", pivot.table_part), parts::PIVOT_TABLE_CONTENT_TYPE));
            overrides.push((
                format!("/xl/pivotCache/pivotCacheDefinition{}.xml", pivot.cache_part),
                parts::PIVOT_CACHE_DEFINITION_CONTENT_TYPE,
            ));
            overrides.push((
                format!("/xl/pivotCache/pivotCacheRecords{}.xml", pivot.cache_part),
                parts::PIVOT_CACHE_RECORDS_CONTENT_TYPE,
            ));
        }

        Ok(vec![
            (excel::WORKBOOK_PATH, package::patch_workbook(&self.workbook_xml, &sheets, &caches).with_prefix(excel::WORKBOOK_PATH)?),
            (excel::WORKBOOK_RELS_PATH, package::patch_relationships(&self.workbook_rels, &links).with_prefix(excel::WORKBOOK_RELS_PATH)?),
            (excel::CONTENT_TYPES_PATH, package::patch_content_types(&self.content_types, &overrides).with_prefix(excel::CONTENT_TYPES_PATH)?),
        ])
    }

    /// Parts that do not exist in the source package, by zip path
    fn new_parts(&self) -> Result<Vec<(String, Vec<u8>)>, RustyPivotError> {
        let mut new_parts = Vec::new();
        for sheet in &self.sheets {
            new_parts.push((format!("xl/worksheets/sheet{}.xml", sheet.part), parts::worksheet(&sheet.widths)?));
            let links: Vec<PartLink> = sheet
                .pivots
                .iter()
                .filter_map(|&index| self.pivots.get(index))
                .enumerate()
                .map(|(number, pivot)| PartLink {
                    id: format!("rId{}", number + 1),
                    kind: parts::PIVOT_TABLE_TYPE,
                    target: format!("../pivotTables/pivotTable{}.xml", pivot.table_part),
                })
                .collect();
            if !links.is_empty() {
                new_parts.push((format!("xl/worksheets/_rels/sheet{}.xml.rels", sheet.part), parts::relationships(&links)?));
            }
        }
        for pivot in &self.pivots {
            let (table, cache) = (pivot.table_part, pivot.cache_part);
            new_parts.push((format!("xl/pivotTables/pivotTable{table}.xml"), parts::pivot_table_definition(&pivot.table)?));
            let table_links = [PartLink {
                id: "rId1".to_owned(),
                kind: parts::PIVOT_CACHE_DEFINITION_TYPE,
                target: format!("../pivotCache/pivotCacheDefinition{cache}.xml"),
            }];
            new_parts.push((format!("xl/pivotTables/_rels/pivotTable{table}.xml.rels"), parts::relationships(&table_links)?));
            new_parts.push((format!("xl/pivotCache/pivotCacheDefinition{cache}.xml"), parts::pivot_cache_definition(&pivot.table, "rId1")?));
            let cache_links = [PartLink {
                id: "rId1".to_owned(),
                kind: parts::PIVOT_CACHE_RECORDS_TYPE,
                target: format!("pivotCacheRecords{cache}.xml"),
            }];
            new_parts.push((format!("xl/pivotCache/_rels/pivotCacheDefinition{cache}.xml.rels"), parts::relationships(&cache_links)?));
            new_parts.push((format!("xl/pivotCache/pivotCacheRecords{cache}.xml"), parts::pivot_cache_records()?));
        }
        Ok(new_parts)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const WORKBOOK: &str = r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="house_data" sheetId="1" r:id="rId1"/></sheets></workbook>"#;
    const RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;
    const TYPES: &str = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#;

    /// Destination workbook over a package holding only `house_data`
    pub(crate) fn empty_workbook() -> PivotWorkbook {
        let part_names = vec!["xl/workbook.xml".to_owned(), "xl/worksheets/sheet1.xml".to_owned()];
        PivotWorkbook::from_parts("memory.xlsx", WORKBOOK.into(), RELS.into(), TYPES.into(), part_names).unwrap()
    }

    #[test]
    fn test_sheet_names_are_checked() {
        let mut workbook = empty_workbook();
        assert!(workbook.contains_sheet("HOUSE_DATA"));
        assert!(matches!(workbook.create_sheet("House_Data"), Err(WorkbookError::DuplicateSheetError(_))));
        assert!(matches!(workbook.check_sheet_name("a*b"), Err(WorkbookError::InvalidSheetNameError(_, _))));
        assert!(matches!(workbook.check_sheet_name("'quoted'"), Err(WorkbookError::InvalidSheetNameError(_, _))));
        assert!(matches!(workbook.check_sheet_name(&"x".repeat(32)), Err(WorkbookError::InvalidSheetNameError(_, _))));
        assert!(workbook.check_sheet_name(&"x".repeat(31)).is_ok());
        workbook.create_sheet("summary").unwrap();
        assert!(matches!(workbook.create_sheet("Summary"), Err(WorkbookError::DuplicateSheetError(_))));
        assert_eq!(workbook.sheet_names(), &["house_data", "summary"]);
    }

    #[test]
    fn test_new_parts_are_numbered_after_source_parts() {
        let mut workbook = empty_workbook();
        let sheet = workbook.create_sheet("summary").unwrap();
        workbook.set_column_width(sheet, 0, 15.0).unwrap();
        let source = Sheet::with_header("house_data", &["Unit", "House Id"], 4);
        let area = SourceArea::resolve(&source).unwrap();
        let pivot = workbook.create_pivot_table(sheet, &source, area, (4, 0)).unwrap();
        pivot.add_row_label(0).unwrap();
        assert_eq!(pivot.name(), "PivotTable1");

        assert_eq!(workbook.sheets[0].entry, SheetEntry { name: "summary".to_owned(), sheet_id: 2, relationship_id: "rId2".to_owned() });
        assert_eq!(workbook.sheets[0].part, 2);
        assert_eq!(workbook.pivots[0].cache, CacheEntry { cache_id: 1, relationship_id: "rId3".to_owned() });

        let names: Vec<String> = workbook.new_parts().unwrap().into_iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec![
                "xl/worksheets/sheet2.xml",
                "xl/worksheets/_rels/sheet2.xml.rels",
                "xl/pivotTables/pivotTable1.xml",
                "xl/pivotTables/_rels/pivotTable1.xml.rels",
                "xl/pivotCache/pivotCacheDefinition1.xml",
                "xl/pivotCache/_rels/pivotCacheDefinition1.xml.rels",
                "xl/pivotCache/pivotCacheRecords1.xml",
            ]
        );
    }

    #[test]
    fn test_patched_parts_list_new_entries() {
        let mut workbook = empty_workbook();
        let sheet = workbook.create_sheet("summary").unwrap();
        let source = Sheet::with_header("house_data", &["Unit"], 4);
        workbook.create_pivot_table(sheet, &source, SourceArea::resolve(&source).unwrap(), (4, 0)).unwrap();
        let patched = workbook.patched_parts().unwrap();
        let text = |index: usize| String::from_utf8(patched[index].1.clone()).unwrap();
        assert!(text(0).contains(r#"<sheet name="summary" sheetId="2" r:id="rId2"/></sheets><pivotCaches><pivotCache cacheId="1" r:id="rId3"/></pivotCaches></workbook>"#));
        assert!(text(1).contains(r#"Target="pivotCache/pivotCacheDefinition1.xml"/></Relationships>"#));
        assert!(text(2).contains(r#"<Override PartName="/xl/pivotCache/pivotCacheRecords1.xml""#));
    }

    #[test]
    fn test_pivot_needs_a_header() {
        let mut workbook = empty_workbook();
        let sheet = workbook.create_sheet("summary").unwrap();
        let area = SourceArea { first_row: 0, first_col: 0, last_row: 0, last_col: 0 };
        let result = workbook.create_pivot_table(sheet, &Sheet::new("memory.xlsx", "blank"), area, (4, 0));
        assert!(matches!(result, Err(WorkbookError::MissingHeaderError(_))));
    }
}
