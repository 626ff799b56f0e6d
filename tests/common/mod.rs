//! Shared fixtures: small xlsx packages written with `zip`, and readers for the output.
#![allow(dead_code)]

use std::io::Read;
use std::io::Write;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipArchive;
use zip::ZipWriter;

pub const HOUSE_HEADER: [&str; 5] = ["Unit", "Camp Name", "Date", "House Id", "Sub Group"];

pub fn house_rows() -> Vec<Vec<&'static str>> {
    vec![
        HOUSE_HEADER.to_vec(),
        vec!["North", "Alpha", "2024-01-02", "101", "A"],
        vec!["North", "Beta", "2024-01-03", "102", "B"],
        vec!["South", "Alpha", "2024-01-03", "201", "A"],
    ]
}

/// Temporary directory holding the input and output workbooks of a test
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Workspace { dir: tempfile::tempdir().unwrap() }
    }

    pub fn path(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }

    /// Writes `book.xlsx` with the given sheets and returns its path
    pub fn workbook(&self, sheets: &[(&str, Vec<Vec<&str>>)]) -> String {
        let path = self.path("book.xlsx");
        write_workbook(&path, sheets);
        path
    }
}

fn column_letter(col: usize) -> char {
    (b'A' + col as u8) as char
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// Writes an xlsx package. Row 1 of every sheet is stored as shared strings,
/// other cells as numbers when they parse as one and as inline strings otherwise.
pub fn write_workbook(path: &str, sheets: &[(&str, Vec<Vec<&str>>)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    let mut shared_strings: Vec<String> = Vec::new();

    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#,
    );
    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><bookViews><workbookView/></bookViews><sheets>"#,
    );
    let mut relationships = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );

    for (index, (name, rows)) in sheets.iter().enumerate() {
        let number = index + 1;
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{number}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
        workbook.push_str(&format!(r#"<sheet name="{}" sheetId="{number}" r:id="rId{number}"/>"#, escape(name)));
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{number}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{number}.xml"/>"#
        ));

        let mut sheet = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        );
        for (row, cells) in rows.iter().enumerate() {
            sheet.push_str(&format!(r#"<row r="{}">"#, row + 1));
            for (col, value) in cells.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                let reference = format!("{}{}", column_letter(col), row + 1);
                if row == 0 {
                    shared_strings.push(value.to_string());
                    sheet.push_str(&format!(r#"<c r="{reference}" t="s"><v>{}</v></c>"#, shared_strings.len() - 1));
                } else if value.parse::<f64>().is_ok() {
                    sheet.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#));
                } else {
                    sheet.push_str(&format!(r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#, escape(value)));
                }
            }
            sheet.push_str("</row>");
        }
        sheet.push_str("</sheetData></worksheet>");
        zip.start_file(format!("xl/worksheets/sheet{number}.xml"), options).unwrap();
        zip.write_all(sheet.as_bytes()).unwrap();
    }

    let sst_number = sheets.len() + 1;
    relationships.push_str(&format!(
        r#"<Relationship Id="rId{sst_number}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#
    ));
    workbook.push_str("</sheets></workbook>");
    content_types.push_str("</Types>");
    let mut sst = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
        shared_strings.len()
    );
    for text in &shared_strings {
        sst.push_str(&format!("<si><t>{}</t></si>", escape(text)));
    }
    sst.push_str("</sst>");

    let root_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;
    for (name, content) in [
        ("[Content_Types].xml", content_types.as_str()),
        ("_rels/.rels", root_rels),
        ("xl/workbook.xml", workbook.as_str()),
        ("xl/_rels/workbook.xml.rels", relationships.as_str()),
        ("xl/sharedStrings.xml", sst.as_str()),
    ] {
        zip.start_file(name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Reads one part of a package as text
pub fn read_part(path: &str, name: &str) -> Option<String> {
    let mut archive = ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut file = archive.by_name(name).ok()?;
    let mut text = String::new();
    file.read_to_string(&mut text).unwrap();
    Some(text)
}

/// Part names of a package, sorted
pub fn part_names(path: &str) -> Vec<String> {
    let archive = ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_owned).collect();
    names.sort();
    names
}

/// Number of `needle` occurrences in `haystack`
pub fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
