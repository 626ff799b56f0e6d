//! Office Open XML package helpers shared by the source reader and the destination writer
use crate::error::RustyPivotError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use zip::ZipArchive;

/// Buffered reader over a workbook file
pub(crate) type FileReader = BufReader<File>;

/// XML tag name for relationship elements
const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Signature of OLE compound files (encrypted packages and legacy .xls)
const COMPOUND_FILE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

pub(crate) const WORKBOOK_PATH: &str = "xl/workbook.xml";
pub(crate) const WORKBOOK_RELS_PATH: &str = "xl/_rels/workbook.xml.rels";
pub(crate) const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";

/// Relationship type suffix of worksheet parts
pub(crate) const WORKSHEET_RELATIONSHIP: &str = "/worksheet";

/// One `<Relationship>` entry of a `.rels` part
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Relationship {
    pub(crate) id: String,
    pub(crate) kind: String,
    pub(crate) target: String,
}

/// Opens an xlsx package for reading
///
/// # Arguments
/// * `file_name` - Path to the workbook file
///
/// # Returns
/// Zip archive handle over the buffered file
pub(crate) fn open(file_name: &str) -> Result<ZipArchive<FileReader>, RustyPivotError> {
    let file = File::open(file_name)
        .map_err(|error| SpreadsheetError::FileOpenError(file_name.to_owned(), error))?;
    let mut reader = BufReader::new(file);

    if is_compound_file(&mut reader)? {
        Err(SpreadsheetError::SpreadsheetCompoundFileError(file_name.to_owned()))?;
    }

    Ok(ZipArchive::new(reader)?)
}

/// Parses every relationship of a `.rels` part
pub(crate) fn parse_relationships<R: BufRead>(reader: &mut XmlReader<R>) -> Result<Vec<Relationship>, RustyPivotError> {
    let mut relationships = Vec::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if let Some((id, target)) = id.zip(target) {
                relationships.push(Relationship {
                    id: id.into_owned(),
                    kind: kind.map(Cow::into_owned).unwrap_or_default(),
                    target: target.into_owned(),
                });
            }
        }
    });
    Ok(relationships)
}

/// Loads worksheet relationships from a workbook package
///
/// # Arguments
/// * `zip` - Zip archive handle
/// * `path` - Path to the relationships XML file within the archive
///
/// # Returns
/// Mapping of relationship IDs to worksheet paths
pub(crate) fn load_relationships<RS: Read + Seek>(zip: &mut ZipArchive<RS>, path: &str) -> Result<HashMap<String, String>, RustyPivotError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_string()))?;
    let relationships = parse_relationships(&mut reader)?
        .into_iter()
        .filter(|relationship| relationship.kind.is_empty() || relationship.kind.ends_with(WORKSHEET_RELATIONSHIP))
        .map(|relationship| (relationship.id, to_zip_path(Cow::Owned(relationship.target))))
        .collect();
    Ok(relationships)
}

/// Normalizes a relationship target of the workbook part to a path within the zip archive
pub(crate) fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(stripped) = path.strip_prefix('/') {
        stripped.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Checks whether the file is an OLE compound file rather than a zip package.
/// Encrypted xlsx files are stored that way.
fn is_compound_file<R: Read + Seek>(reader: &mut R) -> Result<bool, RustyPivotError> {
    let mut signature = [0u8; 8];
    let mut filled = 0;
    while filled < signature.len() {
        let count = reader.read(&mut signature[filled..])?;
        if count == 0 {
            break;
        }
        filled += count;
    }
    reader.seek(SeekFrom::Start(0))?;
    Ok(filled == signature.len() && signature == COMPOUND_FILE_SIGNATURE)
}
