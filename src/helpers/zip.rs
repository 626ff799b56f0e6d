//! ZIP archive helper utilities for Office Open XML packages
//! Provides convenient methods for accessing parts within ZIP archives

use crate::error::RustyPivotError;
use crate::helpers::xml::XmlReader;
use crate::spreadsheet::PackageLimits;
use crate::spreadsheet::SpreadsheetError;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

/// Helper trait for ZIP archive operations with specialized reader creation
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Gets a part from the ZIP archive by name (case-insensitive, path separator agnostic)
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, RustyPivotError>;

    /// Creates an XML reader for a part within the ZIP archive
    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, RustyPivotError>;

    /// Reads a whole part into memory, refusing parts above the configured size limit
    fn read_bytes(&mut self, name: &str, limits: &PackageLimits) -> Result<Option<Vec<u8>>, RustyPivotError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, RustyPivotError> {
        let pattern = name.replace('\\', "/");
        let path = self.file_names()
            .find(|file_name| pattern.eq_ignore_ascii_case(file_name))
            .map(|file_name| file_name.to_owned());
        match path.map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(Some(file)) => Ok(Some(file)),
            Ok(None) | Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, RustyPivotError> {
        let reader = self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file)));
        Ok(reader)
    }

    fn read_bytes(&mut self, name: &str, limits: &PackageLimits) -> Result<Option<Vec<u8>>, RustyPivotError> {
        let Some(mut file) = self.file(name)? else {
            return Ok(None);
        };
        let size = file.size();
        if size > limits.max_part_size {
            Err(SpreadsheetError::PartTooLargeError(name.to_owned(), size, limits.max_part_size))?;
        }
        let mut bytes = Vec::with_capacity(size as usize);
        file.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }
}
