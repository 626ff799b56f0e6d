//! Reading and additive patching of the package-level parts of a workbook:
//! `xl/workbook.xml`, its relationships and `[Content_Types].xml`.
use crate::error::RustyPivotError;
use crate::helpers::xml::namespace_prefix;
use crate::helpers::xml::rewrite_xml;
use crate::helpers::xml::PartWriter;
use crate::helpers::xml::Rewrite;
use crate::helpers::xml::XmlError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::match_xml_events;
use crate::spreadsheet::excel::parse_relationships;
use crate::workbook::parts::relationship_element;
use crate::workbook::parts::PartLink;
use crate::workbook::parts::RELATIONSHIP_NAMESPACE;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use std::collections::HashSet;

/// Workbook children that must come after `<pivotCaches>`
const AFTER_PIVOT_CACHES: [&[u8]; 6] = [
    b"smartTagPr",
    b"smartTagTypes",
    b"webPublishing",
    b"fileRecoveryPr",
    b"webPublishObjects",
    b"extLst",
];

/// Identifiers already in use by a source package
#[derive(Clone, Debug, Default)]
pub(crate) struct WorkbookScan {
    /// Names of every sheet, worksheets and chart sheets alike
    pub(crate) sheet_names: Vec<String>,
    pub(crate) max_sheet_id: u32,
    pub(crate) max_cache_id: u32,
}

pub(crate) fn scan_workbook(xml: &[u8]) -> Result<WorkbookScan, RustyPivotError> {
    let mut scan = WorkbookScan::default();
    let mut reader = XmlReader::new(xml);
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == b"sheet" => {
            if let Some(name) = event.get_attribute_value("name")? {
                scan.sheet_names.push(name.into_owned());
            }
            if let Some(id) = event.parse_attribute_value::<u32>("sheetId")? {
                scan.max_sheet_id = scan.max_sheet_id.max(id);
            }
        }
        Event::Start(event) if event.local_name().as_ref() == b"pivotCache" => {
            if let Some(id) = event.parse_attribute_value::<u32>("cacheId")? {
                scan.max_cache_id = scan.max_cache_id.max(id);
            }
        }
    });
    Ok(scan)
}

/// Relationship ids of a `.rels` part
pub(crate) fn relationship_ids(xml: &[u8]) -> Result<HashSet<String>, RustyPivotError> {
    let ids = parse_relationships(&mut XmlReader::new(xml))?
        .into_iter()
        .map(|relationship| relationship.id)
        .collect();
    Ok(ids)
}

/// Hands out ids and part names that do not collide with the source package
#[derive(Clone, Debug, Default)]
pub(crate) struct IdAllocator {
    next_sheet_id: u32,
    next_cache_id: u32,
    relationship_ids: HashSet<String>,
    /// Lower-cased part names already taken
    parts: HashSet<String>,
}

impl IdAllocator {
    pub(crate) fn new<I, S>(scan: &WorkbookScan, relationship_ids: HashSet<String>, part_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        IdAllocator {
            next_sheet_id: scan.max_sheet_id + 1,
            next_cache_id: scan.max_cache_id + 1,
            relationship_ids,
            parts: part_names.into_iter().map(|name| name.as_ref().to_lowercase()).collect(),
        }
    }

    pub(crate) fn sheet_id(&mut self) -> u32 {
        self.next_sheet_id += 1;
        self.next_sheet_id - 1
    }

    pub(crate) fn cache_id(&mut self) -> u32 {
        self.next_cache_id += 1;
        self.next_cache_id - 1
    }

    /// Next free `rIdN` of the workbook relationships
    pub(crate) fn relationship_id(&mut self) -> String {
        let id = (1..)
            .map(|number| format!("rId{number}"))
            .find(|id| !self.relationship_ids.contains(id))
            .unwrap_or_default();
        self.relationship_ids.insert(id.to_owned());
        id
    }

    /// Smallest number N for which every `prefix + N + suffix` part is free; reserves them
    pub(crate) fn part_number(&mut self, templates: &[(&str, &str)]) -> u32 {
        let name = |number: u32, (prefix, suffix): &(&str, &str)| format!("{prefix}{number}{suffix}").to_lowercase();
        let number = (1..)
            .find(|&number| templates.iter().all(|template| !self.parts.contains(&name(number, template))))
            .unwrap_or_default();
        for template in templates {
            self.parts.insert(name(number, template));
        }
        number
    }
}

/// A `<sheet>` entry added to the workbook
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SheetEntry {
    pub(crate) name: String,
    pub(crate) sheet_id: u32,
    pub(crate) relationship_id: String,
}

/// A `<pivotCache>` entry added to the workbook
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CacheEntry {
    pub(crate) cache_id: u32,
    pub(crate) relationship_id: String,
}

/// Appends sheets to `<sheets>` and caches to `<pivotCaches>`, creating the latter
/// where the schema expects it. Everything else is copied unchanged.
pub(crate) fn patch_workbook(xml: &[u8], sheets: &[SheetEntry], caches: &[CacheEntry]) -> Result<Vec<u8>, RustyPivotError> {
    let mut element_prefix = String::new();
    let mut relationship_prefix = String::from("r");
    let mut sheets_written = false;
    let mut caches_written = caches.is_empty();

    let output = rewrite_xml(xml, |event, depth, writer| {
        match event {
            Event::Start(root) if depth == 0 => {
                element_prefix = match root.name().prefix() {
                    Some(prefix) => format!("{}:", String::from_utf8_lossy(prefix.as_ref())),
                    None => String::new(),
                };
                match namespace_prefix(root, RELATIONSHIP_NAMESPACE)? {
                    Some(prefix) => relationship_prefix = prefix,
                    None => {
                        relationship_prefix = free_prefix(root)?;
                        let mut root = root.clone();
                        root.push_attribute((format!("xmlns:{relationship_prefix}").as_str(), RELATIONSHIP_NAMESPACE));
                        writer.write_event(Event::Start(root))?;
                        return Ok(Rewrite::Replaced);
                    }
                }
            }
            Event::End(element) if depth == 1 && element.local_name().as_ref() == b"sheets" => {
                write_sheets(writer, &element_prefix, &relationship_prefix, sheets)?;
                sheets_written = true;
            }
            Event::Empty(element) if depth == 1 && element.local_name().as_ref() == b"sheets" => {
                let name = format!("{element_prefix}sheets");
                writer.write_event(Event::Start(BytesStart::new(name.as_str())))?;
                write_sheets(writer, &element_prefix, &relationship_prefix, sheets)?;
                writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
                sheets_written = true;
                return Ok(Rewrite::Replaced);
            }
            Event::End(element) if depth == 1 && element.local_name().as_ref() == b"pivotCaches" => {
                write_caches(writer, &element_prefix, &relationship_prefix, caches)?;
                caches_written = true;
            }
            Event::Empty(element) if depth == 1 && element.local_name().as_ref() == b"pivotCaches" => {
                write_cache_block(writer, &element_prefix, &relationship_prefix, caches)?;
                caches_written = true;
                return Ok(Rewrite::Replaced);
            }
            Event::Start(element) | Event::Empty(element)
                if !caches_written && depth == 1 && AFTER_PIVOT_CACHES.contains(&element.local_name().as_ref()) =>
            {
                write_cache_block(writer, &element_prefix, &relationship_prefix, caches)?;
                caches_written = true;
            }
            Event::End(_) if !caches_written && depth == 0 => {
                write_cache_block(writer, &element_prefix, &relationship_prefix, caches)?;
                caches_written = true;
            }
            _ => (),
        }
        Ok(Rewrite::Keep)
    })?;

    if !sheets_written {
        Err(XmlError::MissingElementError("sheets".to_owned()))?;
    }
    Ok(output)
}

/// First unbound prefix out of `r`, `r1`, `r2`...
fn free_prefix(root: &BytesStart<'_>) -> Result<String, RustyPivotError> {
    let mut bound = HashSet::new();
    for attribute in root.attributes() {
        let attribute = attribute?;
        if let Some(prefix) = attribute.key.as_ref().strip_prefix(b"xmlns:") {
            bound.insert(String::from_utf8_lossy(prefix).into_owned());
        }
    }
    let prefix = std::iter::once("r".to_owned())
        .chain((1..).map(|number| format!("r{number}")))
        .find(|prefix| !bound.contains(prefix))
        .unwrap_or_default();
    Ok(prefix)
}

fn write_sheets(writer: &mut PartWriter, prefix: &str, relationship_prefix: &str, sheets: &[SheetEntry]) -> Result<(), RustyPivotError> {
    let (name, id_key) = (format!("{prefix}sheet"), format!("{relationship_prefix}:id"));
    for sheet in sheets {
        let sheet_id = sheet.sheet_id.to_string();
        let element = BytesStart::new(name.as_str()).with_attributes([
            ("name", sheet.name.as_str()),
            ("sheetId", sheet_id.as_str()),
            (id_key.as_str(), sheet.relationship_id.as_str()),
        ]);
        writer.write_event(Event::Empty(element))?;
    }
    Ok(())
}

fn write_caches(writer: &mut PartWriter, prefix: &str, relationship_prefix: &str, caches: &[CacheEntry]) -> Result<(), RustyPivotError> {
    let (name, id_key) = (format!("{prefix}pivotCache"), format!("{relationship_prefix}:id"));
    for cache in caches {
        let cache_id = cache.cache_id.to_string();
        let element = BytesStart::new(name.as_str())
            .with_attributes([("cacheId", cache_id.as_str()), (id_key.as_str(), cache.relationship_id.as_str())]);
        writer.write_event(Event::Empty(element))?;
    }
    Ok(())
}

fn write_cache_block(writer: &mut PartWriter, prefix: &str, relationship_prefix: &str, caches: &[CacheEntry]) -> Result<(), RustyPivotError> {
    let name = format!("{prefix}pivotCaches");
    writer.write_event(Event::Start(BytesStart::new(name.as_str())))?;
    write_caches(writer, prefix, relationship_prefix, caches)?;
    writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
    Ok(())
}

/// Appends relationships before `</Relationships>`
pub(crate) fn patch_relationships(xml: &[u8], links: &[PartLink]) -> Result<Vec<u8>, RustyPivotError> {
    append_to_root(xml, "Relationships", |writer| {
        for link in links {
            writer.write_event(Event::Empty(relationship_element(link)))?;
        }
        Ok(())
    })
}

/// Appends `<Override>` entries, as (part name, content type), before `</Types>`
pub(crate) fn patch_content_types(xml: &[u8], overrides: &[(String, &'static str)]) -> Result<Vec<u8>, RustyPivotError> {
    append_to_root(xml, "Types", |writer| {
        for (part_name, content_type) in overrides {
            let element = BytesStart::new("Override")
                .with_attributes([("PartName", part_name.as_str()), ("ContentType", *content_type)]);
            writer.write_event(Event::Empty(element))?;
        }
        Ok(())
    })
}

/// Writes children at the end of the document element, expanding it if it is empty
fn append_to_root<F>(xml: &[u8], root_name: &str, mut children: F) -> Result<Vec<u8>, RustyPivotError>
where
    F: FnMut(&mut PartWriter) -> Result<(), RustyPivotError>,
{
    let mut found = false;
    let output = rewrite_xml(xml, |event, depth, writer| match event {
        Event::End(_) if depth == 0 => {
            children(writer)?;
            found = true;
            Ok(Rewrite::Keep)
        }
        Event::Empty(root) if depth == 0 => {
            writer.write_event(Event::Start(root.borrow()))?;
            children(writer)?;
            writer.write_event(Event::End(root.to_end()))?;
            found = true;
            Ok(Rewrite::Replaced)
        }
        _ => Ok(Rewrite::Keep),
    })?;
    if !found {
        Err(XmlError::MissingElementError(root_name.to_owned()))?;
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::parts::WORKSHEET_TYPE;
    use pretty_assertions::assert_eq;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><bookViews><workbookView/></bookViews><sheets><sheet name="house_data" sheetId="1" r:id="rId1"/><sheet name="Chart1" sheetId="4" r:id="rId2"/></sheets><calcPr calcId="191029"/><extLst><ext uri="x"/></extLst></workbook>"#;

    fn sheet_entry() -> SheetEntry {
        SheetEntry { name: "summary".to_owned(), sheet_id: 5, relationship_id: "rId7".to_owned() }
    }

    fn cache_entry() -> CacheEntry {
        CacheEntry { cache_id: 1, relationship_id: "rId8".to_owned() }
    }

    #[test]
    fn test_scan_workbook() {
        let scan = scan_workbook(WORKBOOK.as_bytes()).unwrap();
        assert_eq!(scan.sheet_names, vec!["house_data", "Chart1"]);
        assert_eq!(scan.max_sheet_id, 4);
        assert_eq!(scan.max_cache_id, 0);
    }

    #[test]
    fn test_patch_workbook_inserts_before_ext_list() {
        let output = patch_workbook(WORKBOOK.as_bytes(), &[sheet_entry()], &[cache_entry()]).unwrap();
        let xml = String::from_utf8(output).unwrap();
        assert!(xml.contains(r#"<sheet name="Chart1" sheetId="4" r:id="rId2"/><sheet name="summary" sheetId="5" r:id="rId7"/></sheets>"#));
        assert!(xml.contains(r#"<calcPr calcId="191029"/><pivotCaches><pivotCache cacheId="1" r:id="rId8"/></pivotCaches><extLst>"#));
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#));
    }

    #[test]
    fn test_patch_workbook_appends_to_existing_caches() {
        let workbook = r#"<x:workbook xmlns:x="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><x:sheets><x:sheet name="a" sheetId="1" xmlns:rel="http://schemas.openxmlformats.org/officeDocument/2006/relationships" rel:id="rId1"/></x:sheets><x:pivotCaches><x:pivotCache cacheId="9" xmlns:rel="http://schemas.openxmlformats.org/officeDocument/2006/relationships" rel:id="rId3"/></x:pivotCaches></x:workbook>"#;
        let scan = scan_workbook(workbook.as_bytes()).unwrap();
        assert_eq!(scan.max_cache_id, 9);
        let output = patch_workbook(workbook.as_bytes(), &[sheet_entry()], &[cache_entry()]).unwrap();
        let xml = String::from_utf8(output).unwrap();
        assert!(xml.starts_with(r#"<x:workbook xmlns:x="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#));
        assert!(xml.contains(r#"<x:sheet name="summary" sheetId="5" r:id="rId7"/></x:sheets>"#));
        assert!(xml.contains(r#"rel:id="rId3"/><x:pivotCache cacheId="1" r:id="rId8"/></x:pivotCaches></x:workbook>"#));
    }

    #[test]
    fn test_patch_workbook_without_sheets_fails() {
        let result = patch_workbook(b"<workbook/>", &[sheet_entry()], &[]);
        assert!(matches!(result, Err(RustyPivotError::XmlHelperError(XmlError::MissingElementError(_)))));
    }

    #[test]
    fn test_patch_relationships() {
        let rels = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="t" Target="worksheets/sheet1.xml"/></Relationships>"#;
        assert_eq!(relationship_ids(rels.as_bytes()).unwrap(), HashSet::from(["rId1".to_owned()]));
        let link = PartLink { id: "rId2".to_owned(), kind: WORKSHEET_TYPE, target: "worksheets/sheet2.xml".to_owned() };
        let xml = String::from_utf8(patch_relationships(rels.as_bytes(), &[link]).unwrap()).unwrap();
        assert!(xml.ends_with(r#"Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/></Relationships>"#));
    }

    #[test]
    fn test_patch_empty_content_types() {
        let types = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#;
        let overrides = [("/xl/worksheets/sheet2.xml".to_owned(), "application/x")];
        let xml = String::from_utf8(patch_content_types(types.as_bytes(), &overrides).unwrap()).unwrap();
        assert_eq!(
            xml,
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Override PartName="/xl/worksheets/sheet2.xml" ContentType="application/x"/></Types>"#
        );
    }

    #[test]
    fn test_allocator_skips_taken_ids() {
        let scan = WorkbookScan { sheet_names: Vec::new(), max_sheet_id: 3, max_cache_id: 0 };
        let ids = HashSet::from(["rId1".to_owned(), "rId2".to_owned(), "rId4".to_owned()]);
        let mut allocator = IdAllocator::new(&scan, ids, ["xl/worksheets/sheet1.xml", "xl/pivotCache/pivotCacheRecords1.xml"]);
        assert_eq!(allocator.sheet_id(), 4);
        assert_eq!(allocator.sheet_id(), 5);
        assert_eq!(allocator.cache_id(), 1);
        assert_eq!(allocator.relationship_id(), "rId3");
        assert_eq!(allocator.relationship_id(), "rId5");
        assert_eq!(allocator.part_number(&[("xl/worksheets/sheet", ".xml")]), 2);
        let caches = [("xl/pivotCache/pivotCacheDefinition", ".xml"), ("xl/pivotCache/pivotCacheRecords", ".xml")];
        assert_eq!(allocator.part_number(&caches), 2);
        assert_eq!(allocator.part_number(&caches), 3);
    }
}
