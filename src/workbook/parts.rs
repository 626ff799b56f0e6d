//! Emitters for the parts a pivot sheet adds to a package
use crate::error::RustyPivotError;
use crate::helpers::xml::part_writer;
use crate::helpers::xml::PartWriter;
use crate::spreadsheet::reference::area_to_reference;
use crate::workbook::pivot::PivotTable;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use std::collections::BTreeMap;

pub(crate) const MAIN_NAMESPACE: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub(crate) const RELATIONSHIP_NAMESPACE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub(crate) const PACKAGE_RELATIONSHIP_NAMESPACE: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

pub(crate) const WORKSHEET_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
pub(crate) const PIVOT_TABLE_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/pivotTable";
pub(crate) const PIVOT_CACHE_DEFINITION_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/pivotCacheDefinition";
pub(crate) const PIVOT_CACHE_RECORDS_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/pivotCacheRecords";

pub(crate) const WORKSHEET_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
pub(crate) const PIVOT_TABLE_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.pivotTable+xml";
pub(crate) const PIVOT_CACHE_DEFINITION_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.pivotCacheDefinition+xml";
pub(crate) const PIVOT_CACHE_RECORDS_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.pivotCacheRecords+xml";

/// Position of the synthetic "Values" field in row or column fields
const VALUES_FIELD: &str = "-2";
const PIVOT_STYLE: &str = "PivotStyleLight16";

/// A relationship to be written into a `.rels` part
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PartLink {
    pub(crate) id: String,
    pub(crate) kind: &'static str,
    pub(crate) target: String,
}

fn start<'a>(writer: &mut PartWriter, element: BytesStart<'a>) -> Result<(), RustyPivotError> {
    writer.write_event(Event::Start(element))?;
    Ok(())
}

fn end(writer: &mut PartWriter, name: &str) -> Result<(), RustyPivotError> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn empty<'a>(writer: &mut PartWriter, element: BytesStart<'a>) -> Result<(), RustyPivotError> {
    writer.write_event(Event::Empty(element))?;
    Ok(())
}

/// Element with a `count` attribute followed by its children, or nothing when there are none
fn counted<T, F>(writer: &mut PartWriter, name: &str, items: &[T], mut child: F) -> Result<(), RustyPivotError>
where
    F: FnMut(&mut PartWriter, &T) -> Result<(), RustyPivotError>,
{
    if items.is_empty() {
        return Ok(());
    }
    let count = items.len().to_string();
    start(writer, BytesStart::new(name).with_attributes([("count", count.as_str())]))?;
    for item in items {
        child(writer, item)?;
    }
    end(writer, name)
}

/// Blank worksheet carrying only column widths
pub(crate) fn worksheet(widths: &BTreeMap<usize, f64>) -> Result<Vec<u8>, RustyPivotError> {
    let mut writer = part_writer()?;
    start(
        &mut writer,
        BytesStart::new("worksheet").with_attributes([("xmlns", MAIN_NAMESPACE), ("xmlns:r", RELATIONSHIP_NAMESPACE)]),
    )?;
    empty(&mut writer, BytesStart::new("dimension").with_attributes([("ref", "A1")]))?;
    start(&mut writer, BytesStart::new("sheetViews"))?;
    empty(&mut writer, BytesStart::new("sheetView").with_attributes([("workbookViewId", "0")]))?;
    end(&mut writer, "sheetViews")?;
    empty(&mut writer, BytesStart::new("sheetFormatPr").with_attributes([("defaultRowHeight", "15")]))?;
    counted_cols(&mut writer, widths)?;
    empty(&mut writer, BytesStart::new("sheetData"))?;
    empty(
        &mut writer,
        BytesStart::new("pageMargins").with_attributes([
            ("left", "0.7"),
            ("right", "0.7"),
            ("top", "0.75"),
            ("bottom", "0.75"),
            ("header", "0.3"),
            ("footer", "0.3"),
        ]),
    )?;
    end(&mut writer, "worksheet")?;
    Ok(writer.into_inner())
}

/// `<cols>` with consecutive columns of equal width merged into one range
fn counted_cols(writer: &mut PartWriter, widths: &BTreeMap<usize, f64>) -> Result<(), RustyPivotError> {
    let mut runs: Vec<(usize, usize, f64)> = Vec::new();
    for (&col, &width) in widths {
        match runs.last_mut() {
            Some((_, last, run_width)) if *last + 1 == col && *run_width == width => *last = col,
            _ => runs.push((col, col, width)),
        }
    }
    if runs.is_empty() {
        return Ok(());
    }
    start(writer, BytesStart::new("cols"))?;
    for (first, last, width) in runs {
        let (min, max, width) = ((first + 1).to_string(), (last + 1).to_string(), width.to_string());
        empty(
            writer,
            BytesStart::new("col").with_attributes([
                ("min", min.as_str()),
                ("max", max.as_str()),
                ("width", width.as_str()),
                ("customWidth", "1"),
            ]),
        )?;
    }
    end(writer, "cols")
}

/// `.rels` part listing `links`
pub(crate) fn relationships(links: &[PartLink]) -> Result<Vec<u8>, RustyPivotError> {
    let mut writer = part_writer()?;
    start(
        &mut writer,
        BytesStart::new("Relationships").with_attributes([("xmlns", PACKAGE_RELATIONSHIP_NAMESPACE)]),
    )?;
    for link in links {
        empty(&mut writer, relationship_element(link))?;
    }
    end(&mut writer, "Relationships")?;
    Ok(writer.into_inner())
}

pub(crate) fn relationship_element(link: &PartLink) -> BytesStart<'_> {
    BytesStart::new("Relationship").with_attributes([
        ("Id", link.id.as_str()),
        ("Type", link.kind),
        ("Target", link.target.as_str()),
    ])
}

/// Pivot table definition; the rendered region is left to the application's refresh
pub(crate) fn pivot_table_definition(pivot: &PivotTable) -> Result<Vec<u8>, RustyPivotError> {
    let cache_id = pivot.cache_id.to_string();
    let mut writer = part_writer()?;
    start(
        &mut writer,
        BytesStart::new("pivotTableDefinition").with_attributes([
            ("xmlns", MAIN_NAMESPACE),
            ("name", pivot.name.as_str()),
            ("cacheId", cache_id.as_str()),
            ("applyNumberFormats", "0"),
            ("applyBorderFormats", "0"),
            ("applyFontFormats", "0"),
            ("applyPatternFormats", "0"),
            ("applyAlignmentFormats", "0"),
            ("applyWidthHeightFormats", "1"),
            ("dataCaption", "Values"),
            ("updatedVersion", "3"),
            ("minRefreshableVersion", "3"),
            ("useAutoFormatting", "1"),
            ("itemPrintTitles", "1"),
            ("createdVersion", "3"),
            ("indent", "0"),
            ("outline", "1"),
            ("outlineData", "1"),
        ]),
    )?;

    let (row, col) = pivot.anchor;
    let location = area_to_reference((row, col), (row + 1, col + 1));
    let mut element = BytesStart::new("location").with_attributes([
        ("ref", location.as_str()),
        ("firstHeaderRow", "1"),
        ("firstDataRow", "1"),
        ("firstDataCol", "1"),
    ]);
    let page_count = pivot.pages.len().to_string();
    if !pivot.pages.is_empty() {
        element.extend_attributes([("rowPageCount", page_count.as_str()), ("colPageCount", "1")]);
    }
    empty(&mut writer, element)?;

    let fields: Vec<usize> = (0..pivot.field_names().len()).collect();
    counted(&mut writer, "pivotFields", &fields, |writer, &field| {
        let mut element = BytesStart::new("pivotField");
        if let Some(axis) = pivot.axes[field] {
            element.push_attribute(("axis", axis.attribute()));
        }
        if pivot.data.iter().any(|data| data.column == field) {
            element.push_attribute(("dataField", "1"));
        }
        element.push_attribute(("showAll", "0"));
        if pivot.axes[field].is_some() {
            start(writer, element)?;
            start(writer, BytesStart::new("items").with_attributes([("count", "1")]))?;
            empty(writer, BytesStart::new("item").with_attributes([("t", "default")]))?;
            end(writer, "items")?;
            end(writer, "pivotField")
        } else {
            empty(writer, element)
        }
    })?;

    let field = |writer: &mut PartWriter, index: &String| empty(writer, BytesStart::new("field").with_attributes([("x", index.as_str())]));
    let rows: Vec<String> = pivot.rows.iter().map(usize::to_string).collect();
    counted(&mut writer, "rowFields", &rows, field)?;
    let mut columns: Vec<String> = pivot.columns.iter().map(usize::to_string).collect();
    if pivot.data.len() > 1 {
        columns.push(VALUES_FIELD.to_owned());
    }
    counted(&mut writer, "colFields", &columns, field)?;
    counted(&mut writer, "pageFields", &pivot.pages, |writer, page| {
        let page = page.to_string();
        empty(writer, BytesStart::new("pageField").with_attributes([("fld", page.as_str()), ("hier", "-1")]))
    })?;
    counted(&mut writer, "dataFields", &pivot.data, |writer, data| {
        let column = data.column.to_string();
        empty(
            writer,
            BytesStart::new("dataField").with_attributes([
                ("name", data.label.as_str()),
                ("fld", column.as_str()),
                ("subtotal", data.aggregation.subtotal()),
                ("baseField", "0"),
                ("baseItem", "0"),
            ]),
        )
    })?;

    empty(
        &mut writer,
        BytesStart::new("pivotTableStyleInfo").with_attributes([
            ("name", PIVOT_STYLE),
            ("showRowHeaders", "1"),
            ("showColHeaders", "1"),
            ("showRowStripes", "0"),
            ("showColStripes", "0"),
            ("showLastColumn", "1"),
        ]),
    )?;
    end(&mut writer, "pivotTableDefinition")?;
    Ok(writer.into_inner())
}

/// Cache definition over the source area, refreshed by the application on open
pub(crate) fn pivot_cache_definition(pivot: &PivotTable, records_id: &str) -> Result<Vec<u8>, RustyPivotError> {
    let mut writer = part_writer()?;
    start(
        &mut writer,
        BytesStart::new("pivotCacheDefinition").with_attributes([
            ("xmlns", MAIN_NAMESPACE),
            ("xmlns:r", RELATIONSHIP_NAMESPACE),
            ("r:id", records_id),
            ("refreshOnLoad", "1"),
            ("createdVersion", "3"),
            ("refreshedVersion", "3"),
            ("minRefreshableVersion", "3"),
            ("recordCount", "0"),
        ]),
    )?;
    start(&mut writer, BytesStart::new("cacheSource").with_attributes([("type", "worksheet")]))?;
    let reference = pivot.area.reference();
    empty(
        &mut writer,
        BytesStart::new("worksheetSource")
            .with_attributes([("ref", reference.as_str()), ("sheet", pivot.source_sheet.as_str())]),
    )?;
    end(&mut writer, "cacheSource")?;
    counted(&mut writer, "cacheFields", pivot.field_names(), |writer, name| {
        start(
            writer,
            BytesStart::new("cacheField").with_attributes([("name", name.as_str()), ("numFmtId", "0")]),
        )?;
        empty(writer, BytesStart::new("sharedItems"))?;
        end(writer, "cacheField")
    })?;
    end(&mut writer, "pivotCacheDefinition")?;
    Ok(writer.into_inner())
}

/// Empty record set; records are produced by the refresh
pub(crate) fn pivot_cache_records() -> Result<Vec<u8>, RustyPivotError> {
    let mut writer = part_writer()?;
    empty(
        &mut writer,
        BytesStart::new("pivotCacheRecords").with_attributes([
            ("xmlns", MAIN_NAMESPACE),
            ("xmlns:r", RELATIONSHIP_NAMESPACE),
            ("count", "0"),
        ]),
    )?;
    Ok(writer.into_inner())
}
