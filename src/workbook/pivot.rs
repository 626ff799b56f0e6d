//! In-memory pivot table definition, built up role by role and emitted on save.

use crate::pivot::SourceArea;
use crate::workbook::WorkbookError;
use std::collections::HashSet;
use std::fmt::Display;

/// Aggregation applied by the spreadsheet application to a data field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Aggregation {
    Count,
    Sum,
    Average,
}

impl Aggregation {
    /// Value of the `subtotal` attribute of a `<dataField>`
    pub const fn subtotal(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Average => "average",
        }
    }
}

impl Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count => write!(f, "COUNT"),
            Self::Sum => write!(f, "SUM"),
            Self::Average => write!(f, "AVERAGE"),
        }
    }
}

/// Axis a source column can be placed on. A column sits on at most one axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Axis {
    Row,
    Column,
    Page,
}

impl Axis {
    /// Value of the `axis` attribute of a `<pivotField>`
    pub const fn attribute(&self) -> &'static str {
        match self {
            Self::Row => "axisRow",
            Self::Column => "axisCol",
            Self::Page => "axisPage",
        }
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Row => write!(f, "row label"),
            Self::Column => write!(f, "column label"),
            Self::Page => write!(f, "report filter"),
        }
    }
}

/// An aggregated measure
#[derive(Clone, Debug, PartialEq)]
pub struct DataField {
    pub column: usize,
    pub aggregation: Aggregation,
    pub label: String,
}

/// Result of adding a field to a pivot table
#[derive(Clone, Debug, PartialEq)]
pub enum FieldChange {
    Added,
    /// The same role was already assigned to this column, or the label is taken ignoring case
    Duplicate,
    /// The column already sits on another axis
    AxisConflict(Axis),
}

/// A pivot table bound to a rectangular area of a source sheet.
#[derive(Clone, Debug)]
pub struct PivotTable {
    pub(crate) name: String,
    pub(crate) cache_id: u32,
    pub(crate) source_sheet: String,
    pub(crate) area: SourceArea,
    pub(crate) anchor: (usize, usize),
    /// Cache field names, one per source column of the area
    pub(crate) fields: Vec<String>,
    /// Axis of each source column
    pub(crate) axes: Vec<Option<Axis>>,
    pub(crate) rows: Vec<usize>,
    pub(crate) columns: Vec<usize>,
    pub(crate) pages: Vec<usize>,
    pub(crate) data: Vec<DataField>,
}

impl PivotTable {
    pub(crate) fn new(
        name: String,
        cache_id: u32,
        source_sheet: &str,
        area: SourceArea,
        anchor: (usize, usize),
        header: &[Option<String>],
    ) -> Self {
        let width = area.width();
        PivotTable {
            name,
            cache_id,
            source_sheet: source_sheet.to_owned(),
            area,
            anchor,
            fields: cache_field_names(header, width),
            axes: vec![None; width],
            rows: Vec::new(),
            columns: Vec::new(),
            pages: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_sheet(&self) -> &str {
        &self.source_sheet
    }

    pub fn area(&self) -> SourceArea {
        self.area
    }

    /// Anchor cell as zero-based (row, column)
    pub fn anchor(&self) -> (usize, usize) {
        self.anchor
    }

    pub fn row_labels(&self) -> &[usize] {
        &self.rows
    }

    pub fn column_labels(&self) -> &[usize] {
        &self.columns
    }

    pub fn report_filters(&self) -> &[usize] {
        &self.pages
    }

    pub fn data_fields(&self) -> &[DataField] {
        &self.data
    }

    /// Cache field names, one per source column
    pub fn field_names(&self) -> &[String] {
        &self.fields
    }

    pub fn add_row_label(&mut self, column: usize) -> Result<FieldChange, WorkbookError> {
        self.add_axis_field(column, Axis::Row)
    }

    pub fn add_column_label(&mut self, column: usize) -> Result<FieldChange, WorkbookError> {
        self.add_axis_field(column, Axis::Column)
    }

    pub fn add_report_filter(&mut self, column: usize) -> Result<FieldChange, WorkbookError> {
        self.add_axis_field(column, Axis::Page)
    }

    pub fn add_data_field(&mut self, aggregation: Aggregation, column: usize, label: &str) -> Result<FieldChange, WorkbookError> {
        let offset = self.offset(column)?;
        let key = label.to_lowercase();
        if self.data.iter().any(|field| field.label.to_lowercase() == key) {
            return Ok(FieldChange::Duplicate);
        }
        self.data.push(DataField {
            column: offset,
            aggregation,
            label: label.to_owned(),
        });
        Ok(FieldChange::Added)
    }

    fn add_axis_field(&mut self, column: usize, axis: Axis) -> Result<FieldChange, WorkbookError> {
        let offset = self.offset(column)?;
        match self.axes[offset] {
            Some(current) if current == axis => return Ok(FieldChange::Duplicate),
            Some(current) => return Ok(FieldChange::AxisConflict(current)),
            None => self.axes[offset] = Some(axis),
        }
        match axis {
            Axis::Row => self.rows.push(offset),
            Axis::Column => self.columns.push(offset),
            Axis::Page => self.pages.push(offset),
        }
        Ok(FieldChange::Added)
    }

    /// Field position of a source column within the cache
    fn offset(&self, column: usize) -> Result<usize, WorkbookError> {
        if self.area.first_col <= column && column <= self.area.last_col {
            Ok(column - self.area.first_col)
        } else {
            Err(WorkbookError::ColumnOutOfRangeError(self.name.to_owned(), column, self.area.last_col))
        }
    }
}

/// Names cache fields after the header; blank cells become `Column<N>` and
/// case-insensitive repeats get a numeric suffix, as cache field names must be unique.
fn cache_field_names(header: &[Option<String>], width: usize) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(width);
    let mut taken: HashSet<String> = HashSet::with_capacity(width);
    for column in 0..width {
        let base = header
            .get(column)
            .cloned()
            .flatten()
            .unwrap_or_else(|| format!("Column{}", column + 1));
        let mut name = base.clone();
        let mut suffix = 2;
        while taken.contains(&name.to_lowercase()) {
            name = format!("{base}{suffix}");
            suffix += 1;
        }
        taken.insert(name.to_lowercase());
        names.push(name);
    }
    names
}
