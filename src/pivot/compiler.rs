use crate::error::RustyPivotError;
use crate::pivot::header::HeaderIndex;
use crate::pivot::range::SourceArea;
use crate::pivot::spec::Operation;
use crate::pivot::spec::PivotSpec;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::Sheet;
use crate::workbook::DataField;
use crate::workbook::FieldChange;
use crate::workbook::PivotTable;
use crate::workbook::PivotWorkbook;
use crate::workbook::WorkbookError;
use std::fmt::Display;

/// Placement and cosmetics of every generated pivot sheet.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LayoutOptions {
    /// Zero-based (row, column) of the pivot table's top-left cell
    pub anchor: (usize, usize),
    /// Width, in characters, given to the leading destination columns
    pub column_width: f64,
    /// Number of leading destination columns that receive `column_width`
    pub width_columns: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        LayoutOptions {
            anchor: (4, 0),
            column_width: 15.0,
            width_columns: 13,
        }
    }
}

/// Why a pivot specification produced no sheet
#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    MissingSheetName,
    SheetExists(String),
    InvalidSheetName(String, &'static str),
    NoHeader(String),
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingSheetName => write!(f, "sheet_name is missing or blank"),
            SkipReason::SheetExists(name) => write!(f, "sheet '{name}' already exists"),
            SkipReason::InvalidSheetName(name, reason) => write!(f, "sheet name '{name}' {reason}"),
            SkipReason::NoHeader(sheet) => write!(f, "source sheet '{sheet}' has no header row"),
        }
    }
}

/// Fields that ended up on a created pivot table, as source column indexes
#[derive(Clone, Debug, PartialEq)]
pub struct PivotLayout {
    pub destination: String,
    pub source_sheet: String,
    pub area: SourceArea,
    pub row_labels: Vec<usize>,
    pub column_labels: Vec<usize>,
    pub data_fields: Vec<DataField>,
    pub filters: Vec<usize>,
    /// Requested fields left out: unknown columns and conflicting axes
    pub dropped: usize,
}

impl PivotLayout {
    fn new(destination: &str, pivot: &PivotTable, dropped: usize) -> Self {
        let first_col = pivot.area().first_col;
        let to_source = |offsets: &[usize]| -> Vec<usize> { offsets.iter().map(|offset| first_col + offset).collect() };
        PivotLayout {
            destination: destination.to_owned(),
            source_sheet: pivot.source_sheet().to_owned(),
            area: pivot.area(),
            row_labels: to_source(pivot.row_labels()),
            column_labels: to_source(pivot.column_labels()),
            data_fields: pivot
                .data_fields()
                .iter()
                .map(|field| DataField { column: first_col + field.column, ..field.clone() })
                .collect(),
            filters: to_source(pivot.report_filters()),
            dropped,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Created(PivotLayout),
    Skipped(SkipReason),
}

/// Compiles pivot specifications into pivot sheets of a destination workbook.
pub struct PivotCompiler<'a> {
    workbook: &'a mut PivotWorkbook,
    options: LayoutOptions,
}

impl<'a> PivotCompiler<'a> {
    pub fn new(workbook: &'a mut PivotWorkbook, options: LayoutOptions) -> Self {
        PivotCompiler { workbook, options }
    }

    /// Adds one pivot sheet for `spec` over `source`.
    ///
    /// Conditions that only concern this spec are reported as `Outcome::Skipped`;
    /// an `Err` means the destination workbook can no longer be trusted.
    pub fn compile(&mut self, source: &Sheet, spec: &PivotSpec) -> Result<Outcome, RustyPivotError> {
        let Some(destination) = spec.destination() else {
            return Ok(self.skip(source, SkipReason::MissingSheetName));
        };
        match self.workbook.check_sheet_name(destination) {
            Ok(()) => (),
            Err(WorkbookError::DuplicateSheetError(name)) => return Ok(self.skip(source, SkipReason::SheetExists(name))),
            Err(WorkbookError::InvalidSheetNameError(name, reason)) => {
                return Ok(self.skip(source, SkipReason::InvalidSheetName(name, reason)))
            }
            Err(error) => Err(error)?,
        }
        let Some(area) = SourceArea::resolve(source) else {
            return Ok(self.skip(source, SkipReason::NoHeader(source.name().to_owned())));
        };

        let sheet = self.workbook.create_sheet(destination)?;
        for col in 0..self.options.width_columns {
            self.workbook.set_column_width(sheet, col, self.options.column_width)?;
        }
        let index = HeaderIndex::build(source);
        let pivot = self.workbook.create_pivot_table(sheet, source, area, self.options.anchor)?;
        log::info!(
            "Creating pivot '{}' on sheet '{}' at {} over '{}'!{}",
            pivot.name(),
            destination,
            index_to_reference(self.options.anchor.0, self.options.anchor.1),
            source.name(),
            area.reference()
        );

        let mut dropped = 0;
        for name in &spec.dimension {
            dropped += assign(pivot, &index, name, destination, |pivot, col| pivot.add_row_label(col))?;
        }
        for entry in &spec.matrix {
            let column = entry.column.as_str();
            dropped += match entry.operation.data_field(column) {
                Some((aggregation, label)) => {
                    assign(pivot, &index, column, destination, |pivot, col| pivot.add_data_field(aggregation, col, &label))?
                }
                None if entry.operation == Operation::Column => {
                    assign(pivot, &index, column, destination, |pivot, col| pivot.add_column_label(col))?
                }
                None => assign(pivot, &index, column, destination, |pivot, col| pivot.add_row_label(col))?,
            };
        }
        for name in &spec.filters {
            dropped += assign(pivot, &index, name, destination, |pivot, col| pivot.add_report_filter(col))?;
        }

        let layout = PivotLayout::new(destination, pivot, dropped);
        log::info!(
            "Sheet '{}': {} row labels, {} column labels, {} data fields, {} filters",
            destination,
            layout.row_labels.len(),
            layout.column_labels.len(),
            layout.data_fields.len(),
            layout.filters.len()
        );
        Ok(Outcome::Created(layout))
    }

    fn skip(&self, source: &Sheet, reason: SkipReason) -> Outcome {
        log::warn!("Skipping pivot for sheet '{}': {}", source.name(), reason);
        Outcome::Skipped(reason)
    }
}

/// Resolves `name` and hands its column to `add`; returns the number of dropped fields (0 or 1)
fn assign<F>(pivot: &mut PivotTable, index: &HeaderIndex, name: &str, destination: &str, add: F) -> Result<usize, WorkbookError>
where
    F: FnOnce(&mut PivotTable, usize) -> Result<FieldChange, WorkbookError>,
{
    let Some(col) = index.lookup(name) else {
        log::warn!("Sheet '{}': column '{}' not found in the header of '{}'", destination, name, pivot.source_sheet());
        return Ok(1);
    };
    match add(pivot, col)? {
        FieldChange::Added => Ok(0),
        FieldChange::Duplicate => {
            log::debug!("Sheet '{}': column '{}' is already in that role", destination, name);
            Ok(0)
        }
        FieldChange::AxisConflict(axis) => {
            log::warn!("Sheet '{}': column '{}' is already a {} and cannot move to another axis", destination, name, axis);
            Ok(1)
        }
    }
}
