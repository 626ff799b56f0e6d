//! # Rusty Pivot
//!
//! Compiles declarative pivot specifications into pivot tables of an xlsx workbook.
//!
//! The configuration maps source sheet names to lists of pivot specifications:
//!
//! ```json
//! {"house_data": [{"sheet_name": "summary",
//!                  "dimension": ["Unit", "Camp Name"],
//!                  "matrix": [{"column": "Date", "operation": "column"},
//!                             {"column": "House Id", "operation": "count"}],
//!                  "Filter": ["Sub Group"]}]}
//! ```
//!
//! Each specification becomes a new sheet holding one pivot table anchored at `A5`.
//! Column names are resolved against the header row of the source sheet,
//! case-insensitively. The pivot cache is refreshed by the spreadsheet application
//! when the file is opened; no aggregation happens here.
//!
//! ## Modules
//!
//! - `spreadsheet`: reads sheet names, header rows and data extents of the source
//! - `pivot`: parses the configuration and lays out pivot tables
//! - `workbook`: writes the destination package with the new pivot parts
pub mod error;
pub(crate) mod helpers;
pub mod logging;
pub mod pivot;
pub mod spreadsheet;
pub mod workbook;

use crate::error::ResultMessage;
use crate::pivot::compile_workbook;
use crate::pivot::CompiledPivot;
use crate::pivot::LayoutOptions;
use crate::pivot::Outcome;
use crate::pivot::PivotConfig;
use crate::pivot::PivotLayout;
use crate::pivot::SkipReason;
use crate::spreadsheet::PackageLimits;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::XlsxSpreadsheet;
use crate::workbook::PivotWorkbook;

pub use crate::error::RustyPivotError;

/// Options of one run
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RunOptions {
    pub limits: PackageLimits,
    pub layout: LayoutOptions,
}

/// What a run did, one entry per pivot specification that matched a source sheet
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub pivots: Vec<CompiledPivot>,
}

impl RunSummary {
    pub fn created(&self) -> impl Iterator<Item = &PivotLayout> {
        self.pivots.iter().filter_map(|pivot| match &pivot.outcome {
            Outcome::Created(layout) => Some(layout),
            Outcome::Skipped(_) => None,
        })
    }

    /// (source sheet, reason) of every skipped specification
    pub fn skipped(&self) -> impl Iterator<Item = (&str, &SkipReason)> {
        self.pivots.iter().filter_map(|pivot| match &pivot.outcome {
            Outcome::Created(_) => None,
            Outcome::Skipped(reason) => Some((pivot.source_sheet.as_str(), reason)),
        })
    }
}

/// Reads `input`, adds the pivot sheets described by `config`, and writes the result to `output`.
///
/// A malformed configuration is rejected before the source is opened. The output
/// file only appears once it has been written completely.
///
/// # Arguments
/// * `input` - Path of the source xlsx workbook
/// * `config` - Configuration JSON text
/// * `output` - Path of the destination workbook
/// * `options` - Package limits and pivot placement
pub fn run(input: &str, config: &str, output: &str, options: &RunOptions) -> Result<RunSummary, RustyPivotError> {
    let config = PivotConfig::parse(config).with_prefix("Invalid configuration")?;
    if config.is_empty() {
        log::warn!("Configuration names no source sheet");
    }

    let mut source = XlsxSpreadsheet::open(input, options.limits)?;
    log::info!("Read '{}': {} sheet(s)", input, source.sheet_names().len());
    let mut workbook = PivotWorkbook::from_source(&mut source)?;
    let pivots = compile_workbook(&mut source, &config, &mut workbook, options.layout)?;

    workbook.save(output).with_prefix(output)?;
    let summary = RunSummary { pivots };
    log::info!(
        "Wrote '{}': {} pivot sheet(s) created, {} skipped",
        output,
        summary.created().count(),
        summary.skipped().count()
    );
    Ok(summary)
}
