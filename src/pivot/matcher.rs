use crate::error::ResultMessage;
use crate::error::RustyPivotError;
use crate::pivot::compiler::LayoutOptions;
use crate::pivot::compiler::Outcome;
use crate::pivot::compiler::PivotCompiler;
use crate::pivot::compiler::SkipReason;
use crate::pivot::spec::PivotConfig;
use crate::pivot::spec::PivotSpec;
use crate::spreadsheet::Spreadsheet;
use crate::workbook::PivotWorkbook;
use std::collections::HashMap;

/// Outcome of one pivot specification
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledPivot {
    pub source_sheet: String,
    pub outcome: Outcome,
}

/// Runs every specification whose key names a source sheet, sheet by sheet in
/// workbook order and spec by spec in configuration order.
///
/// Keys matching no source sheet are ignored, as are sheets without a key.
pub fn compile_workbook<S: Spreadsheet>(
    source: &mut S,
    config: &PivotConfig,
    workbook: &mut PivotWorkbook,
    options: LayoutOptions,
) -> Result<Vec<CompiledPivot>, RustyPivotError> {
    let mut pending: HashMap<&str, &[PivotSpec]> = config.sheets().collect();
    let mut compiler = PivotCompiler::new(workbook, options);
    let mut compiled = Vec::with_capacity(config.spec_count());

    for sheet_name in source.sheet_names() {
        let Some(specs) = pending.remove(sheet_name.as_str()) else {
            continue;
        };
        let sheet = source.read_sheet(&sheet_name).with_prefix(&sheet_name)?;
        if !sheet.has_header() {
            log::warn!(
                "Sheet '{}' of '{}' has no header row; its {} pivot(s) are skipped",
                sheet_name,
                sheet.file_name(),
                specs.len()
            );
            compiled.extend(specs.iter().map(|_| CompiledPivot {
                source_sheet: sheet_name.to_owned(),
                outcome: Outcome::Skipped(SkipReason::NoHeader(sheet_name.to_owned())),
            }));
            continue;
        }
        for spec in specs {
            let outcome = compiler.compile(&sheet, spec)?;
            compiled.push(CompiledPivot {
                source_sheet: sheet_name.to_owned(),
                outcome,
            });
        }
    }

    let mut unmatched: Vec<&str> = pending.into_keys().collect();
    unmatched.sort_unstable();
    for key in unmatched {
        log::debug!("No source sheet named '{}'; its pivots are ignored", key);
    }
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::Sheet;
    use crate::workbook::tests::empty_workbook;

    /// In-memory source workbook
    struct Sheets(Vec<Sheet>);

    impl Spreadsheet for Sheets {
        fn name(&self) -> String {
            "memory.xlsx".to_owned()
        }

        fn sheet_names(&self) -> Vec<String> {
            self.0.iter().map(|sheet| sheet.name().to_owned()).collect()
        }

        fn read_sheet(&mut self, sheet_name: &str) -> Result<Sheet, RustyPivotError> {
            Ok(self.0.iter().find(|sheet| sheet.name() == sheet_name).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn test_join_follows_workbook_order() {
        let mut source = Sheets(vec![
            Sheet::with_header("first", &["A"], 2),
            Sheet::with_header("second", &["B"], 2),
            Sheet::new("memory.xlsx", "blank"),
        ]);
        let config = PivotConfig::parse(
            r#"{"second":[{"sheet_name":"s2","dimension":["B"]}],
                "missing":[{"sheet_name":"never"}],
                "First":[{"sheet_name":"case"}],
                "first":[{"sheet_name":"s1a"},{"sheet_name":"s1b"}],
                "blank":[{"sheet_name":"b1"}]}"#,
        )
        .unwrap();
        let mut workbook = empty_workbook();
        let compiled = compile_workbook(&mut source, &config, &mut workbook, LayoutOptions::default()).unwrap();

        let created: Vec<&str> = compiled
            .iter()
            .filter_map(|pivot| match &pivot.outcome {
                Outcome::Created(layout) => Some(layout.destination.as_str()),
                Outcome::Skipped(_) => None,
            })
            .collect();
        assert_eq!(created, vec!["s1a", "s1b", "s2"]);
        assert_eq!(compiled.len(), 4);
        assert_eq!(compiled[3].outcome, Outcome::Skipped(SkipReason::NoHeader("blank".to_owned())));
        assert_eq!(workbook.new_sheet_names(), vec!["s1a", "s1b", "s2"]);
    }
}
