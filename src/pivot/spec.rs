//! Typed form of the pivot configuration.
//!
//! The configuration is a JSON object mapping source sheet names to lists of
//! pivot specifications. Structural problems are fatal; problems confined to
//! a single matrix entry drop that entry with a warning.

use crate::error::RustyPivotError;
use crate::workbook::Aggregation;
use serde_json::Map;
use serde_json::Value;
use std::fmt::Display;
use thiserror::Error;

const KEY_SHEET_NAME: &str = "sheet_name";
const KEY_DIMENSION: &str = "dimension";
const KEY_MATRIX: &str = "matrix";
const KEY_FILTER: &str = "Filter";
const KEY_COLUMN: &str = "column";
const KEY_OPERATION: &str = "operation";

/// Errors raised for a configuration that cannot be used at all.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration must be an object keyed by source sheet name, found {0}")]
    NotAnObjectError(&'static str),

    #[error("Pivots for sheet '{0}' must be a list, found {1}")]
    SpecListError(String, &'static str),

    #[error("Pivot #{1} for sheet '{0}' must be an object, found {2}")]
    SpecNotObjectError(String, usize, &'static str),

    #[error("Pivot #{1} for sheet '{0}': '{2}' must be {3}, found {4}")]
    FieldTypeError(String, usize, &'static str, &'static str, &'static str),
}

/// What a matrix entry does with its column.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Count,
    Sum,
    Average,
    /// Column axis, not aggregated
    Column,
    /// Additional row axis
    Row,
}

impl Operation {
    /// Matches an operation name case-insensitively
    pub fn parse(name: &str) -> Option<Operation> {
        match name.to_lowercase().as_str() {
            "count" => Some(Operation::Count),
            "sum" => Some(Operation::Sum),
            "avg" => Some(Operation::Average),
            "column" => Some(Operation::Column),
            "row" => Some(Operation::Row),
            _ => None,
        }
    }

    /// Aggregation and display label of a data field, `None` for axis operations
    pub fn data_field(&self, column: &str) -> Option<(Aggregation, String)> {
        match self {
            Operation::Count => Some((Aggregation::Count, format!("Count of {column}"))),
            Operation::Sum => Some((Aggregation::Sum, format!("Sum of {column}"))),
            Operation::Average => Some((Aggregation::Average, format!("Avg of {column}"))),
            Operation::Column | Operation::Row => None,
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Count => write!(f, "count"),
            Operation::Sum => write!(f, "sum"),
            Operation::Average => write!(f, "avg"),
            Operation::Column => write!(f, "column"),
            Operation::Row => write!(f, "row"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatrixEntry {
    pub column: String,
    pub operation: Operation,
}

/// One pivot request for a source sheet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PivotSpec {
    /// Destination sheet name as written; blank or absent names are rejected by the compiler
    pub sheet_name: Option<String>,
    pub dimension: Vec<String>,
    pub matrix: Vec<MatrixEntry>,
    pub filters: Vec<String>,
}

impl PivotSpec {
    /// Destination name as written, unless it is absent or only whitespace
    pub fn destination(&self) -> Option<&str> {
        self.sheet_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
    }
}

/// Pivot specifications grouped by source sheet name, in configuration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PivotConfig {
    sheets: Vec<(String, Vec<PivotSpec>)>,
}

impl PivotConfig {
    /// Parses configuration text
    pub fn parse(text: &str) -> Result<PivotConfig, RustyPivotError> {
        let value: Value = serde_json::from_str(text)?;
        Ok(PivotConfig::from_value(&value)?)
    }

    pub fn from_value(value: &Value) -> Result<PivotConfig, ConfigError> {
        let Value::Object(object) = value else {
            return Err(ConfigError::NotAnObjectError(kind_of(value)));
        };
        let mut sheets = Vec::with_capacity(object.len());
        for (sheet, value) in object {
            let Value::Array(items) = value else {
                return Err(ConfigError::SpecListError(sheet.to_owned(), kind_of(value)));
            };
            let specs = items
                .iter()
                .enumerate()
                .map(|(index, item)| parse_spec(sheet, index + 1, item))
                .collect::<Result<Vec<_>, _>>()?;
            sheets.push((sheet.to_owned(), specs));
        }
        Ok(PivotConfig { sheets })
    }

    /// (source sheet, specs) pairs in configuration order
    pub fn sheets(&self) -> impl Iterator<Item = (&str, &[PivotSpec])> {
        self.sheets.iter().map(|(name, specs)| (name.as_str(), specs.as_slice()))
    }

    pub fn spec_count(&self) -> usize {
        self.sheets.iter().map(|(_, specs)| specs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

fn parse_spec(sheet: &str, index: usize, value: &Value) -> Result<PivotSpec, ConfigError> {
    let Value::Object(object) = value else {
        return Err(ConfigError::SpecNotObjectError(sheet.to_owned(), index, kind_of(value)));
    };
    let type_error = |field: &'static str, expected: &'static str, found: &Value| {
        ConfigError::FieldTypeError(sheet.to_owned(), index, field, expected, kind_of(found))
    };

    let sheet_name = match object.get(KEY_SHEET_NAME) {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) => Some(name.to_owned()),
        Some(other) => return Err(type_error(KEY_SHEET_NAME, "text", other)),
    };
    let dimension = text_list(object, KEY_DIMENSION).map_err(|found| type_error(KEY_DIMENSION, "a list of text", found))?;
    let filters = text_list(object, KEY_FILTER).map_err(|found| type_error(KEY_FILTER, "a list of text", found))?;

    let mut matrix = Vec::new();
    match object.get(KEY_MATRIX) {
        None | Some(Value::Null) => (),
        Some(Value::Array(entries)) => {
            for entry in entries {
                let Value::Object(entry) = entry else {
                    return Err(type_error(KEY_MATRIX, "a list of objects", entry));
                };
                let column = match entry.get(KEY_COLUMN) {
                    Some(Value::String(column)) => column,
                    None | Some(Value::Null) => {
                        log::warn!("Pivot #{} for sheet '{}': matrix entry without a column is dropped", index, sheet);
                        continue;
                    }
                    Some(other) => return Err(type_error(KEY_COLUMN, "text", other)),
                };
                let name = match entry.get(KEY_OPERATION) {
                    Some(Value::String(name)) => name,
                    None | Some(Value::Null) => {
                        log::warn!("Pivot #{} for sheet '{}': matrix entry for '{}' has no operation and is dropped", index, sheet, column);
                        continue;
                    }
                    Some(other) => return Err(type_error(KEY_OPERATION, "text", other)),
                };
                match Operation::parse(name) {
                    Some(operation) => matrix.push(MatrixEntry { column: column.to_owned(), operation }),
                    None => log::warn!(
                        "Pivot #{} for sheet '{}': unknown operation '{}' for column '{}' is dropped",
                        index,
                        sheet,
                        name,
                        column
                    ),
                }
            }
        }
        Some(other) => return Err(type_error(KEY_MATRIX, "a list of objects", other)),
    }

    Ok(PivotSpec { sheet_name, dimension, matrix, filters })
}

/// Reads an optional list of text; the error carries the offending value
fn text_list<'a>(object: &'a Map<String, Value>, key: &str) -> Result<Vec<String>, &'a Value> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_owned).ok_or(item))
            .collect(),
        Some(other) => Err(other),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "text",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_spec() {
        let config = PivotConfig::parse(
            r#"{"house_data":[{"sheet_name":"summary","dimension":["Unit","Camp Name"],
                "matrix":[{"column":"Date","operation":"column"},{"column":"House Id","operation":"Count"}],
                "Filter":["Sub Group"]}]}"#,
        )
        .unwrap();
        let (sheet, specs) = config.sheets().next().unwrap();
        assert_eq!(sheet, "house_data");
        assert_eq!(
            specs,
            &[PivotSpec {
                sheet_name: Some("summary".to_owned()),
                dimension: vec!["Unit".to_owned(), "Camp Name".to_owned()],
                matrix: vec![
                    MatrixEntry { column: "Date".to_owned(), operation: Operation::Column },
                    MatrixEntry { column: "House Id".to_owned(), operation: Operation::Count },
                ],
                filters: vec!["Sub Group".to_owned()],
            }]
        );
    }

    #[test]
    fn test_optional_fields() {
        let config = PivotConfig::parse(r#"{"s":[{"dimension":["Unit"],"matrix":[]},{"sheet_name":"  ","Filter":null}]}"#).unwrap();
        let (_, specs) = config.sheets().next().unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].destination(), None);
        assert_eq!(specs[1].destination(), None);
        assert!(specs[1].filters.is_empty());
        assert_eq!(config.spec_count(), 2);
    }

    #[test]
    fn test_destination_keeps_surrounding_spaces() {
        let spec = PivotSpec { sheet_name: Some("  summary ".to_owned()), ..Default::default() };
        assert_eq!(spec.destination(), Some("  summary "));
        let blank = PivotSpec { sheet_name: Some(" \t".to_owned()), ..Default::default() };
        assert_eq!(blank.destination(), None);
    }

    #[test]
    fn test_unknown_operation_dropped() {
        let config = PivotConfig::parse(
            r#"{"s":[{"sheet_name":"x","matrix":[{"column":"A","operation":"median"},{"column":"B","operation":"SUM"},{"operation":"count"}]}]}"#,
        )
        .unwrap();
        let (_, specs) = config.sheets().next().unwrap();
        assert_eq!(specs[0].matrix, vec![MatrixEntry { column: "B".to_owned(), operation: Operation::Sum }]);
    }

    #[test]
    fn test_malformed_configuration() {
        assert!(matches!(PivotConfig::parse("{not json"), Err(RustyPivotError::JsonError(_))));
        assert!(matches!(
            PivotConfig::parse("[1]"),
            Err(RustyPivotError::ConfigError(ConfigError::NotAnObjectError("a list")))
        ));
        assert!(matches!(
            PivotConfig::parse(r#"{"s":{"sheet_name":"x"}}"#),
            Err(RustyPivotError::ConfigError(ConfigError::SpecListError(_, _)))
        ));
        assert!(matches!(
            PivotConfig::parse(r#"{"s":["summary"]}"#),
            Err(RustyPivotError::ConfigError(ConfigError::SpecNotObjectError(_, 1, "text")))
        ));
        assert!(matches!(
            PivotConfig::parse(r#"{"s":[{"sheet_name":"x","dimension":"Unit"}]}"#),
            Err(RustyPivotError::ConfigError(ConfigError::FieldTypeError(_, 1, "dimension", _, _)))
        ));
    }

    #[test]
    fn test_operation_labels_keep_case() {
        assert_eq!(Operation::parse("AvG"), Some(Operation::Average));
        assert_eq!(Operation::parse("average"), None);
        assert_eq!(
            Operation::Average.data_field("house id"),
            Some((Aggregation::Average, "Avg of house id".to_owned()))
        );
        assert_eq!(Operation::Row.data_field("Unit"), None);
    }
}
