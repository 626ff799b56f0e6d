//! # Pivot Layout Compiler
//!
//! Turns pivot specifications written against column names into pivot tables
//! on new sheets of the destination workbook.
//!
//! - [`spec`] parses the configuration into typed specifications
//! - [`header`] maps header text to column positions, case-insensitively
//! - [`range`] resolves the source area a pivot cache reads from
//! - [`compiler`] creates one pivot sheet per specification
//! - [`matcher`] joins source sheets to configuration keys
pub mod compiler;
pub mod header;
pub mod matcher;
pub mod range;
pub mod spec;

pub use compiler::LayoutOptions;
pub use compiler::Outcome;
pub use compiler::PivotCompiler;
pub use compiler::PivotLayout;
pub use compiler::SkipReason;
pub use header::HeaderIndex;
pub use matcher::compile_workbook;
pub use matcher::CompiledPivot;
pub use range::SourceArea;
pub use spec::ConfigError;
pub use spec::MatrixEntry;
pub use spec::Operation;
pub use spec::PivotConfig;
pub use spec::PivotSpec;
