//! Parsing delimited files into typed records.
//!
//! Most callers should use [`CsvParser`] (or [`parse_csv_from_path`]), which:
//!
//! - reads the header line and binds each [`crate::record::Record`] field to a column
//! - coerces every cell with the rules in [`coerce`]
//! - optionally reports success/failure/alerts to an [`IngestionObserver`]

pub mod coerce;
pub mod csv;
pub mod observability;

pub use self::csv::{CsvParser, ParseOptions, parse_csv_from_path};
pub use observability::{
    CompositeObserver, FileObserver, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats,
    TracingObserver, severity_for_error,
};
