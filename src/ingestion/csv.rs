//! Header-driven CSV parsing into [`Record`] types.
//!
//! Format rules:
//!
//! - the first non-empty line is the header; a file without one fails with
//!   [`IngestionError::EmptyInput`]
//! - fields are split on `,` with no quoting or escaping, so values cannot contain commas
//! - blank and whitespace-only lines are skipped
//! - a record field binds to the header column equal to the snake-case form of its name;
//!   unmatched fields and short rows leave the field at its zero value
//! - cells are coerced per field by [`super::coerce::coerce`]; a bad cell never fails the file

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use csv::ByteRecord;

use crate::error::{IngestionError, IngestionResult};
use crate::record::Record;
use crate::types::Field;

use super::coerce::coerce;
use super::observability::{
    IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats, severity_for_error,
};

/// Options controlling [`CsvParser`] reporting.
#[derive(Clone)]
pub struct ParseOptions {
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// Parses delimited files into fully materialized `Vec<T>`.
///
/// When an observer is configured, each call reports:
///
/// - `on_success` with the record count
/// - `on_failure` with a computed severity
/// - `on_alert` when that severity is >= `options.alert_at_or_above`
///
/// ```no_run
/// use std::sync::Arc;
///
/// use folder_ingest::ingestion::{CsvParser, ParseOptions, TracingObserver};
/// # use folder_ingest::record::Record;
/// # use folder_ingest::types::{DataType, Field, Schema, Value};
/// # #[derive(Default)]
/// # struct Person { id: i64 }
/// # impl Record for Person {
/// #     fn schema() -> Schema { Schema::new(vec![Field::new("id", DataType::Int64)]) }
/// #     fn set_field(&mut self, name: &str, value: Value) {
/// #         if name == "id" { value.assign_to(&mut self.id) }
/// #     }
/// #     fn to_row(&self) -> Vec<Value> { vec![self.id.into()] }
/// # }
///
/// # fn main() -> Result<(), folder_ingest::IngestionError> {
/// let parser = CsvParser::new(ParseOptions {
///     observer: Some(Arc::new(TracingObserver)),
///     ..Default::default()
/// });
/// let people: Vec<Person> = parser.parse("import/person/people.csv")?;
/// println!("rows={}", people.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CsvParser {
    options: ParseOptions,
}

impl CsvParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    /// Parse the file at `path`.
    pub fn parse<T: Record>(&self, path: impl AsRef<Path>) -> IngestionResult<Vec<T>> {
        let path = path.as_ref();
        let result = File::open(path)
            .map_err(IngestionError::from)
            .and_then(|file| read_records::<T, _>(file, path));
        self.report::<T>(path, result)
    }

    /// Parse from any reader; `input_name` identifies the input in errors and observer events.
    pub fn parse_reader<T: Record, R: Read>(
        &self,
        reader: R,
        input_name: impl AsRef<Path>,
    ) -> IngestionResult<Vec<T>> {
        let input = input_name.as_ref();
        let result = read_records::<T, _>(reader, input);
        self.report::<T>(input, result)
    }

    fn report<T>(&self, input: &Path, result: IngestionResult<Vec<T>>) -> IngestionResult<Vec<T>> {
        if let Some(obs) = self.options.observer.as_ref() {
            let ctx = IngestionContext {
                input: input.to_path_buf(),
                record_type: std::any::type_name::<T>(),
            };
            match &result {
                Ok(rows) => obs.on_success(&ctx, IngestionStats { rows: rows.len() }),
                Err(e) => {
                    let sev = severity_for_error(e);
                    obs.on_failure(&ctx, sev, e);
                    if sev >= self.options.alert_at_or_above {
                        obs.on_alert(&ctx, sev, e);
                    }
                }
            }
        }
        result
    }
}

/// Parse the file at `path` with default options.
pub fn parse_csv_from_path<T: Record>(path: impl AsRef<Path>) -> IngestionResult<Vec<T>> {
    CsvParser::default().parse(path)
}

fn read_records<T: Record, R: Read>(reader: R, input: &Path) -> IngestionResult<Vec<T>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    let mut record = ByteRecord::new();
    if !rdr.read_byte_record(&mut record)? {
        return Err(IngestionError::EmptyInput {
            input: input.display().to_string(),
        });
    }
    let headers: Vec<String> = record
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = String::from_utf8_lossy(h);
            if i == 0 {
                h.trim_start_matches('\u{feff}').to_owned()
            } else {
                h.into_owned()
            }
        })
        .collect();

    // Resolve field -> header column once per file.
    let schema = T::schema();
    let bindings: Vec<(&Field, Option<usize>)> = schema
        .fields
        .iter()
        .map(|field| {
            let header = field.header();
            (field, headers.iter().position(|h| *h == header))
        })
        .collect();

    let mut out = Vec::new();
    while rdr.read_byte_record(&mut record)? {
        if is_blank(&record) {
            continue;
        }

        let mut item = T::default();
        for (field, idx) in &bindings {
            let Some(raw) = idx.and_then(|i| record.get(i)) else {
                continue;
            };
            if let Some(value) = coerce(field, &String::from_utf8_lossy(raw)) {
                item.set_field(&field.name, value);
            }
        }
        out.push(item);
    }

    tracing::debug!(
        input = %input.display(),
        rows = out.len(),
        "read csv records"
    );
    Ok(out)
}

fn is_blank(record: &ByteRecord) -> bool {
    record.len() == 1 && record[0].iter().all(u8::is_ascii_whitespace)
}
