//! `folder-ingest` watches a fixed set of import folders, turns each new delimited file into typed
//! records and loads those records into a relational store in transactional chunks.
//!
//! ## Pipeline
//!
//! 1. [`watch::FolderWatcher`] attaches one recursive monitor per [`config::WatchTarget`] and
//!    emits a [`watch::FileEvent`] whenever a file matching the filter (default `*.csv`) is
//!    created.
//! 2. [`watch::CategoryDispatcher`] picks the handler bound to the event's category and runs it on
//!    a worker pool, with a scope built just for that event.
//! 3. The handler calls [`ingestion::CsvParser`] to get records of a [`record::Record`] type.
//! 4. The handler passes the records to [`loader::BatchLoader`], which writes them chunk by chunk,
//!    one transaction per chunk.
//!
//! Handlers themselves (what an "office" or "person" import means) live outside this crate.
//!
//! ## Parsing rules
//!
//! - The first non-empty line holds the headers. Each record field maps to the header equal to its snake_case name.
//! - Values are split on `,`; there is no quoting or escaping.
//! - Blank lines are skipped. Unmapped columns are ignored.
//! - Empty or unparsable values fall back to a default: `null` for nullable fields, `true` for
//!   booleans, the current UTC date/time for date and date-time fields. Other fields keep their
//!   zero value.
//! - A boolean is `true` only for the literal `1` (or an empty cell).
//!
//! ## Quick example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use folder_ingest::config::IngestConfig;
//! use folder_ingest::ingestion::CsvParser;
//! use folder_ingest::loader::{BatchLoader, SqliteTarget};
//! use folder_ingest::record::Record;
//! use folder_ingest::types::{DataType, Field, Schema, Value};
//! use folder_ingest::watch::{
//!     CancellationFlag, CategoryDispatcher, DispatchOptions, FileEvent, FolderWatcher,
//! };
//! use folder_ingest::IngestionResult;
//!
//! #[derive(Debug, Default)]
//! struct Office {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Record for Office {
//!     fn schema() -> Schema {
//!         Schema::new(vec![
//!             Field::new("id", DataType::Int64),
//!             Field::new("name", DataType::Utf8),
//!         ])
//!     }
//!
//!     fn set_field(&mut self, name: &str, value: Value) {
//!         match name {
//!             "id" => value.assign_to(&mut self.id),
//!             "name" => value.assign_to(&mut self.name),
//!             _ => {}
//!         }
//!     }
//!
//!     fn to_row(&self) -> Vec<Value> {
//!         vec![self.id.into(), self.name.clone().into()]
//!     }
//! }
//!
//! # fn main() -> IngestionResult<()> {
//! let config = IngestConfig::load("ingest.toml")?;
//! let db = SqliteTarget::new(config.database_path.clone().unwrap_or_else(|| "import.sqlite3".into()));
//! db.create_table::<Office>("office")?;
//!
//! let batch_size = config.load.batch_size;
//! let retry = config.load.retry;
//! let dispatcher = CategoryDispatcher::new(
//!     move |_: &FileEvent| -> IngestionResult<SqliteTarget> { Ok(db.clone()) },
//!     DispatchOptions { workers: config.workers, resolution: config.resolution },
//! )?
//! .bind("office", move |event: &FileEvent, db: &mut SqliteTarget| -> IngestionResult<()> {
//!     let offices = CsvParser::default().parse::<Office>(&event.path)?;
//!     BatchLoader::new(retry).bulk_insert(&offices, db, "office", batch_size)?;
//!     Ok(())
//! });
//!
//! let watcher = FolderWatcher::start(
//!     &config.resolved_targets(),
//!     &config.file_filter()?,
//!     Arc::new(dispatcher),
//!     &CancellationFlag::new(),
//! )?;
//! // ... run until shutdown ...
//! watcher.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod ingestion;
pub mod loader;
pub mod record;
pub mod types;
pub mod watch;

pub use error::{IngestionError, IngestionResult};
