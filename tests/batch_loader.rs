use std::sync::{Arc, Mutex};

use folder_ingest::IngestionError;
use folder_ingest::IngestionResult;
use folder_ingest::loader::{
    BatchLoader, BulkConnection, BulkTarget, LoadEvent, LoadObserver, RetryPolicy, bulk_insert,
};
use folder_ingest::record::Record;
use folder_ingest::types::{DataSet, DataType, Field, Schema, Value};

#[derive(Debug, Default, Clone, PartialEq)]
struct Item {
    id: i64,
    label: String,
}

impl Record for Item {
    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Int64),
            Field::new("label", DataType::Utf8),
        ])
    }

    fn set_field(&mut self, name: &str, value: Value) {
        match name {
            "id" => value.assign_to(&mut self.id),
            "label" => value.assign_to(&mut self.label),
            _ => {}
        }
    }

    fn to_row(&self) -> Vec<Value> {
        vec![self.id.into(), self.label.clone().into()]
    }
}

fn items(ids: impl IntoIterator<Item = i64>) -> Vec<Item> {
    ids.into_iter()
        .map(|id| Item {
            id,
            label: format!("item-{id}"),
        })
        .collect()
}

#[derive(Default)]
struct Store {
    committed: Vec<Vec<Vec<Value>>>,
    pending: Option<Vec<Vec<Value>>>,
    writes: usize,
    fail_writes: Vec<usize>,
    rollbacks: usize,
    connects: usize,
}

#[derive(Clone, Default)]
struct MemoryTarget(Arc<Mutex<Store>>);

impl MemoryTarget {
    fn failing_on(writes: &[usize]) -> Self {
        let target = Self::default();
        target.0.lock().unwrap().fail_writes = writes.to_vec();
        target
    }

    fn committed_ids(&self) -> Vec<Vec<i64>> {
        self.0
            .lock()
            .unwrap()
            .committed
            .iter()
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|row| match row[0] {
                        Value::Int64(id) => id,
                        ref other => panic!("unexpected id {other:?}"),
                    })
                    .collect()
            })
            .collect()
    }
}

struct MemoryConnection(Arc<Mutex<Store>>);

impl BulkTarget for MemoryTarget {
    type Connection = MemoryConnection;

    fn connect(&self) -> IngestionResult<MemoryConnection> {
        self.0.lock().unwrap().connects += 1;
        Ok(MemoryConnection(self.0.clone()))
    }
}

impl BulkConnection for MemoryConnection {
    fn begin(&mut self) -> IngestionResult<()> {
        self.0.lock().unwrap().pending = Some(Vec::new());
        Ok(())
    }

    fn write(&mut self, _table: &str, chunk: &DataSet) -> IngestionResult<()> {
        let mut store = self.0.lock().unwrap();
        let n = store.writes;
        store.writes += 1;
        if store.fail_writes.contains(&n) {
            return Err(IngestionError::InvalidInput {
                message: format!("write {n} rejected"),
            });
        }
        store
            .pending
            .as_mut()
            .expect("write outside transaction")
            .extend(chunk.rows.iter().cloned());
        Ok(())
    }

    fn commit(&mut self) -> IngestionResult<()> {
        let mut store = self.0.lock().unwrap();
        let rows = store.pending.take().expect("commit outside transaction");
        store.committed.push(rows);
        Ok(())
    }

    fn rollback(&mut self) -> IngestionResult<()> {
        let mut store = self.0.lock().unwrap();
        store.pending = None;
        store.rollbacks += 1;
        Ok(())
    }
}

#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl LoadObserver for EventLog {
    fn on_event(&self, event: &LoadEvent) {
        let line = match event {
            LoadEvent::RunStarted { chunks, .. } => format!("start {chunks}"),
            LoadEvent::ChunkStarted { index, rows } => format!("chunk {index} ({rows})"),
            LoadEvent::ChunkCommitted { index, attempt, .. } => format!("commit {index}@{attempt}"),
            LoadEvent::ChunkRolledBack { index, attempt, .. } => format!("rollback {index}@{attempt}"),
            LoadEvent::RunFinished { .. } => "finish".to_string(),
            LoadEvent::RunFailed { .. } => "failed".to_string(),
        };
        self.0.lock().unwrap().push(line);
    }
}

#[test]
fn commits_one_transaction_per_chunk() {
    let target = MemoryTarget::default();
    let records = items(0..7);

    let written = bulk_insert(&records, &target, "item", 3).unwrap();

    assert_eq!(written, 7);
    assert_eq!(
        target.committed_ids(),
        vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]
    );
    let store = target.0.lock().unwrap();
    assert_eq!(store.connects, 1);
    assert_eq!(store.rollbacks, 0);
}

#[test]
fn chunk_count_is_ceiling_of_records_over_batch_size() {
    for (m, b) in [(0, 4), (1, 4), (4, 4), (5, 4), (30, 30), (31, 30), (100, 7)] {
        let target = MemoryTarget::default();
        bulk_insert(&items(0..m), &target, "item", b).unwrap();
        assert_eq!(target.committed_ids().len(), (m as usize).div_ceil(b), "m={m} b={b}");
    }
}

#[test]
fn failed_chunk_aborts_and_keeps_earlier_chunks() {
    let target = MemoryTarget::failing_on(&[1]);
    let records = items(0..9);

    let err = bulk_insert(&records, &target, "item", 3).unwrap_err();

    match err {
        IngestionError::InsertFailure {
            table,
            chunk,
            attempts,
            message,
        } => {
            assert_eq!(table, "item");
            assert_eq!(chunk, 1);
            assert_eq!(attempts, 1);
            assert!(message.contains("write 1 rejected"));
        }
        other => panic!("expected InsertFailure, got {other:?}"),
    }
    assert_eq!(target.committed_ids(), vec![vec![0, 1, 2]]);
    let store = target.0.lock().unwrap();
    assert_eq!(store.rollbacks, 1);
    // Chunk 2 is never attempted.
    assert_eq!(store.writes, 2);
}

#[test]
fn aborted_run_still_records_elapsed_and_reports_failure() {
    let log = Arc::new(EventLog::default());
    let loader = BatchLoader::default().with_observer(log.clone());
    let target = MemoryTarget::failing_on(&[1]);

    let _ = loader.bulk_insert(&items(0..9), &target, "item", 3).unwrap_err();

    assert_eq!(
        *log.0.lock().unwrap(),
        vec![
            "start 3",
            "chunk 0 (3)",
            "commit 0@1",
            "chunk 1 (3)",
            "rollback 1@1",
            "failed",
        ]
    );
    let metrics = loader.metrics().snapshot();
    assert!(metrics.elapsed.is_some());
    assert_eq!(metrics.chunks_committed, 1);
    assert_eq!(metrics.rollbacks, 1);
}

#[test]
fn default_policy_does_not_retry() {
    let loader = BatchLoader::default();
    assert_eq!(loader.policy(), RetryPolicy::default());

    let target = MemoryTarget::failing_on(&[0]);
    let err = loader.bulk_insert(&items(0..2), &target, "item", 5).unwrap_err();
    assert!(matches!(err, IngestionError::InsertFailure { attempts: 1, .. }));
    assert!(target.committed_ids().is_empty());
}

#[test]
fn retrying_policy_recovers_from_transient_failure() {
    let log = Arc::new(EventLog::default());
    let loader = BatchLoader::new(RetryPolicy::retrying(3)).with_observer(log.clone());
    let target = MemoryTarget::failing_on(&[1]);

    let written = loader.bulk_insert(&items(0..4), &target, "item", 2).unwrap();

    assert_eq!(written, 4);
    assert_eq!(target.committed_ids(), vec![vec![0, 1], vec![2, 3]]);
    assert_eq!(
        *log.0.lock().unwrap(),
        vec![
            "start 2",
            "chunk 0 (2)",
            "commit 0@1",
            "chunk 1 (2)",
            "rollback 1@1",
            "commit 1@2",
            "finish",
        ]
    );

    let metrics = loader.metrics().snapshot();
    assert_eq!(metrics.chunks_committed, 2);
    assert_eq!(metrics.rows_committed, 4);
    assert_eq!(metrics.attempts, 3);
    assert_eq!(metrics.rollbacks, 1);
}

#[test]
fn retrying_policy_gives_up_after_budget() {
    let loader = BatchLoader::new(RetryPolicy::retrying(2));
    let target = MemoryTarget::failing_on(&[1, 2]);

    let err = loader.bulk_insert(&items(0..4), &target, "item", 2).unwrap_err();

    assert!(matches!(
        err,
        IngestionError::InsertFailure {
            chunk: 1,
            attempts: 2,
            ..
        }
    ));
    assert_eq!(target.committed_ids(), vec![vec![0, 1]]);
}

#[test]
fn zero_batch_size_is_rejected() {
    let target = MemoryTarget::default();
    let err = bulk_insert(&items(0..3), &target, "item", 0).unwrap_err();
    assert!(matches!(err, IngestionError::InvalidInput { .. }));
    assert_eq!(target.0.lock().unwrap().connects, 0);
}

#[cfg(feature = "sqlite")]
mod sqlite {
    use folder_ingest::IngestionError;
    use folder_ingest::loader::{SqliteConnection, SqliteTarget, bulk_insert};

    use super::{Item, items};

    fn count(target: &SqliteTarget, sql: &str) -> i64 {
        SqliteConnection::open(target.path())
            .unwrap()
            .inner()
            .query_row(sql, [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn loads_records_into_created_table() {
        let dir = tempfile::tempdir().unwrap();
        let target = SqliteTarget::new(dir.path().join("import.sqlite3"));
        target.create_table::<Item>("item").unwrap();

        let written = bulk_insert(&items(1..=45), &target, "item", 30).unwrap();

        assert_eq!(written, 45);
        assert_eq!(count(&target, "SELECT COUNT(*) FROM item"), 45);
        assert_eq!(count(&target, "SELECT COUNT(*) FROM item WHERE label = 'item-45'"), 1);
    }

    #[test]
    fn constraint_violation_rolls_back_only_the_failing_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let target = SqliteTarget::new(dir.path().join("import.sqlite3"));
        SqliteConnection::open(target.path())
            .unwrap()
            .inner()
            .execute_batch("CREATE TABLE item (id INTEGER PRIMARY KEY, label TEXT NOT NULL)")
            .unwrap();

        let records = items([1, 2, 3, 4, 3, 6, 7, 8]);
        let err = bulk_insert(&records, &target, "item", 2).unwrap_err();

        assert!(matches!(err, IngestionError::InsertFailure { chunk: 2, .. }));
        assert_eq!(count(&target, "SELECT COUNT(*) FROM item"), 4);
        assert_eq!(count(&target, "SELECT COUNT(*) FROM item WHERE id = 6"), 0);
    }
}
