//! Store tests: keyed bulk upsert counts, unordered write errors, sequences, file-DB fixture.

use remdex::engine::{DocumentStore, SqliteStore, UpsertOp};
use remdex::pipeline::{Transformer, to_upsert_op};
use remdex::utils::config::FILE_INDEX_COLLECTION;
use remdex::{FileRecord, RemoteEntry};
use rusqlite::types::Value;

fn record(dir: &str, name: &str, size: u64, modified_ms: i64) -> FileRecord {
    let entry = RemoteEntry::child_of(dir, name, size, modified_ms, false);
    Transformer::default().extract(&entry).unwrap()
}

fn ops(records: &[FileRecord]) -> Vec<UpsertOp> {
    records.iter().map(to_upsert_op).collect()
}

#[test]
fn test_bulk_upsert_inserts_then_updates() {
    let store = SqliteStore::open_in_memory().unwrap();
    let first = [
        record("/data", "a.pdf", 1, 10),
        record("/data", "b.pdf", 2, 20),
        record("/data", "c.pdf", 3, 30),
    ];
    let res = store
        .bulk_upsert(FILE_INDEX_COLLECTION, &ops(&first))
        .unwrap();
    assert_eq!(res.inserted, 3);
    assert_eq!(res.updated, 0);
    assert!(res.write_errors.is_empty());

    let second = [
        record("/data", "a.pdf", 100, 11),
        record("/data", "b.pdf", 200, 21),
        record("/data", "d.pdf", 4, 40),
    ];
    let res = store
        .bulk_upsert(FILE_INDEX_COLLECTION, &ops(&second))
        .unwrap();
    assert_eq!(res.inserted, 1);
    assert_eq!(res.updated, 2);
    assert_eq!(res.succeeded(), 3);
    assert_eq!(store.count(FILE_INDEX_COLLECTION).unwrap(), 4);

    let row = store.file_row(&second[0].unique_id).unwrap().unwrap();
    assert_eq!(row.file_size, 100);
    assert_eq!(row.last_modified_ms, 11);
}

#[test]
fn test_same_path_is_one_document() {
    let store = SqliteStore::open_in_memory().unwrap();
    let r = record("/data/a", "x.pdf", 1024, 1_700_000_000_000);
    for _ in 0..3 {
        store
            .bulk_upsert(FILE_INDEX_COLLECTION, &ops(std::slice::from_ref(&r)))
            .unwrap();
    }
    assert_eq!(store.count(FILE_INDEX_COLLECTION).unwrap(), 1);
}

#[test]
fn test_rejected_op_does_not_stop_batch() {
    let store = SqliteStore::open_in_memory().unwrap();
    let records = [
        record("/data", "a.pdf", 1, 10),
        record("/data", "b.pdf", 2, 20),
        record("/data", "c.pdf", 3, 30),
    ];
    let mut batch = ops(&records);
    for (field, value) in batch[1].set.iter_mut() {
        if *field == "indexing_status" {
            *value = Value::Text("BOGUS".to_string());
        }
    }

    let res = store.bulk_upsert(FILE_INDEX_COLLECTION, &batch).unwrap();
    assert_eq!(res.inserted, 2);
    assert_eq!(res.write_errors.len(), 1);
    assert_eq!(res.write_errors[0].index, 1);
    assert_eq!(res.write_errors[0].key, records[1].unique_id);
    assert!(store.file_row(&records[1].unique_id).unwrap().is_none());
    assert!(store.file_row(&records[2].unique_id).unwrap().is_some());
}

#[test]
fn test_bulk_upsert_rejects_bad_collection_name() {
    let store = SqliteStore::open_in_memory().unwrap();
    let r = record("/data", "a.pdf", 1, 10);
    assert!(
        store
            .bulk_upsert("file_index; DROP TABLE file_index", &ops(&[r]))
            .is_err()
    );
}

#[test]
fn test_empty_batch() {
    let store = SqliteStore::open_in_memory().unwrap();
    let res = store.bulk_upsert(FILE_INDEX_COLLECTION, &[]).unwrap();
    assert_eq!(res.succeeded(), 0);
    assert_eq!(store.count(FILE_INDEX_COLLECTION).unwrap(), 0);
}

#[test]
fn test_failed_record_row() {
    let store = SqliteStore::open_in_memory().unwrap();
    let transformer = Transformer::default();
    let entry = RemoteEntry::child_of("/data", "old.doc", 5, RemoteEntry::UNKNOWN_MTIME, false);
    let err = transformer.extract(&entry).unwrap_err();
    let failed = transformer.failed_record(&entry, &err);
    store
        .bulk_upsert(FILE_INDEX_COLLECTION, &ops(&[failed.clone()]))
        .unwrap();

    let row = store.file_row(&failed.unique_id).unwrap().unwrap();
    assert_eq!(row.indexing_status, "FAILED");
    assert_eq!(row.reorg_status, "SKIPPED");
    assert_eq!(row.reorg_attempts, 0);
    assert_eq!(row.last_modified_ms, 0);
    assert!(
        row.indexing_error
            .as_deref()
            .unwrap()
            .starts_with("InvalidTimestamp: ")
    );
    assert_eq!(store.count_with_status("FAILED").unwrap(), 1);
    assert_eq!(store.count_with_status("COMPLETED").unwrap(), 0);
}

#[test]
fn test_next_sequence_per_name() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert_eq!(store.next_sequence("index_run").unwrap(), 1);
    assert_eq!(store.next_sequence("index_run").unwrap(), 2);
    assert_eq!(store.next_sequence("other").unwrap(), 1);
    assert_eq!(store.next_sequence("index_run").unwrap(), 3);
}

#[test]
fn test_file_db_persists_across_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("remdex.db");
    {
        let store = SqliteStore::open(&path).unwrap();
        let records = [record("/data", "a.pdf", 1, 10), record("/data", "b.pdf", 2, 20)];
        store
            .bulk_upsert(FILE_INDEX_COLLECTION, &ops(&records))
            .unwrap();
        store.next_sequence("index_run").unwrap();
    }
    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.count(FILE_INDEX_COLLECTION).unwrap(), 2);
    assert_eq!(store.next_sequence("index_run").unwrap(), 2);
}
