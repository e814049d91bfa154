use remdex::engine::hashing::{fallback_id, unique_id};
use remdex::engine::progress::RunProgress;
use remdex::engine::tools::{is_temporary_name, path_ends_with_name};
use remdex::engine::{extension_of, format_duration_ms, join_remote, truncate_chars};
use remdex::error::{IndexError, TransformError, TransportError};
use remdex::pipeline::{
    RetryPolicy, RunReport, SkipPolicy, Transformer, describe_error, error_context,
};
use remdex::transport::{LocalTransport, RemoteSession, RemoteTransport};
use remdex::utils::{apply_file_to_opts, parse_settings_toml};
use remdex::{
    FilterOpts, FilterReason, IndexingStatus, Opts, RemoteEntry, RunState, SqliteStore,
    TransformOutcome, index_remote,
};
use std::sync::Arc;
use std::time::Duration;

const TS: i64 = 1_700_000_000_000;

fn file(dir: &str, name: &str, size: u64) -> RemoteEntry {
    RemoteEntry::child_of(dir, name, size, TS, false)
}

// --- remote path and name helpers ---

#[test]
fn test_join_remote_single_slash() {
    assert_eq!(join_remote("/data", "x.pdf"), "/data/x.pdf");
    assert_eq!(join_remote("/data/", "x.pdf"), "/data/x.pdf");
    assert_eq!(join_remote("/", "data"), "/data");
}

#[test]
fn test_extension_of() {
    assert_eq!(extension_of("x.pdf"), "pdf");
    assert_eq!(extension_of("y.TXT"), "txt");
    assert_eq!(extension_of("archive.tar.GZ"), "gz");
    assert_eq!(extension_of("README"), "");
    assert_eq!(extension_of("trailing."), "");
}

#[test]
fn test_temporary_names() {
    assert!(is_temporary_name("draft.tmp"));
    assert!(is_temporary_name("draft.TEMP"));
    assert!(is_temporary_name("notes.bak"));
    assert!(is_temporary_name("notes.txt~"));
    assert!(is_temporary_name("~$report.docx"));
    assert!(!is_temporary_name("report.docx"));
    assert!(!is_temporary_name("tmp.pdf"));
}

#[test]
fn test_path_ends_with_name() {
    assert!(path_ends_with_name("/data/a/x.pdf", "x.pdf"));
    assert!(!path_ends_with_name("/data/a/bx.pdf", "x.pdf"));
    assert!(!path_ends_with_name("/data/a/x.pdf", "y.pdf"));
}

#[test]
fn test_truncate_chars() {
    assert_eq!(truncate_chars("short", 10), "short");
    let long = "é".repeat(600);
    let cut = truncate_chars(&long, 500);
    assert_eq!(cut.chars().count(), 500);
    assert!(cut.ends_with("..."));
}

#[test]
fn test_format_duration_ms() {
    assert_eq!(format_duration_ms(0), "0s");
    assert_eq!(format_duration_ms(59_999), "59s");
    assert_eq!(format_duration_ms(123_000), "2m 3s");
    assert_eq!(format_duration_ms(3_723_000), "1h 2m 3s");
}

// --- identifiers ---

#[test]
fn test_unique_id_is_stable_hex() {
    let a = unique_id("/data/a/x.pdf").unwrap();
    assert_eq!(a, unique_id("/data/a/x.pdf").unwrap());
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(a, unique_id("/data/a/y.pdf").unwrap());
    assert!(unique_id("").is_err());
}

#[test]
fn test_fallback_id_shape() {
    let id = fallback_id("/data/a/x.pdf");
    assert_eq!(id.len(), 16);
    assert_eq!(id, fallback_id("/data/a/x.pdf"));
}

// --- transform ---

#[test]
fn test_filter_order() {
    let t = Transformer::default();
    let mut empty = file("/data", "x", 1);
    empty.name.clear();
    assert_eq!(t.filter_reason(&empty), Some(FilterReason::Empty));

    let hidden_dir = RemoteEntry::child_of("/data", ".git", 0, TS, true);
    assert_eq!(t.filter_reason(&hidden_dir), Some(FilterReason::Directory));
    assert_eq!(
        t.filter_reason(&file("/data", ".old.tmp", 1)),
        Some(FilterReason::Hidden)
    );
    assert_eq!(
        t.filter_reason(&file("/data", "~$doc.docx", 1)),
        Some(FilterReason::Temporary)
    );
    assert_eq!(t.filter_reason(&file("/data", "x.pdf", 0)), None);
}

#[test]
fn test_size_bounds_inclusive() {
    let t = Transformer::new(FilterOpts {
        min_size: 10,
        max_size: 100,
    });
    assert_eq!(
        t.filter_reason(&file("/data", "small.pdf", 9)),
        Some(FilterReason::SizeOutOfBounds)
    );
    assert_eq!(t.filter_reason(&file("/data", "min.pdf", 10)), None);
    assert_eq!(t.filter_reason(&file("/data", "max.pdf", 100)), None);
    assert_eq!(
        t.filter_reason(&file("/data", "big.pdf", 101)),
        Some(FilterReason::SizeOutOfBounds)
    );
}

#[test]
fn test_transform_completed_record() {
    let t = Transformer::default();
    let TransformOutcome::Record(r) = t.transform(&file("/data/b", "y.TXT", 2048)) else {
        panic!("expected a record");
    };
    assert_eq!(r.unique_id, unique_id("/data/b/y.TXT").unwrap());
    assert_eq!(r.source_path, "/data/b/y.TXT");
    assert_eq!(r.file_name, "y.TXT");
    assert_eq!(r.extension, "txt");
    assert_eq!(r.size, 2048);
    assert_eq!(r.last_modified_ms, TS);
    assert_eq!(r.status, IndexingStatus::Completed);
    assert!(r.error.is_none());
    assert!(r.indexed_at_ms > 0);
}

#[test]
fn test_transform_failure_is_a_record() {
    let t = Transformer::default();
    let bad = RemoteEntry::child_of("/data", "old.doc", 3, RemoteEntry::UNKNOWN_MTIME, false);
    let TransformOutcome::Record(r) = t.transform(&bad) else {
        panic!("expected a record");
    };
    assert_eq!(r.status, IndexingStatus::Failed);
    assert!(r.is_failed());
    assert_eq!(r.last_modified_ms, 0);
    assert_eq!(r.unique_id, unique_id("/data/old.doc").unwrap());
    assert_eq!(
        r.error.as_deref(),
        Some("InvalidTimestamp: modification time unavailable")
    );
}

#[test]
fn test_pre_epoch_mtime_is_a_completed_record() {
    let t = Transformer::default();
    let old = RemoteEntry::child_of("/data", "scan.tif", 3, -86_400_000, false);
    let TransformOutcome::Record(r) = t.transform(&old) else {
        panic!("expected a record");
    };
    assert_eq!(r.status, IndexingStatus::Completed);
    assert_eq!(r.last_modified_ms, -86_400_000);
    assert!(r.error.is_none());
}

#[test]
fn test_transform_chunk_keeps_order() {
    let workers = rayon::ThreadPoolBuilder::new()
        .num_threads(3)
        .build()
        .unwrap();
    let entries: Vec<RemoteEntry> = (0..50)
        .map(|i| file("/data", &format!("f{i}.txt"), i))
        .collect();
    let out = Transformer::default().transform_chunk(&workers, &entries);
    assert_eq!(out.len(), 50);
    for (entry, outcome) in entries.iter().zip(out) {
        match outcome.unwrap() {
            TransformOutcome::Record(r) => assert_eq!(r.source_path, entry.full_path),
            TransformOutcome::Filtered(reason) => panic!("unexpected filter {reason:?}"),
        }
    }
}

#[test]
fn test_describe_error_truncates() {
    let err = TransformError::PathMismatch {
        path: "/x/".repeat(300),
        name: "n".to_string(),
    };
    let text = describe_error(&err);
    assert!(text.starts_with("PathMismatch: "));
    assert_eq!(text.chars().count(), 500);
}

// --- policies ---

fn transient() -> IndexError {
    IndexError::ListingFailed {
        path: "/data".into(),
        source: TransportError::List {
            path: "/data".into(),
            reason: "timeout".into(),
            transient: true,
        },
    }
}

#[test]
fn test_retry_policy() {
    let retry = RetryPolicy::new(3, Duration::from_millis(100));
    assert!(retry.should_retry(&transient(), 1));
    assert!(retry.should_retry(&transient(), 2));
    assert!(!retry.should_retry(&transient(), 3));
    assert!(!retry.should_retry(&IndexError::PoolClosed, 1));
    let not_found = IndexError::ListingFailed {
        path: "/gone".into(),
        source: TransportError::NotFound {
            path: "/gone".into(),
        },
    };
    assert!(!retry.should_retry(&not_found, 1));
    assert_eq!(retry.backoff_for(2), Duration::from_millis(200));

    let once = RetryPolicy::new(1, Duration::ZERO);
    assert!(!once.should_retry(&transient(), 1));
}

#[test]
fn test_skip_policy() {
    let rejected = || IndexError::RecordRejected {
        unique_id: "abc".into(),
        message: "bad".into(),
    };
    let mut skips = SkipPolicy::new(2);
    assert!(skips.record(rejected()).is_ok());
    assert!(skips.record(rejected()).is_ok());
    assert!(matches!(
        skips.record(rejected()),
        Err(IndexError::SkipLimitExceeded { limit: 2, .. })
    ));
    assert_eq!(skips.skipped(), 3);

    let mut skips = SkipPolicy::new(10);
    assert!(matches!(
        skips.record(transient()),
        Err(IndexError::ListingFailed { .. })
    ));
    assert_eq!(skips.skipped(), 0);
}

// --- error context ---

#[test]
fn test_error_context_chain() {
    let err = IndexError::DiscoveryFailed {
        root: "/data".into(),
        source: Box::new(transient()),
    };
    let full = error_context(&err, 10);
    let lines: Vec<&str> = full.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Directory discovery failed under '/data'");
    assert_eq!(lines[1], "Caused by: Listing failed for '/data'");
    assert_eq!(lines[2], "Caused by: Failed to list '/data': timeout");

    let short = error_context(&err, 2);
    assert!(short.ends_with("... (1 more lines)"));
}

// --- settings file ---

#[test]
fn test_settings_toml_applies_present_fields() {
    let file = parse_settings_toml(
        r#"
        [sftp]
        host = "files.example.org"
        user = "indexer"

        [pool]
        max_size = 6
        max_wait_secs = 12
        eviction_interval_secs = 0

        [batch]
        chunk_size = 250
        retry_backoff_ms = 50

        [filter]
        max_size = 1048576

        [store]
        db_path = "/tmp/index.db"
        "#,
    )
    .unwrap();
    let mut opts = Opts::default();
    apply_file_to_opts(&file, &mut opts);

    assert_eq!(opts.sftp.host, "files.example.org");
    assert_eq!(opts.sftp.user, "indexer");
    assert_eq!(opts.sftp.port, 22);
    assert_eq!(opts.pool.max_size, 6);
    assert_eq!(opts.pool.max_wait, Duration::from_secs(12));
    assert!(opts.pool.eviction_interval.is_none());
    assert_eq!(opts.run.acquire_timeout, Duration::from_secs(12));
    assert_eq!(opts.run.chunk_size, 250);
    assert_eq!(opts.run.retry_backoff, Duration::from_millis(50));
    assert_eq!(opts.run.retry_limit, 3);
    assert_eq!(opts.run.filter.max_size, 1_048_576);
    assert_eq!(
        opts.db_path.as_deref(),
        Some(std::path::Path::new("/tmp/index.db"))
    );
}

#[test]
fn test_settings_toml_rejects_unknown_keys() {
    assert!(parse_settings_toml("[pool]\nmax_sessions = 4\n").is_err());
    assert!(parse_settings_toml("").is_ok());
}

// --- local transport ---

fn local_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("a")).unwrap();
    std::fs::create_dir_all(dir.path().join("b")).unwrap();
    std::fs::write(dir.path().join("a/x.pdf"), vec![0u8; 1024]).unwrap();
    std::fs::write(dir.path().join("b/.tmp1"), b"tmp").unwrap();
    std::fs::write(dir.path().join("b/y.TXT"), b"hello").unwrap();
    dir
}

#[test]
fn test_local_session_lists_sorted() {
    let dir = local_tree();
    let transport = LocalTransport::new(dir.path());
    let mut session = transport.connect().unwrap();
    assert!(session.is_alive());

    let root = session.list("/").unwrap();
    let names: Vec<&str> = root.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["a", "b"]);
    assert!(root.iter().all(|e| e.is_dir));

    let a = session.list("/a").unwrap();
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].full_path, "/a/x.pdf");
    assert_eq!(a[0].size, 1024);
    assert!(a[0].modified_ms > 0);

    assert!(matches!(
        session.list("/missing"),
        Err(TransportError::NotFound { .. })
    ));

    session.close();
    assert!(!session.is_alive());
    assert!(session.list("/").is_err());
}

#[test]
fn test_local_transport_missing_base() {
    let dir = tempfile::tempdir().unwrap();
    let transport = LocalTransport::new(dir.path().join("nope"));
    assert!(transport.connect().is_err());
}

#[test]
fn test_index_local_tree() {
    let dir = local_tree();
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let mut opts = Opts::default();
    opts.pool.eviction_interval = None;
    opts.run.retry_backoff = Duration::ZERO;

    let report = index_remote(LocalTransport::new(dir.path()), "/", &opts, store.clone()).unwrap();
    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.directories, 3);
    assert_eq!((report.indexed, report.filtered), (2, 1));
    let row = store.file_row(&unique_id("/b/y.TXT").unwrap()).unwrap().unwrap();
    assert_eq!(row.file_size, 5);
    assert_eq!(row.extension, "txt");
}

#[test]
fn test_progress_follows_report_totals() {
    let progress = RunProgress::new("Indexing");
    let mut report = RunReport::new(1, "/data");
    progress.on_chunk(&report);
    assert_eq!(progress.count(), 0);

    report.processed = 4;
    report.directories = 1;
    report.directories_total = 3;
    progress.on_chunk(&report);
    assert_eq!(progress.count(), 4);

    report.processed = 9;
    progress.on_chunk(&report);
    progress.on_chunk(&report);
    assert_eq!(progress.count(), 9);
    progress.finish();
}
