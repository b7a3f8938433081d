//! Engine integration tests: write-failure rollback, crash and corruption
//! recovery, compaction safety.

use std::fs;
use walkv_core::log::{LOG_FILE_NAME, RECORD_OVERHEAD};
use walkv_core::{recover_from_backend, Config, Database, ErrorKind, LogRecord};
use walkv_storage::{FileBackend, InMemoryBackend};
use walkv_testkit::prelude::*;

fn config() -> Config {
    Config::default()
        .shard_count(8)
        .without_background_compaction()
}

fn faulty_db() -> (Database, std::sync::Arc<FaultSwitch>, InMemoryBackend) {
    let (backend, faults, mem) = FaultyBackend::memory();
    let db = Database::open_with_backend(config(), Box::new(backend)).unwrap();
    (db, faults, mem)
}

// ============================================================================
// Write-failure rollback
// ============================================================================

#[test]
fn failed_set_of_new_key_is_rolled_back() {
    let (db, faults, mem) = faulty_db();
    db.set(b"keep", b"1").unwrap();
    let before = mem.data();

    faults.fail_appends(true);
    let err = db.set(b"new", b"2").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WriteFailed);
    assert!(err.to_string().starts_with("set operation failed for key 'new'"));

    assert_eq!(db.get(b"new").unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(db.size(), 1);
    assert_eq!(mem.data(), before);
    assert_eq!(db.stats().write_failures, 1);
}

#[test]
fn failed_overwrite_restores_previous_value() {
    let (db, faults, mem) = faulty_db();
    db.set(b"k", b"old").unwrap();
    let before = mem.data();

    faults.fail_sync(true);
    assert_eq!(
        db.set(b"k", b"new").unwrap_err().kind(),
        ErrorKind::WriteFailed
    );
    assert_eq!(db.get(b"k").unwrap(), b"old");
    assert_eq!(mem.data(), before, "unsynced record must be truncated away");
}

#[test]
fn failed_delete_restores_key() {
    let (db, faults, mem) = faulty_db();
    db.set(b"k", b"v").unwrap();
    let before = mem.data();

    faults.fail_flush(true);
    assert_eq!(db.delete(b"k").unwrap_err().kind(), ErrorKind::WriteFailed);
    assert_eq!(db.get(b"k").unwrap(), b"v");
    assert_eq!(mem.data(), before);
}

#[test]
fn torn_append_leaves_no_partial_record() {
    let (db, faults, mem) = faulty_db();
    db.set(b"a", b"1").unwrap();

    faults.tear_appends(true);
    assert!(db.set(b"b", b"2").is_err());
    faults.reset();
    db.set(b"c", b"3").unwrap();

    let outcome = recover_from_backend(&mem).unwrap();
    assert!(outcome.is_clean());
    let keys: Vec<_> = outcome.records.iter().map(|r| r.key.clone()).collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"c".to_vec()]);
}

#[test]
fn unreported_torn_file_append_keeps_later_writes() {
    let dir = tempfile::tempdir().unwrap();
    let config = config().log_dir(dir.path());
    let file = FileBackend::open(&dir.path().join(LOG_FILE_NAME)).unwrap();
    let (backend, faults) = FaultyBackend::new(Box::new(file));

    {
        let db = Database::open_with_backend(config.clone(), Box::new(backend)).unwrap();
        db.set(b"a", b"1").unwrap();
        let log_size = db.log_size().unwrap();

        faults.tear_appends_unreported(true);
        assert_eq!(
            db.set(b"b", &[7; 100]).unwrap_err().kind(),
            ErrorKind::WriteFailed
        );
        faults.reset();
        assert_eq!(db.log_size().unwrap(), log_size);
        assert_eq!(
            fs::metadata(dir.path().join(LOG_FILE_NAME)).unwrap().len(),
            log_size,
            "torn bytes must be cut from the file"
        );

        db.set(b"c", b"3").unwrap();
        db.close().unwrap();
    }

    let db = Database::open(config).unwrap();
    assert_eq!(db.get(b"a").unwrap(), b"1");
    assert_eq!(db.get(b"c").unwrap(), b"3");
    assert_eq!(db.get(b"b").unwrap_err().kind(), ErrorKind::NotFound);
    assert!(db.recovery_report().corrupted.is_empty());
}

#[test]
fn index_matches_log_after_mixed_failures() {
    let (db, faults, mem) = faulty_db();
    let mut model = ReferenceModel::new();

    for i in 0..60u32 {
        let key = format!("k{}", i % 7).into_bytes();
        faults.fail_appends(i % 5 == 0);
        let op = if i % 4 == 3 {
            Op::Delete { key }
        } else {
            Op::Set {
                key,
                value: i.to_le_bytes().to_vec(),
            }
        };
        let result = match &op {
            Op::Set { key, value } => db.set(key, value),
            Op::Delete { key } => db.delete(key),
        };
        if result.is_ok() {
            model.apply(&op);
        }
    }
    faults.reset();

    assert!(model.matches_database(&db));
    let replayed = ReferenceModel::from_records(&recover_from_backend(&mem).unwrap().records);
    assert_eq!(replayed, model);
}

// ============================================================================
// Recovery from damaged logs
// ============================================================================

#[test]
fn single_byte_corruption_skips_exactly_one_record() {
    let mut t = TestDatabase::new();
    for i in 0..5 {
        t.set(format!("key{i}").as_bytes(), b"value").unwrap();
    }
    t.close();

    let offsets = record_offsets(&t.log_bytes());
    assert_eq!(offsets.len(), 5);
    flip_byte(&t.log_path(), key_offset(offsets[2]), 0x01).unwrap();

    let db = t.reopen();
    assert_eq!(db.size(), 4);
    assert_eq!(db.get(b"key2").unwrap_err().kind(), ErrorKind::NotFound);
    for i in [0, 1, 3, 4] {
        assert_eq!(db.get(format!("key{i}").as_bytes()).unwrap(), b"value");
    }

    let report = db.recovery_report();
    assert_eq!(report.records_replayed, 4);
    assert_eq!(report.corrupted.len(), 1);
    assert_eq!(report.corrupted[0].offset, offsets[2]);
    assert_eq!(db.stats().corrupted_skipped, 1);
}

#[test]
fn torn_tail_keeps_earlier_records() {
    let mut t = TestDatabase::new();
    t.set(b"a", b"1").unwrap();
    t.set(b"b", b"2").unwrap();
    t.close();

    let len = t.log_bytes().len() as u64;
    truncate_file(&t.log_path(), len - 2).unwrap();
    let tail_path = t.path().join(format!("{LOG_FILE_NAME}.torn-{}", len / 2));

    let db = t.reopen();
    assert_eq!(db.get(b"a").unwrap(), b"1");
    assert_eq!(db.get(b"b").unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(db.recovery_report().corrupted.len(), 1);

    let saved = fs::read(&tail_path).unwrap();
    assert_eq!(saved.len(), len as usize / 2 - 2);

    // the torn frame was cut off at open, so this record is aligned
    db.set(b"c", b"3").unwrap();
    let db = t.reopen();
    assert_eq!(db.get(b"a").unwrap(), b"1");
    assert_eq!(db.get(b"c").unwrap(), b"3");
    assert!(db.recovery_report().corrupted.is_empty());
}

#[test]
fn cut_tail_is_kept_beside_the_log() {
    let mut t = TestDatabase::new();
    for key in [b"a", b"b", b"c"] {
        t.set(key, b"value").unwrap();
    }
    t.close();

    // top byte of the first record's value length: the frame now claims to
    // run past the end of the file
    let value_len_top = key_offset(0) + 1 + 3;
    flip_byte(&t.log_path(), value_len_top, 0x80).unwrap();
    let damaged = t.log_bytes();

    let db = t.reopen();
    assert_eq!(db.size(), 0);
    assert!(db.recovery_report().corrupted[0].truncated);
    assert!(t.log_bytes().is_empty());

    let mut saved = fs::read(t.path().join(format!("{LOG_FILE_NAME}.torn-0"))).unwrap();
    assert_eq!(saved, damaged);

    saved[value_len_top as usize] ^= 0x80;
    let outcome = recover_from_backend(&InMemoryBackend::with_data(saved)).unwrap();
    assert!(outcome.is_clean());
    assert_eq!(outcome.records.len(), 3);
}

#[test]
fn compaction_drops_corrupted_history() {
    let mut t = TestDatabase::new();
    t.set(b"a", b"1").unwrap();
    t.close();
    append_garbage(&t.log_path(), &[0xAB; 7]).unwrap();

    let db = t.reopen();
    assert_eq!(db.recovery_report().corrupted.len(), 1);
    db.compact().unwrap();

    let db = t.reopen();
    assert!(db.recovery_report().corrupted.is_empty());
    assert_eq!(db.get(b"a").unwrap(), b"1");
}

#[test]
fn missing_log_opens_empty() {
    let t = TestDatabase::new();
    assert_eq!(t.size(), 0);
    assert_eq!(t.recovery_report().records_replayed, 0);
}

#[test]
fn stale_temp_file_is_ignored_and_removed() {
    let mut t = TestDatabase::new();
    t.set(b"k", b"v").unwrap();
    t.close();

    let temp = t.path().join("database.log.tmp");
    fs::write(&temp, b"partial compaction output").unwrap();

    let db = t.reopen();
    assert_eq!(db.get(b"k").unwrap(), b"v");
    assert!(!temp.exists());
}

// ============================================================================
// Compaction
// ============================================================================

#[test]
fn failed_compaction_keeps_old_log() {
    let (db, faults, mem) = faulty_db();
    db.set(b"a", b"1").unwrap();
    db.set(b"a", b"2").unwrap();
    let before = mem.data();

    faults.fail_replace(true);
    assert!(db.compact().is_err());
    assert_eq!(mem.data(), before);
    assert_eq!(db.stats().compactions, 0);

    faults.reset();
    db.set(b"b", b"3").unwrap();
    let stats = db.compact().unwrap().unwrap();
    assert_eq!(stats.entries_written, 2);

    let model = ReferenceModel::from_records(&recover_from_backend(&mem).unwrap().records);
    assert!(model.matches_database(&db));
}

#[test]
fn compacted_log_is_minimal() {
    let mut t = TestDatabase::new();
    for i in 0..50 {
        t.set(b"hot", format!("{i}").as_bytes()).unwrap();
    }
    t.set(b"cold", b"x").unwrap();
    t.delete(b"cold").unwrap();

    t.compact().unwrap();
    let expected = (RECORD_OVERHEAD + b"hot".len() + b"49".len()) as u64;
    assert_eq!(t.log_size().unwrap(), expected);

    let db = t.reopen();
    assert_eq!(db.get(b"hot").unwrap(), b"49");
    assert_eq!(db.size(), 1);
}

#[test]
fn writes_after_compaction_survive_reopen() {
    let mut t = TestDatabase::new();
    t.set(b"a", b"1").unwrap();
    t.compact().unwrap();
    t.set(b"b", b"2").unwrap();
    t.delete(b"a").unwrap();

    let db = t.reopen();
    assert_eq!(db.get(b"a").unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(db.get(b"b").unwrap(), b"2");
}

#[test]
fn handmade_log_is_replayed() {
    let mut bytes = Vec::new();
    for record in [
        LogRecord::set(b"x".to_vec(), b"1".to_vec()),
        LogRecord::set(b"y".to_vec(), Vec::new()),
        LogRecord::delete(b"x".to_vec()),
    ] {
        record.encode_into(&mut bytes).unwrap();
    }

    let db = Database::open_with_backend(config(), Box::new(InMemoryBackend::with_data(bytes)))
        .unwrap();
    assert_eq!(db.keys(), vec![b"y".to_vec()]);
    assert_eq!(db.get(b"y").unwrap(), b"");
}
