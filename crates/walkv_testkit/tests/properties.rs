//! Property tests: replay equivalence, compaction correctness, corruption
//! tolerance and the record codec.

use proptest::prelude::*;
use walkv_core::log::{DecodeError, LogIterator, ScanEntry, PREFIX_SIZE};
use walkv_core::{recover_from_backend, Config, Database, ErrorKind, LogRecord};
use walkv_storage::InMemoryBackend;
use walkv_testkit::prelude::*;

fn config() -> Config {
    Config::default()
        .shard_count(4)
        .without_background_compaction()
}

fn open(mem: &InMemoryBackend) -> Database {
    Database::open_with_backend(config(), Box::new(mem.clone())).unwrap()
}

/// Applies `ops` to both the database and the model, checking that each
/// call's outcome agrees with the model.
fn drive(db: &Database, model: &mut ReferenceModel, ops: &[Op]) {
    for op in ops {
        let expected_ok = match op {
            Op::Set { .. } => true,
            Op::Delete { key } => model.get(key).is_some(),
        };
        let result = match op {
            Op::Set { key, value } => db.set(key, value),
            Op::Delete { key } => db.delete(key),
        };
        match result {
            Ok(()) => assert!(expected_ok),
            Err(e) => {
                assert!(!expected_ok);
                assert_eq!(e.kind(), ErrorKind::NotFound);
            }
        }
        model.apply(op);
    }
}

/// Byte positions in a frame whose corruption keeps the frame boundaries
/// intact: everything except the two length fields.
fn non_length_positions(key_len: usize, frame_len: usize) -> Vec<usize> {
    let value_len_at = PREFIX_SIZE + key_len;
    (0..frame_len)
        .filter(|&p| !(PREFIX_SIZE - 2..PREFIX_SIZE).contains(&p))
        .filter(|&p| !(value_len_at..value_len_at + 4).contains(&p))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn replay_reproduces_index(ops in history_strategy(80)) {
        let mem = InMemoryBackend::new();
        let mut model = ReferenceModel::new();
        {
            let db = open(&mem);
            drive(&db, &mut model, &ops);
            prop_assert!(model.matches_database(&db));
        }

        let outcome = recover_from_backend(&mem).unwrap();
        prop_assert!(outcome.is_clean());
        prop_assert_eq!(&ReferenceModel::from_records(&outcome.records), &model);

        let reopened = open(&mem);
        prop_assert!(model.matches_database(&reopened));
    }

    #[test]
    fn compaction_preserves_state(
        before in history_strategy(60),
        after in history_strategy(30),
    ) {
        let mem = InMemoryBackend::new();
        let mut model = ReferenceModel::new();
        {
            let db = open(&mem);
            drive(&db, &mut model, &before);
            let stats = db.compact().unwrap().unwrap();
            prop_assert_eq!(stats.entries_written, model.len());
            prop_assert!(model.matches_database(&db));
            drive(&db, &mut model, &after);
        }

        let reopened = open(&mem);
        prop_assert!(model.matches_database(&reopened));
    }

    #[test]
    fn single_byte_corruption_skips_one_record(
        values in prop::collection::vec(value_strategy(), 1..20),
        victim in any::<prop::sample::Index>(),
        position in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let records: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(i, v)| LogRecord::set(format!("key{i}").into_bytes(), v.clone()))
            .collect();
        let mut bytes = Vec::new();
        for r in &records {
            r.encode_into(&mut bytes).unwrap();
        }

        let offsets = record_offsets(&bytes);
        let v = victim.index(records.len());
        let positions = non_length_positions(records[v].key.len(), records[v].encoded_len());
        let at = offsets[v] as usize + positions[position.index(positions.len())];
        bytes[at] ^= mask;

        let outcome = recover_from_backend(&InMemoryBackend::with_data(bytes)).unwrap();
        let mut expected = records.clone();
        expected.remove(v);
        prop_assert_eq!(outcome.records, expected);
        prop_assert_eq!(outcome.corrupted.len(), 1);
        prop_assert_eq!(outcome.corrupted[0].offset, offsets[v]);
        prop_assert_eq!(outcome.corrupted[0].len, records[v].encoded_len() as u64);
    }

    #[test]
    fn codec_round_trip(record in record_strategy()) {
        let bytes = record.encode().unwrap();
        prop_assert_eq!(bytes.len(), record.encoded_len());
        let (decoded, used) = LogRecord::decode(&bytes).unwrap();
        prop_assert_eq!(used, bytes.len());
        prop_assert_eq!(decoded.checksum(), record.checksum());
        prop_assert_eq!(decoded, record);
    }

    #[test]
    fn flipped_payload_byte_fails_checksum(
        record in record_strategy(),
        position in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let mut bytes = record.encode().unwrap();
        let positions = non_length_positions(record.key.len(), bytes.len());
        bytes[positions[position.index(positions.len())]] ^= mask;
        let is_checksum_mismatch =
            matches!(LogRecord::decode(&bytes), Err(DecodeError::ChecksumMismatch { .. }));
        prop_assert!(is_checksum_mismatch);
    }

    #[test]
    fn scanner_never_loses_sync_on_valid_logs(records in prop::collection::vec(record_strategy(), 0..30)) {
        let mut bytes = Vec::new();
        for r in &records {
            r.encode_into(&mut bytes).unwrap();
        }
        let mem = InMemoryBackend::with_data(bytes);
        let scanned: Vec<_> = LogIterator::new(&mem)
            .unwrap()
            .map(|e| match e.unwrap() {
                ScanEntry::Record { record, .. } => Some(record),
                ScanEntry::Corrupted(_) => None,
            })
            .collect();
        prop_assert_eq!(scanned, records.into_iter().map(Some).collect::<Vec<_>>());
    }
}
