//! E2E: duplicate keys and the five put modes.
//!
//! ADD keeps every duplicate findable in insertion order; INSERT refuses;
//! WARN appends but signals; REPLACE and REPLACE0 retire earlier records
//! from the hash tables, REPLACE0 additionally zero-filling their bytes.

use cdb::{Cdb, CdbError, CdbFind, CdbMake, CdbSeq, MemFile, PutMode};

fn open_mem(bytes: Vec<u8>) -> Cdb<MemFile> {
    Cdb::new(MemFile::from_bytes(bytes)).expect("open built database")
}

/// Collect every value stored under `key`, in match order.
fn values_for(db: &mut Cdb<MemFile>, key: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut cursor = CdbFind::init(db, key).expect("find cursor");
    while cursor.find_next(db).expect("find_next") {
        out.push(db.getdata().unwrap().to_vec());
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// ADD: duplicates enumerate in insertion order
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_add_keeps_duplicates_in_insertion_order() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    make.add(b"k", b"a").unwrap();
    make.add(b"k", b"b").unwrap();
    make.add(b"k", b"c").unwrap();
    let mut db = open_mem(make.finish().unwrap().into_bytes());

    assert!(db.find(b"k").unwrap());
    assert_eq!(db.getdata().unwrap(), b"a");
    assert_eq!(values_for(&mut db, b"k"), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    assert!(values_for(&mut db, b"other").is_empty());
}

#[test]
fn test_find_cursor_is_exhausted_after_last_match() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    make.add(b"k", b"a").unwrap();
    let mut db = open_mem(make.finish().unwrap().into_bytes());

    let mut cursor = CdbFind::init(&mut db, b"k").unwrap();
    assert!(cursor.find_next(&mut db).unwrap());
    assert!(!cursor.find_next(&mut db).unwrap());
    assert!(!cursor.find_next(&mut db).unwrap());
}

// ─────────────────────────────────────────────────────────────────────────────
// INSERT: refuse existing keys, leave the file unchanged
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_insert_refuses_and_leaves_file_identical() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    make.add(b"k", b"a").unwrap();
    assert!(matches!(
        make.put(b"k", b"b", PutMode::Insert),
        Err(CdbError::Exists)
    ));
    let with_refused = make.finish().unwrap().into_bytes();

    let mut make = CdbMake::start(MemFile::new()).unwrap();
    make.add(b"k", b"a").unwrap();
    let reference = make.finish().unwrap().into_bytes();

    assert_eq!(with_refused, reference, "refused INSERT must not change the file");
}

#[test]
fn test_insert_of_fresh_key_succeeds() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    assert!(!make.put(b"k", b"a", PutMode::Insert).unwrap());
    let mut db = open_mem(make.finish().unwrap().into_bytes());
    assert!(db.find(b"k").unwrap());
    assert_eq!(db.getdata().unwrap(), b"a");
}

// ─────────────────────────────────────────────────────────────────────────────
// WARN: append anyway, signal the duplicate
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_warn_appends_and_signals() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    assert!(!make.put(b"k", b"a", PutMode::Warn).unwrap());
    assert!(make.put(b"k", b"b", PutMode::Warn).unwrap());
    let mut db = open_mem(make.finish().unwrap().into_bytes());

    assert_eq!(values_for(&mut db, b"k"), vec![b"a".to_vec(), b"b".to_vec()]);
}

// ─────────────────────────────────────────────────────────────────────────────
// REPLACE: only the last value survives in the hash tables
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_replace_retires_earlier_records_from_lookup() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    make.add(b"k", b"a").unwrap();
    assert!(make.put(b"k", b"b", PutMode::Replace).unwrap());
    let mut db = open_mem(make.finish().unwrap().into_bytes());

    assert!(db.find(b"k").unwrap());
    assert_eq!(db.getdata().unwrap(), b"b");
    assert_eq!(values_for(&mut db, b"k"), vec![b"b".to_vec()]);
}

#[test]
fn test_replace_retires_every_earlier_duplicate() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    make.add(b"k", b"a").unwrap();
    make.add(b"k", b"b").unwrap();
    make.add(b"other", b"x").unwrap();
    assert!(make.put(b"k", b"c", PutMode::Replace).unwrap());
    let mut db = open_mem(make.finish().unwrap().into_bytes());

    assert_eq!(values_for(&mut db, b"k"), vec![b"c".to_vec()]);
    assert_eq!(values_for(&mut db, b"other"), vec![b"x".to_vec()]);
}

#[test]
fn test_replaced_records_still_occupy_the_data_section() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    make.add(b"k", b"a").unwrap();
    make.put(b"k", b"b", PutMode::Replace).unwrap();
    let mut db = open_mem(make.finish().unwrap().into_bytes());

    // the superseded record is gone from lookups but not from the scan
    let mut seq = CdbSeq::new();
    let mut seen = Vec::new();
    while seq.next(&mut db).unwrap() {
        seen.push((db.getkey().unwrap().to_vec(), db.getdata().unwrap().to_vec()));
    }
    assert_eq!(
        seen,
        vec![
            (b"k".to_vec(), b"a".to_vec()),
            (b"k".to_vec(), b"b".to_vec()),
        ]
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// REPLACE0: superseded bytes are zero-filled, headers survive
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_replace0_zero_fills_but_preserves_record_count() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    make.add(b"key", b"aaa").unwrap();
    assert!(make.put(b"key", b"bbb", PutMode::Replace0).unwrap());
    let bytes = make.finish().unwrap().into_bytes();

    // first record body (after its 8-byte header) is zeroed in place
    assert_eq!(&bytes[2056..2062], &[0u8; 6]);

    let mut db = open_mem(bytes);
    assert_eq!(values_for(&mut db, b"key"), vec![b"bbb".to_vec()]);

    let mut seq = CdbSeq::new();
    let mut count = 0;
    while seq.next(&mut db).unwrap() {
        count += 1;
    }
    assert_eq!(count, 2, "zero-filled record still shows up in the scan");

    // the zeroed record scans as a 3-byte zero key with a 3-byte zero value
    let mut seq = CdbSeq::new();
    assert!(seq.next(&mut db).unwrap());
    assert_eq!(db.getkey().unwrap(), &[0u8, 0, 0]);
    assert_eq!(db.getdata().unwrap(), &[0u8, 0, 0]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder-side probing
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_exists_and_find_during_build() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    assert!(!make.exists(b"k").unwrap());
    make.add(b"k", b"a").unwrap();
    assert!(make.exists(b"k").unwrap());
    assert!(!make.exists(b"K").unwrap());

    // probe-only find with Replace mode retires the record without writing
    assert!(make.find(b"k", PutMode::Replace).unwrap());
    let mut db = open_mem(make.finish().unwrap().into_bytes());
    assert!(!db.find(b"k").unwrap());
}
