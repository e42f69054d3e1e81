//! E2E: sequential scans over the data section.
//!
//! A scan starts right behind the table of contents and yields every record
//! exactly once, in insertion order, independent of the hash tables.

use cdb::{Cdb, CdbFile, CdbMake, CdbSeq, MemFile};

type Record = (Vec<u8>, Vec<u8>);

fn scan_all<F: CdbFile>(db: &mut Cdb<F>) -> Vec<Record> {
    let mut seq = CdbSeq::new();
    let mut out = Vec::new();
    while seq.next(db).expect("seq_next") {
        out.push((db.getkey().unwrap().to_vec(), db.getdata().unwrap().to_vec()));
    }
    out
}

#[test]
fn test_scan_yields_every_record_in_insertion_order() {
    let records: Vec<Record> = vec![
        (b"one".to_vec(), b"1".to_vec()),
        (b"two".to_vec(), b"2".to_vec()),
        (b"three".to_vec(), b"3".to_vec()),
    ];
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    for (k, v) in &records {
        make.add(k, v).unwrap();
    }
    let mut db = Cdb::new(make.finish().unwrap()).unwrap();

    assert_eq!(scan_all(&mut db), records);
}

#[test]
fn test_scan_of_empty_database_stops_immediately() {
    let make = CdbMake::start(MemFile::new()).unwrap();
    let mut db = Cdb::new(make.finish().unwrap()).unwrap();

    let mut seq = CdbSeq::new();
    assert!(!seq.next(&mut db).unwrap());
    assert!(!seq.next(&mut db).unwrap());
}

#[test]
fn test_scan_includes_duplicates_once_each() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    make.add(b"k", b"a").unwrap();
    make.add(b"k", b"b").unwrap();
    make.add(b"k", b"a").unwrap();
    let mut db = Cdb::new(make.finish().unwrap()).unwrap();

    let keys: Vec<_> = scan_all(&mut db).into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![b"k".to_vec(); 3]);
}

#[test]
fn test_rescanning_is_idempotent() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    for i in 0..500u32 {
        make.add(format!("key-{}", i).as_bytes(), &i.to_le_bytes()).unwrap();
    }
    let mut db = Cdb::new(make.finish().unwrap()).unwrap();

    let first = scan_all(&mut db);
    let second = scan_all(&mut db);
    assert_eq!(first.len(), 500);
    assert_eq!(first, second);
}

#[test]
fn test_scan_position_tracks_record_boundaries() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    make.add(b"ab", b"cd").unwrap(); // 8 + 2 + 2 = 12 bytes
    make.add(b"e", b"f").unwrap(); // 8 + 1 + 1 = 10 bytes
    let mut db = Cdb::new(make.finish().unwrap()).unwrap();

    let mut seq = CdbSeq::new();
    assert_eq!(seq.pos(), 2048);
    assert!(seq.next(&mut db).unwrap());
    assert_eq!(seq.pos(), 2060);
    assert!(seq.next(&mut db).unwrap());
    assert_eq!(seq.pos(), 2070);
    assert!(!seq.next(&mut db).unwrap());
    assert_eq!(seq.pos(), 2070);
}

#[test]
fn test_scan_and_lookup_agree_on_content() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    for i in 0..100u32 {
        make.add(format!("{}", i).as_bytes(), format!("value {}", i).as_bytes())
            .unwrap();
    }
    let mut db = Cdb::new(make.finish().unwrap()).unwrap();

    for (k, v) in scan_all(&mut db) {
        assert!(db.find(&k).unwrap());
        assert_eq!(db.getdata().unwrap(), &v[..]);
    }
}
