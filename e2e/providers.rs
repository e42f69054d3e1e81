//! E2E: the two shipped file providers behave identically.
//!
//! The same record set built through the on-disk provider and through the
//! in-memory provider must produce byte-identical files, and lookups must
//! agree whichever provider serves them.

use std::fs;

use cdb::{BufId, Cdb, CdbFile, CdbMake, MemFile, OsFile};

const RECORDS: &[(&[u8], &[u8])] = &[
    (b"alpha", b"1"),
    (b"beta", b"2"),
    (b"gamma", b"3"),
    (b"alpha", b"4"), // duplicate on purpose
    (b"", b"empty key"),
];

fn build_mem() -> Vec<u8> {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    for (k, v) in RECORDS {
        make.add(k, v).unwrap();
    }
    make.finish().unwrap().into_bytes()
}

#[test]
fn test_os_and_mem_builds_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("os.cdb");
    let mut make = CdbMake::create(&path).unwrap();
    for (k, v) in RECORDS {
        make.add(k, v).unwrap();
    }
    make.finish().unwrap();

    assert_eq!(fs::read(&path).unwrap(), build_mem());
}

#[test]
fn test_lookups_agree_across_providers() {
    let bytes = build_mem();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("copy.cdb");
    fs::write(&path, &bytes).unwrap();

    let mut mem = Cdb::new(MemFile::from_bytes(bytes)).unwrap();
    let mut os = Cdb::open(&path).unwrap();
    assert_eq!(mem.fsize(), os.fsize());

    for key in [&b"alpha"[..], b"beta", b"gamma", b"", b"missing"] {
        let hit_mem = mem.find(key).unwrap();
        let hit_os = os.find(key).unwrap();
        assert_eq!(hit_mem, hit_os, "key {:?}", key);
        if hit_mem {
            assert_eq!(mem.getdata().unwrap(), os.getdata().unwrap());
            assert_eq!(mem.datapos(), os.datapos());
        }
    }
}

#[test]
fn test_provider_get_borrows_the_underlying_bytes() {
    let bytes = build_mem();
    let mut mem = MemFile::from_bytes(bytes.clone());
    mem.open().unwrap();

    // arbitrary window, all three buffer ids
    for id in [BufId::Default, BufId::Htab, BufId::Data] {
        assert_eq!(mem.get(16, 2048, id).unwrap(), &bytes[2048..2064]);
    }

    let mut copy = vec![0u8; 16];
    mem.pread(&mut copy, 2048).unwrap();
    assert_eq!(copy, &bytes[2048..2064]);
}

#[test]
fn test_closed_provider_can_be_closed_again() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x.cdb");
    let mut make = CdbMake::create(&path).unwrap();
    make.add(b"k", b"v").unwrap();
    make.finish().unwrap();

    let mut file = OsFile::open_path(&path).unwrap();
    file.open().unwrap();
    assert!(file.close().is_ok());
    assert!(file.close().is_ok());
}
