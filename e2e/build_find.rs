//! E2E: build a database on disk, then look records up through the
//! memory-mapped reader.
//!
//! Covers the basic round-trip (every record written is findable with its
//! value), misses, large builds, and the zero-copy accessors.

use cdb::{Cdb, CdbMake};

fn build_db(dir: &tempfile::TempDir, records: &[(&[u8], &[u8])]) -> std::path::PathBuf {
    let path = dir.path().join("test.cdb");
    let mut make = CdbMake::create(&path).expect("create builder");
    for (k, v) in records {
        make.add(k, v).expect("add record");
    }
    make.finish().expect("finish build");
    path
}

// ─────────────────────────────────────────────────────────────────────────────
// Basic lookups
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_three_records_hit_and_miss() {
    let dir = tempfile::tempdir().unwrap();
    let path = build_db(&dir, &[(b"one", b"1"), (b"two", b"2"), (b"three", b"3")]);

    let mut db = Cdb::open(&path).expect("open reader");
    assert!(db.find(b"two").unwrap());
    assert_eq!(db.getdata().unwrap(), b"2");
    assert_eq!(db.datalen(), 1);
    assert_eq!(db.keylen(), 3);
    assert_eq!(db.getkey().unwrap(), b"two");

    assert!(db.find(b"one").unwrap());
    assert_eq!(db.getdata().unwrap(), b"1");

    assert!(!db.find(b"missing").unwrap());
    assert!(!db.find(b"").unwrap());
    assert!(!db.find(b"tw").unwrap());
    assert!(!db.find(b"twoo").unwrap());
}

#[test]
fn test_empty_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = build_db(&dir, &[]);

    let mut db = Cdb::open(&path).unwrap();
    assert_eq!(db.fsize(), 2048);
    assert!(!db.find(b"anything").unwrap());
    assert!(!db.find(b"").unwrap());
}

#[test]
fn test_empty_key_and_empty_value_are_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = build_db(&dir, &[(b"", b"empty key"), (b"empty value", b"")]);

    let mut db = Cdb::open(&path).unwrap();
    assert!(db.find(b"").unwrap());
    assert_eq!(db.getdata().unwrap(), b"empty key");
    assert!(db.find(b"empty value").unwrap());
    assert_eq!(db.getdata().unwrap(), b"");
    assert_eq!(db.datalen(), 0);
}

#[test]
fn test_binary_keys_and_values() {
    let key: Vec<u8> = (0..=255u8).collect();
    let val = vec![0u8; 1 << 16];
    let dir = tempfile::tempdir().unwrap();
    let path = build_db(&dir, &[(&key, &val), (b"\x00", b"nul")]);

    let mut db = Cdb::open(&path).unwrap();
    assert!(db.find(&key).unwrap());
    assert_eq!(db.datalen() as usize, val.len());
    assert_eq!(db.getdata().unwrap(), &val[..]);
    assert!(db.find(b"\x00").unwrap());
    assert_eq!(db.getdata().unwrap(), b"nul");
}

// ─────────────────────────────────────────────────────────────────────────────
// Large build: every key findable
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_ten_thousand_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.cdb");
    let mut make = CdbMake::create(&path).unwrap();
    for i in 0..10_000u32 {
        make.add(format!("k{}", i).as_bytes(), format!("v{}", i).as_bytes())
            .unwrap();
    }
    make.finish().unwrap();

    let mut db = Cdb::open(&path).unwrap();
    assert!(db.find(b"k5000").unwrap());
    assert_eq!(db.getdata().unwrap(), b"v5000");

    for i in 0..10_000u32 {
        assert!(
            db.find(format!("k{}", i).as_bytes()).unwrap(),
            "key k{} must be findable",
            i
        );
        assert_eq!(db.getdata().unwrap(), format!("v{}", i).as_bytes());
    }
    assert!(!db.find(b"k10000").unwrap());
}

// ─────────────────────────────────────────────────────────────────────────────
// Record accessors
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_get_and_read_agree() {
    let dir = tempfile::tempdir().unwrap();
    let path = build_db(&dir, &[(b"key", b"some value bytes")]);

    let mut db = Cdb::open(&path).unwrap();
    assert!(db.find(b"key").unwrap());

    let (vpos, vlen) = (db.datapos(), db.datalen());
    let borrowed = db.get(vlen, vpos).unwrap().to_vec();
    let mut copied = vec![0u8; vlen as usize];
    db.read(&mut copied, vpos).unwrap();
    assert_eq!(borrowed, copied);
    assert_eq!(borrowed, b"some value bytes");

    let mut val = vec![0u8; vlen as usize];
    db.readdata(&mut val).unwrap();
    assert_eq!(val, b"some value bytes");
    let mut key = vec![0u8; db.keylen() as usize];
    db.readkey(&mut key).unwrap();
    assert_eq!(key, b"key");
}

#[test]
fn test_get_is_bounds_checked() {
    let dir = tempfile::tempdir().unwrap();
    let path = build_db(&dir, &[(b"k", b"v")]);

    let mut db = Cdb::open(&path).unwrap();
    let fsize = db.fsize();
    assert!(db.get(1, fsize).is_err());
    assert!(db.get(u32::MAX, 8).is_err());
    assert!(db.get(0, fsize).is_ok());
}
