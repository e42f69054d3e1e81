//! E2E: hostile and corrupt inputs.
//!
//! Whatever bytes a reader is pointed at, every operation must come back
//! with not-found or a protocol error; no panic, no out-of-bounds access.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use cdb::{Cdb, CdbError, CdbFind, CdbMake, CdbSeq, MemFile};

/// Drive every reader operation over the given file bytes. Outcomes are
/// free; surviving the drive is the assertion.
fn exercise(bytes: Vec<u8>, keys: &[&[u8]]) {
    let mut db = match Cdb::new(MemFile::from_bytes(bytes)) {
        Ok(db) => db,
        Err(_) => return, // rejecting the file outright is fine
    };

    for key in keys {
        let _ = db.find(key);
        if let Ok(mut cursor) = CdbFind::init(&mut db, key) {
            // a slot table has at most fsize/8 entries, so this terminates
            while let Ok(true) = cursor.find_next(&mut db) {}
        }
    }

    let mut seq = CdbSeq::new();
    while let Ok(true) = seq.next(&mut db) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Fixed hostile shapes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_all_zero_toc_finds_nothing() {
    let mut db = Cdb::new(MemFile::from_bytes(vec![0u8; 2048])).unwrap();
    for key in [&b""[..], b"a", b"some key"] {
        assert!(!db.find(key).unwrap(), "zero TOC must be a clean miss");
    }
    let mut seq = CdbSeq::new();
    assert!(!seq.next(&mut db).unwrap());
}

#[test]
fn test_data_end_beyond_file_is_clamped() {
    let mut bytes = vec![0u8; 2048];
    bytes[..4].copy_from_slice(&u32::MAX.to_le_bytes());
    // may miss or report a protocol error, but must stay inside the file
    exercise(bytes, &[b"a", b"b"]);
}

#[test]
fn test_undersized_file_is_rejected_at_open() {
    for len in [0usize, 1, 100, 2047] {
        assert!(
            matches!(
                Cdb::new(MemFile::from_bytes(vec![0u8; len])),
                Err(CdbError::Proto)
            ),
            "{}-byte file must fail to open",
            len
        );
    }
}

#[test]
fn test_table_descriptor_pointing_outside_the_file() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    make.add(b"key", b"value").unwrap();
    let good = make.finish().unwrap().into_bytes();

    // corrupt the table position and size of the key's slot
    let slot = (cdb::hash::hash(b"key") & 0xFF) as usize;
    for (off, val) in [
        (slot * 8, u32::MAX),     // pos far outside
        (slot * 8 + 4, u32::MAX), // num impossibly large
        (slot * 8 + 4, 1 << 28),  // num > fsize / 8
    ] {
        let mut bytes = good.clone();
        bytes[off..off + 4].copy_from_slice(&val.to_le_bytes());
        let mut db = Cdb::new(MemFile::from_bytes(bytes)).unwrap();
        assert!(
            matches!(db.find(b"key"), Err(CdbError::Proto)),
            "corrupt descriptor at offset {} must be a protocol error",
            off
        );
        // the handle stays usable for an unrelated lookup
        assert!(!db.find(b"unrelated").unwrap());
    }
}

#[test]
fn test_record_header_pointing_past_data_end() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    make.add(b"key", b"value").unwrap();
    let mut bytes = make.finish().unwrap().into_bytes();

    // blow up the stored klen of the record at 2048
    bytes[2048..2052].copy_from_slice(&0xFFFF_FF00u32.to_le_bytes());
    let mut db = Cdb::new(MemFile::from_bytes(bytes)).unwrap();
    let mut seq = CdbSeq::new();
    assert!(matches!(seq.next(&mut db), Err(CdbError::Proto)));
}

#[test]
fn test_truncated_database() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    for i in 0..100u32 {
        make.add(format!("key{}", i).as_bytes(), format!("val{}", i).as_bytes())
            .unwrap();
    }
    let good = make.finish().unwrap().into_bytes();

    let keys: Vec<Vec<u8>> = (0..100u32).map(|i| format!("key{}", i).into_bytes()).collect();
    let key_refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();
    for cut in [2048, 2500, good.len() / 2, good.len() - 1] {
        exercise(good[..cut].to_vec(), &key_refs);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Random files
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_random_files_never_escape_the_buffer() {
    let mut rng = StdRng::seed_from_u64(0x5bd1);
    for round in 0..64usize {
        let len = rng.gen_range(2048..8192);
        let mut bytes = vec![0u8; len];
        rng.fill(&mut bytes[..]);

        let probe = vec![b'x'; round % 7];
        exercise(bytes, &[b"", b"key", &probe]);
    }
}

#[test]
fn test_random_corruption_of_a_real_database() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    for i in 0..50u32 {
        make.add(format!("k{}", i).as_bytes(), b"some value").unwrap();
    }
    let good = make.finish().unwrap().into_bytes();

    let mut rng = StdRng::seed_from_u64(0xcdb);
    for _ in 0..256 {
        let mut bytes = good.clone();
        for _ in 0..rng.gen_range(1..16) {
            let at = rng.gen_range(0..bytes.len());
            bytes[at] = rng.gen();
        }
        exercise(bytes, &[b"k0", b"k25", b"k49", b"missing"]);
    }
}
