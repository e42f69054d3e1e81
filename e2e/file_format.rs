//! E2E: the emitted bytes match the cdb format exactly.
//!
//! The layout is fixed: a 2048-byte table of contents of 256 little-endian
//! `(pos, num)` pairs, records as `klen, vlen, key, value`, then one
//! open-addressed hash table per slot with `num = 2 * records` entries of
//! `(hash, rpos)`, the probe start seeded by `(hash >> 8) % num`. These
//! tests pin the bytes down so files stay interchangeable with other cdb
//! tooling.

use cdb::codec::unpack;
use cdb::hash::hash;
use cdb::{CdbMake, MemFile};

fn toc_pair(bytes: &[u8], slot: usize) -> (u32, u32) {
    (unpack(&bytes[slot * 8..]), unpack(&bytes[slot * 8 + 4..]))
}

// ─────────────────────────────────────────────────────────────────────────────
// Golden files
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_empty_database_bytes() {
    let make = CdbMake::start(MemFile::new()).unwrap();
    let bytes = make.finish().unwrap().into_bytes();

    assert_eq!(bytes.len(), 2048);
    for slot in 0..256 {
        assert_eq!(toc_pair(&bytes, slot), (2048, 0));
    }
}

#[test]
fn test_single_record_golden_bytes() {
    // hash(b"k") = 177614 = 0x2b5ce: slot 206, probe seed 693 (odd, so the
    // entry lands in index 1 of the 2-entry table).
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    make.add(b"k", b"v").unwrap();
    let bytes = make.finish().unwrap().into_bytes();

    assert_eq!(bytes.len(), 2074);
    // byte 0 doubles as the data end
    assert_eq!(unpack(&bytes[0..]), 2058);
    assert_eq!(toc_pair(&bytes, 0), (2058, 0));
    assert_eq!(toc_pair(&bytes, 206), (2058, 2));
    assert_eq!(toc_pair(&bytes, 207), (2074, 0));
    assert_eq!(toc_pair(&bytes, 255), (2074, 0));

    // record: klen=1, vlen=1, "k", "v"
    assert_eq!(&bytes[2048..2058], b"\x01\x00\x00\x00\x01\x00\x00\x00kv");

    // slot 206's table: entry 0 empty, entry 1 = (hash, 2048)
    assert_eq!(
        &bytes[2058..2074],
        b"\x00\x00\x00\x00\x00\x00\x00\x00\xce\xb5\x02\x00\x00\x08\x00\x00"
    );
}

#[test]
fn test_three_record_layout() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    make.add(b"one", b"1").unwrap();
    make.add(b"two", b"2").unwrap();
    make.add(b"three", b"3").unwrap();
    let bytes = make.finish().unwrap().into_bytes();

    assert_eq!(bytes.len(), 2134);
    assert_eq!(unpack(&bytes[0..]), 2086); // data end

    // records at 2048 ("one"), 2060 ("two"), 2072 ("three")
    assert_eq!(unpack(&bytes[2048..]), 3);
    assert_eq!(&bytes[2056..2059], b"one");
    assert_eq!(&bytes[2068..2071], b"two");
    assert_eq!(&bytes[2080..2085], b"three");

    // slot tables come out in slot order: 41 ("two"), 107 ("three"),
    // 129 ("one"), each with two entries
    assert_eq!(toc_pair(&bytes, 41), (2086, 2));
    assert_eq!(toc_pair(&bytes, 107), (2102, 2));
    assert_eq!(toc_pair(&bytes, 129), (2118, 2));

    // "two": probe seed 755552 is even, so its entry sits at index 0
    assert_eq!(unpack(&bytes[2086..]), hash(b"two"));
    assert_eq!(unpack(&bytes[2090..]), 2060);
    assert_eq!(unpack(&bytes[2094..]), 0);
    assert_eq!(unpack(&bytes[2098..]), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Structural invariants over a larger build
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_load_factor_is_two() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    for i in 0..1000u32 {
        make.add(format!("key{}", i).as_bytes(), b"x").unwrap();
    }
    let bytes = make.finish().unwrap().into_bytes();

    // count records per slot independently, by re-hashing the keys
    let mut per_slot = [0u32; 256];
    for i in 0..1000u32 {
        per_slot[(hash(format!("key{}", i).as_bytes()) & 0xFF) as usize] += 1;
    }

    let dend = unpack(&bytes[0..]);
    for slot in 0..256 {
        let (pos, num) = toc_pair(&bytes, slot);
        assert_eq!(num, 2 * per_slot[slot], "slot {} table size", slot);
        assert!(pos >= dend, "slot {} table must sit behind the data", slot);
        assert!(pos as usize + 8 * num as usize <= bytes.len());
    }
}

#[test]
fn test_tables_are_dense_in_slot_order() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    for i in 0..100u32 {
        make.add(&i.to_be_bytes(), b"v").unwrap();
    }
    let bytes = make.finish().unwrap().into_bytes();

    let dend = unpack(&bytes[0..]);
    let mut expect = dend;
    for slot in 0..256 {
        let (pos, num) = toc_pair(&bytes, slot);
        assert_eq!(pos, expect, "slot {} table position", slot);
        expect += 8 * num;
    }
    assert_eq!(expect as usize, bytes.len(), "tables end at the file end");
}

#[test]
fn test_every_table_entry_probes_back_to_its_record() {
    let mut make = CdbMake::start(MemFile::new()).unwrap();
    for i in 0..200u32 {
        make.add(format!("entry-{}", i).as_bytes(), b"v").unwrap();
    }
    let bytes = make.finish().unwrap().into_bytes();

    for slot in 0..256 {
        let (pos, num) = toc_pair(&bytes, slot);
        for e in 0..num as usize {
            let h = unpack(&bytes[pos as usize + e * 8..]);
            let rpos = unpack(&bytes[pos as usize + e * 8 + 4..]);
            if rpos == 0 {
                continue;
            }
            // the stored hash picks this slot, and the record's key hashes
            // back to the stored value
            assert_eq!((h & 0xFF) as usize, slot);
            let klen = unpack(&bytes[rpos as usize..]) as usize;
            let key = &bytes[rpos as usize + 8..rpos as usize + 8 + klen];
            assert_eq!(hash(key), h);
        }
    }
}
