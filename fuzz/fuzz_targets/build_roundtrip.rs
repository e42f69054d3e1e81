#![no_main]
use libfuzzer_sys::fuzz_target;

use cdb::{Cdb, CdbMake, MemFile, PutMode};

fuzz_target!(|data: &[u8]| {
    // Carve the input into length-prefixed records, build a database from
    // them, and verify every key looks up again.

    let mut make = CdbMake::start(MemFile::new()).unwrap();
    let mut keys: Vec<Vec<u8>> = Vec::new();
    let mut rest = data;
    while rest.len() >= 2 {
        let klen = (rest[0] & 0x3F) as usize;
        let vlen = (rest[1] & 0x3F) as usize;
        let mode = match rest[0] >> 6 {
            0 => PutMode::Add,
            1 => PutMode::Warn,
            2 => PutMode::Replace,
            _ => PutMode::Replace0,
        };
        rest = &rest[2..];
        if rest.len() < klen + vlen {
            break;
        }
        let (key, r) = rest.split_at(klen);
        let (value, r) = r.split_at(vlen);
        rest = r;
        make.put(key, value, mode).unwrap();
        keys.push(key.to_vec());
    }

    let bytes = make.finish().unwrap().into_bytes();
    let mut db = Cdb::new(MemFile::from_bytes(bytes)).unwrap();
    for key in &keys {
        assert!(db.find(key).unwrap(), "built key must be findable");
    }

    // A full scan of a self-built file must never error.
    let mut seq = cdb::CdbSeq::new();
    let mut n = 0usize;
    while seq.next(&mut db).unwrap() {
        n += 1;
    }
    assert_eq!(n, keys.len());
});
