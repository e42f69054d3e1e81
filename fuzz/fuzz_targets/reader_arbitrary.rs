#![no_main]
use libfuzzer_sys::fuzz_target;

use cdb::{Cdb, CdbFind, CdbSeq, MemFile};

fuzz_target!(|data: &[u8]| {
    // Treat arbitrary bytes as a database file. Misses and protocol errors
    // are expected and fine; what we verify is no panics and no
    // out-of-bounds access.

    // Pad to the minimum file size so the interesting paths get exercised
    // instead of everything dying at open.
    let mut bytes = data.to_vec();
    if bytes.len() < 2048 {
        bytes.resize(2048, 0);
    }

    let mut db = match Cdb::new(MemFile::from_bytes(bytes)) {
        Ok(db) => db,
        Err(_) => return,
    };

    // Probe with a few fixed keys plus a window of the input itself, which
    // occasionally matches records the input happens to describe.
    let window = &data[..data.len().min(16)];
    for key in [&b""[..], b"k", window] {
        let _ = db.find(key);
        if let Ok(mut cursor) = CdbFind::init(&mut db, key) {
            while let Ok(true) = cursor.find_next(&mut db) {}
        }
    }

    let mut seq = CdbSeq::new();
    while let Ok(true) = seq.next(&mut db) {}
});
