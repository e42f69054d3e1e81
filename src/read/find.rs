//! Multi-match lookup: a cursor over every record stored under one key.

use crate::error::Result;
use crate::file::{BufId, CdbFile};
use crate::hash::hash;
use crate::read::{proto, Cdb};

/// Cursor over all records matching one key, in insertion order.
///
/// Holds the key by reference plus the probe state for the key's slot; each
/// [`find_next`](CdbFind::find_next) resumes where the previous match left
/// off. Pass the same handle the cursor was initialized with; the cursor
/// stores file offsets that are meaningless for any other database.
///
/// ```no_run
/// # fn demo() -> cdb::Result<()> {
/// let mut db = cdb::Cdb::open("mail.cdb")?;
/// let mut cursor = cdb::CdbFind::init(&mut db, b"alias")?;
/// while cursor.find_next(&mut db)? {
///     let value = db.getdata()?;
///     // ...
/// }
/// # Ok(()) }
/// ```
pub struct CdbFind<'k> {
    key: &'k [u8],
    hval: u32,
    htab: u32,
    htend: u32,
    htp: u32,
    httodo: u32,
}

impl<'k> CdbFind<'k> {
    /// Locate `key`'s slot table and position the cursor at its seeded
    /// probe start.
    ///
    /// An empty slot (or a key longer than the data section) yields a
    /// cursor whose `find_next` immediately reports no match; a structurally
    /// invalid table descriptor is a protocol error.
    pub fn init<F: CdbFile>(cdb: &mut Cdb<F>, key: &'k [u8]) -> Result<Self> {
        let hval = hash(key);
        let mut cursor = CdbFind {
            key,
            hval,
            htab: 0,
            htend: 0,
            htp: 0,
            httodo: 0,
        };
        if key.len() as u64 >= u64::from(cdb.dend) {
            return Ok(cursor);
        }

        let htp = (hval << 3) & 2047;
        let n = cdb.unpack_at(htp + 4, BufId::Htab)?;
        if n == 0 {
            return Ok(cursor);
        }
        let pos = cdb.unpack_at(htp, BufId::Htab)?;
        let fsize = cdb.file.fsize();
        if n > fsize >> 3
            || pos < cdb.dend
            || pos > fsize
            || u64::from(n) * 8 > u64::from(fsize - pos)
        {
            return Err(proto("hash table descriptor out of bounds"));
        }

        cursor.htab = pos;
        cursor.httodo = n << 3;
        cursor.htend = pos + cursor.httodo;
        cursor.htp = pos + (((hval >> 8) % n) << 3);
        Ok(cursor)
    }

    /// Advance to the next record matching the key.
    ///
    /// On `Ok(true)` the match is published on the handle's accessors; on
    /// `Ok(false)` the key has no further records and the cursor is
    /// exhausted.
    pub fn find_next<F: CdbFile>(&mut self, cdb: &mut Cdb<F>) -> Result<bool> {
        let klen = self.key.len() as u32;
        while self.httodo != 0 {
            let rpos = cdb.unpack_at(self.htp + 4, BufId::Htab)?;
            if rpos == 0 {
                self.httodo = 0;
                return Ok(false);
            }
            let hit = cdb.unpack_at(self.htp, BufId::Htab)? == self.hval;
            self.htp += 8;
            if self.htp >= self.htend {
                self.htp = self.htab;
            }
            self.httodo -= 8;
            if !hit {
                continue;
            }
            if rpos > cdb.dend - 8 {
                return Err(proto("record position past data end"));
            }
            if cdb.unpack_at(rpos, BufId::Data)? != klen {
                continue;
            }
            if cdb.dend - klen < rpos + 8 {
                return Err(proto("record key past data end"));
            }
            if cdb.file.get(klen, rpos + 8, BufId::Data)? != self.key {
                continue;
            }
            let vlen = cdb.unpack_at(rpos + 4, BufId::Data)?;
            let kpos = rpos + 8;
            if u64::from(kpos) + u64::from(klen) + u64::from(vlen) > u64::from(cdb.dend) {
                return Err(proto("record value past data end"));
            }
            cdb.publish(kpos, klen, vlen);
            return Ok(true);
        }
        Ok(false)
    }
}
