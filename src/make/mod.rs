//! Builder core: stream records into a new database file and finalize it.
//!
//! A [`CdbMake`] writes records sequentially into the data section behind a
//! 2 KiB gap reserved for the table of contents, keeping one in-memory list
//! of `(hash, position)` pairs per slot. [`finish`](CdbMake::finish) then
//! lays the 256 open-addressed hash tables out after the data, sized at
//! twice the record count of their slot, and rewrites the table of contents
//! at the start of the file.
//!
//! Duplicate keys are handled by the five [`PutMode`]s; detecting them means
//! scanning the slot's in-memory list for hash matches and reading the
//! candidate records back through the provider, which is why providers must
//! support positional reads on a file being written.

use log::debug;

use crate::codec::{pack, unpack};
use crate::error::{CdbError, Result};
use crate::file::{CdbFile, OsFile};
use crate::hash::hash;
use crate::TOC_SIZE;

const WRITE_BUF: usize = 4096;

/// Number of slots, fixed by the format.
const SLOTS: usize = 256;

/// What `put` does when the key is already present.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PutMode {
    /// Append unconditionally; duplicates all stay findable.
    Add,
    /// Append, and drop every earlier record with this key from the hash
    /// tables. The superseded records keep their bytes in the data section
    /// and remain visible to sequential scans.
    Replace,
    /// Refuse to append if the key exists.
    Insert,
    /// Append unconditionally, but report whether the key existed.
    Warn,
    /// Like [`Replace`](PutMode::Replace), but additionally zero-fill the
    /// superseded records' key and value bytes during finalization. Their
    /// 8-byte headers survive, so sequential scans still step over them.
    Replace0,
}

/// One record's spot in its slot: the full hash and the record position.
/// `rpos == 0` marks an entry dropped by a replace mode; position 0 is
/// inside the table of contents and can never hold a record.
#[derive(Clone, Copy)]
struct Rec {
    hval: u32,
    rpos: u32,
}

/// Write handle for a database under construction.
///
/// Created empty by [`start`](CdbMake::start), fed through
/// [`add`](CdbMake::add) / [`put`](CdbMake::put), and consumed by
/// [`finish`](CdbMake::finish). Abandoning a builder mid-way just drops it;
/// the partial file is the caller's to delete.
pub struct CdbMake<F: CdbFile = OsFile> {
    file: F,
    /// Data-section write offset; starts behind the table of contents.
    dpos: u32,
    rcnt: u32,
    buf: [u8; WRITE_BUF],
    bpos: usize,
    rec: Box<[Vec<Rec>; SLOTS]>,
    /// `(pos, len)` ranges superseded by [`PutMode::Replace0`], zero-filled
    /// during `finish`.
    fill0: Vec<(u32, u32)>,
}

impl CdbMake<OsFile> {
    /// Start building a database file at `path` with the default provider.
    pub fn create<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        CdbMake::start(OsFile::create_path(path).map_err(CdbError::Io)?)
    }
}

impl<F: CdbFile> CdbMake<F> {
    /// Begin a fresh database through the given provider.
    ///
    /// Seeks the provider past the table of contents, which is written last.
    pub fn start(mut file: F) -> Result<Self> {
        file.create()?;
        file.seek(TOC_SIZE)?;
        Ok(CdbMake {
            file,
            dpos: TOC_SIZE,
            rcnt: 0,
            buf: [0; WRITE_BUF],
            bpos: 0,
            rec: Box::new(std::array::from_fn(|_| Vec::new())),
            fill0: Vec::new(),
        })
    }

    /// Number of records appended so far.
    pub fn count(&self) -> u32 {
        self.rcnt
    }

    /// Append a record unconditionally. Shorthand for
    /// `put(key, val, PutMode::Add)`.
    pub fn add(&mut self, key: &[u8], val: &[u8]) -> Result<()> {
        self.put(key, val, PutMode::Add).map(|_| ())
    }

    /// Append a record under `mode`.
    ///
    /// Returns whether a record with the same key was already present.
    /// Under [`PutMode::Insert`] an existing key is [`CdbError::Exists`]
    /// and nothing is appended.
    pub fn put(&mut self, key: &[u8], val: &[u8], mode: PutMode) -> Result<bool> {
        let hval = hash(key);
        let existed = match mode {
            PutMode::Add => false,
            PutMode::Insert => {
                if self.find_in_slot(key, hval, mode)? {
                    return Err(CdbError::Exists);
                }
                false
            }
            PutMode::Replace | PutMode::Warn | PutMode::Replace0 => {
                self.find_in_slot(key, hval, mode)?
            }
        };
        self.add_record(hval, key, val)?;
        Ok(existed)
    }

    /// Probe for `key` without writing anything, applying `mode`'s side
    /// effect on earlier records: [`PutMode::Replace`] drops them from the
    /// hash tables, [`PutMode::Replace0`] additionally tags them for
    /// zero-filling, every other mode only reports.
    pub fn find(&mut self, key: &[u8], mode: PutMode) -> Result<bool> {
        self.find_in_slot(key, hash(key), mode)
    }

    /// Has a record with this key been appended?
    pub fn exists(&mut self, key: &[u8]) -> Result<bool> {
        self.find(key, PutMode::Add)
    }

    /// Lay out the hash tables, rewrite the table of contents, and close
    /// the provider, returning it.
    ///
    /// A failure may leave a partial file behind; it is the caller's to
    /// discard.
    pub fn finish(mut self) -> Result<F> {
        self.flush()?;
        let dend = self.dpos;
        self.zero_superseded(dend)?;

        // Live entries per slot; the largest decides the scratch table.
        let mut hcnt = [0u32; SLOTS];
        let mut maxc = 0u32;
        let mut live = 0u64;
        for (slot, recs) in self.rec.iter().enumerate() {
            let c = recs.iter().filter(|r| r.rpos != 0).count() as u32;
            hcnt[slot] = c;
            maxc = maxc.max(c);
            live += u64::from(c);
        }
        if u64::from(dend) + live * 16 > u64::from(u32::MAX) {
            return Err(CdbError::TooLarge);
        }

        let mut htab = vec![Rec { hval: 0, rpos: 0 }; 2 * maxc as usize];
        let mut toc = [0u8; TOC_SIZE as usize];
        let mut dpos = dend;
        for slot in 0..SLOTS {
            let c = hcnt[slot];
            let n = c * 2;
            toc[slot * 8..slot * 8 + 4].copy_from_slice(&pack(dpos));
            toc[slot * 8 + 4..slot * 8 + 8].copy_from_slice(&pack(n));
            if c == 0 {
                continue;
            }

            let table = &mut htab[..n as usize];
            table.fill(Rec { hval: 0, rpos: 0 });
            for r in self.rec[slot].iter().filter(|r| r.rpos != 0) {
                let mut i = ((r.hval >> 8) % n) as usize;
                while table[i].rpos != 0 {
                    i += 1;
                    if i == n as usize {
                        i = 0;
                    }
                }
                table[i] = *r;
            }

            let mut out = Vec::with_capacity(n as usize * 8);
            for e in &htab[..n as usize] {
                out.extend_from_slice(&pack(e.hval));
                out.extend_from_slice(&pack(e.rpos));
            }
            self.write(&out)?;
            dpos += n << 3;
        }

        self.flush()?;
        self.file.seek(0)?;
        self.file.write(&toc)?;
        debug!(
            "finished cdb: {} records ({} live entries), data_end={} fsize={}",
            self.rcnt, live, dend, dpos
        );
        let mut file = self.file;
        file.close()?;
        Ok(file)
    }

    /// Append the record body and remember its slot entry.
    fn add_record(&mut self, hval: u32, key: &[u8], val: &[u8]) -> Result<()> {
        const LIMIT: u64 = 1 << 32;
        let (klen, vlen) = (key.len() as u64, val.len() as u64);
        // Lengths up to 2^32 - 8 are representable; only beyond that fails.
        if klen > LIMIT - 8 || vlen > LIMIT - 8 {
            return Err(CdbError::TooLarge);
        }
        let end = u64::from(self.dpos) + 8 + klen + vlen;
        // Reserve room for the two 8-byte table entries every record costs;
        // everything together must stay below 2^32.
        let tables = (u64::from(self.rcnt) + 1) * 16;
        if end + tables >= LIMIT {
            return Err(CdbError::TooLarge);
        }

        let mut hdr = [0u8; 8];
        hdr[..4].copy_from_slice(&pack(klen as u32));
        hdr[4..].copy_from_slice(&pack(vlen as u32));
        self.write(&hdr)?;
        self.write(key)?;
        self.write(val)?;

        self.rec[(hval & 0xFF) as usize].push(Rec {
            hval,
            rpos: self.dpos,
        });
        self.dpos = end as u32;
        self.rcnt += 1;
        Ok(())
    }

    /// Scan the slot's list for records equal to `key`, applying `mode`.
    fn find_in_slot(&mut self, key: &[u8], hval: u32, mode: PutMode) -> Result<bool> {
        if key.len() as u64 > u64::from(u32::MAX) {
            return Ok(false);
        }
        let klen = key.len() as u32;
        let slot = (hval & 0xFF) as usize;
        let mut flushed = false;
        let mut found = false;
        for i in 0..self.rec[slot].len() {
            let Rec { hval: h, rpos } = self.rec[slot][i];
            if h != hval || rpos == 0 {
                continue;
            }
            // Candidate records may still sit in the write buffer.
            if !flushed {
                self.flush()?;
                flushed = true;
            }
            let mut hdr = [0u8; 8];
            self.file.pread(&mut hdr, rpos)?;
            if unpack(&hdr[..4]) != klen {
                continue;
            }
            if !self.key_matches(key, rpos + 8)? {
                continue;
            }
            found = true;
            match mode {
                PutMode::Replace | PutMode::Replace0 => {
                    if mode == PutMode::Replace0 {
                        self.fill0.push((rpos + 8, klen + unpack(&hdr[4..])));
                    }
                    self.rec[slot][i].rpos = 0;
                }
                PutMode::Add | PutMode::Insert | PutMode::Warn => return Ok(true),
            }
        }
        Ok(found)
    }

    /// Compare `key` against the stored key bytes at `pos`, in chunks.
    fn key_matches(&mut self, key: &[u8], mut pos: u32) -> Result<bool> {
        let mut chunk = [0u8; 1024];
        let mut rest = key;
        while !rest.is_empty() {
            let n = rest.len().min(chunk.len());
            self.file.pread(&mut chunk[..n], pos)?;
            if chunk[..n] != rest[..n] {
                return Ok(false);
            }
            pos += n as u32;
            rest = &rest[n..];
        }
        Ok(true)
    }

    /// Zero-fill every range superseded by [`PutMode::Replace0`], then put
    /// the write position back at the end of the data section.
    fn zero_superseded(&mut self, dend: u32) -> Result<()> {
        if self.fill0.is_empty() {
            return Ok(());
        }
        let zeros = [0u8; 1024];
        let ranges = std::mem::take(&mut self.fill0);
        for (pos, len) in ranges {
            self.file.seek(pos)?;
            let mut left = len as usize;
            while left > 0 {
                let n = left.min(zeros.len());
                self.file.write(&zeros[..n])?;
                left -= n;
            }
        }
        self.file.seek(dend)?;
        Ok(())
    }

    /// Copy bytes out through the write buffer, flushing as it fills.
    fn write(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            let room = WRITE_BUF - self.bpos;
            if room == 0 {
                self.flush()?;
                continue;
            }
            let n = room.min(bytes.len());
            self.buf[self.bpos..self.bpos + n].copy_from_slice(&bytes[..n]);
            self.bpos += n;
            bytes = &bytes[n..];
        }
        Ok(())
    }

    /// Empty the write buffer into the provider.
    fn flush(&mut self) -> Result<()> {
        if self.bpos != 0 {
            self.file.write(&self.buf[..self.bpos])?;
            self.bpos = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::MemFile;

    fn build<R: IntoIterator<Item = (&'static [u8], &'static [u8])>>(records: R) -> Vec<u8> {
        let mut make = CdbMake::start(MemFile::new()).unwrap();
        for (k, v) in records {
            make.add(k, v).unwrap();
        }
        make.finish().unwrap().into_bytes()
    }

    #[test]
    fn empty_database_is_just_the_toc() {
        let bytes = build([]);
        assert_eq!(bytes.len(), 2048);
        // every slot: pos = 2048, num = 0
        for slot in 0..SLOTS {
            assert_eq!(unpack(&bytes[slot * 8..]), 2048);
            assert_eq!(unpack(&bytes[slot * 8 + 4..]), 0);
        }
    }

    #[test]
    fn record_layout_is_len_len_key_value() {
        let bytes = build([(b"key".as_slice(), b"value".as_slice())]);
        assert_eq!(unpack(&bytes[2048..]), 3);
        assert_eq!(unpack(&bytes[2052..]), 5);
        assert_eq!(&bytes[2056..2059], b"key");
        assert_eq!(&bytes[2059..2064], b"value");
    }

    #[test]
    fn tables_are_twice_the_record_count() {
        let bytes = build([
            (b"a".as_slice(), b"1".as_slice()),
            (b"b".as_slice(), b"2".as_slice()),
            (b"c".as_slice(), b"3".as_slice()),
        ]);
        let mut entries = 0;
        for slot in 0..SLOTS {
            entries += unpack(&bytes[slot * 8 + 4..]);
        }
        assert_eq!(entries, 6);
    }

    #[test]
    fn insert_mode_rejects_duplicates_without_writing() {
        let mut make = CdbMake::start(MemFile::new()).unwrap();
        make.add(b"k", b"a").unwrap();
        let before = make.count();
        assert!(matches!(
            make.put(b"k", b"b", PutMode::Insert),
            Err(CdbError::Exists)
        ));
        assert_eq!(make.count(), before);
        assert!(!make.put(b"fresh", b"b", PutMode::Insert).unwrap());
    }

    #[test]
    fn warn_mode_appends_and_signals() {
        let mut make = CdbMake::start(MemFile::new()).unwrap();
        assert!(!make.put(b"k", b"a", PutMode::Warn).unwrap());
        assert!(make.put(b"k", b"b", PutMode::Warn).unwrap());
        assert_eq!(make.count(), 2);
    }

    #[test]
    fn exists_sees_buffered_records() {
        let mut make = CdbMake::start(MemFile::new()).unwrap();
        assert!(!make.exists(b"k").unwrap());
        make.add(b"k", b"v").unwrap();
        // the record is still sitting in the 4 KiB write buffer here
        assert!(make.exists(b"k").unwrap());
        assert!(!make.exists(b"other").unwrap());
    }
}
