//! Reader core: open a database file, look keys up, walk records.
//!
//! A [`Cdb`] borrows nothing and owns its file provider; after any
//! successful match ([`find`](Cdb::find), [`CdbFind::find_next`],
//! [`CdbSeq::next`]) the handle carries the matched record's key and value
//! positions, which the `get*`/`read*` accessors resolve to bytes.
//!
//! Every offset and length coming out of the file is treated as hostile:
//! the lookup paths validate each table descriptor, probe entry, and record
//! header against the file boundaries before dereferencing anything, and a
//! failed check surfaces as [`CdbError::Proto`] without touching the
//! handle's match state.

mod find;
mod seq;

pub use find::CdbFind;
pub use seq::CdbSeq;

use log::{debug, trace};

use crate::codec::unpack;
use crate::error::{CdbError, Result};
use crate::file::{BufId, CdbFile, OsFile};
use crate::hash::hash;
use crate::TOC_SIZE;

/// Record the structural check that rejected the file, then hand back the
/// (deliberately unspecific) protocol error.
pub(crate) fn proto(check: &'static str) -> CdbError {
    trace!("structural reject: {}", check);
    CdbError::Proto
}

/// Read handle over one immutable database file.
///
/// Lookups need at most two reads: one into the slot's hash table, one into
/// the record it points at. Handles are single-threaded; open one handle per
/// thread to share a file between threads.
pub struct Cdb<F: CdbFile = OsFile> {
    pub(crate) file: F,
    /// End of the data section; hash tables start here.
    pub(crate) dend: u32,
    kpos: u32,
    klen: u32,
    vpos: u32,
    vlen: u32,
}

impl Cdb<OsFile> {
    /// Open the database file at `path` with the default provider.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Cdb::new(OsFile::open_path(path).map_err(CdbError::Io)?)
    }
}

impl<F: CdbFile> Cdb<F> {
    /// Open a database through the given provider.
    ///
    /// Reads the first word of the table of contents as the data-section
    /// end, clamped into `[2048, fsize]`; a first word below 2048 or beyond
    /// the file is tolerated for compatibility with permissive writers.
    pub fn new(mut file: F) -> Result<Self> {
        file.open()?;
        let fsize = file.fsize();
        let mut dend = unpack(file.get(4, 0, BufId::Default)?);
        if dend < TOC_SIZE {
            dend = TOC_SIZE;
        } else if dend >= fsize {
            dend = fsize;
        }
        debug!("opened cdb: fsize={} data_end={}", fsize, dend);
        Ok(Cdb {
            file,
            dend,
            kpos: 0,
            klen: 0,
            vpos: 0,
            vlen: 0,
        })
    }

    /// File size in bytes, as established when the provider was opened.
    pub fn fsize(&self) -> u32 {
        self.file.fsize()
    }

    /// Release the provider's resources.
    ///
    /// Dropping the handle does the same; this form surfaces close errors.
    pub fn close(mut self) -> Result<()> {
        self.file.close()
    }

    /// Key position of the last match.
    pub fn keypos(&self) -> u32 {
        self.kpos
    }

    /// Key length of the last match.
    pub fn keylen(&self) -> u32 {
        self.klen
    }

    /// Value position of the last match.
    pub fn datapos(&self) -> u32 {
        self.vpos
    }

    /// Value length of the last match.
    pub fn datalen(&self) -> u32 {
        self.vlen
    }

    /// Look up the first record stored under `key`.
    ///
    /// Returns `Ok(true)` and publishes the record on the handle, or
    /// `Ok(false)` if no record matches. Use [`CdbFind`] to walk duplicate
    /// keys.
    pub fn find(&mut self, key: &[u8]) -> Result<bool> {
        if key.len() as u64 >= u64::from(self.dend) {
            return Ok(false);
        }
        let klen = key.len() as u32;
        let hval = hash(key);

        // TOC pair for the slot picked by the low hash byte.
        let htp = (hval << 3) & 2047;
        let n = self.unpack_at(htp + 4, BufId::Htab)?;
        if n == 0 {
            return Ok(false);
        }
        let pos = self.unpack_at(htp, BufId::Htab)?;
        let fsize = self.file.fsize();
        if n > fsize >> 3
            || pos < self.dend
            || pos > fsize
            || u64::from(n) * 8 > u64::from(fsize - pos)
        {
            return Err(proto("hash table descriptor out of bounds"));
        }

        let htab = pos;
        let mut httodo = n << 3;
        let htend = htab + httodo;
        // Probe start: the high hash bits, independent of the slot choice.
        let mut htp = htab + (((hval >> 8) % n) << 3);

        loop {
            let rpos = self.unpack_at(htp + 4, BufId::Htab)?;
            if rpos == 0 {
                return Ok(false);
            }
            if self.unpack_at(htp, BufId::Htab)? == hval {
                if rpos > self.dend - 8 {
                    return Err(proto("record position past data end"));
                }
                if self.unpack_at(rpos, BufId::Data)? == klen {
                    if self.dend - klen < rpos + 8 {
                        return Err(proto("record key past data end"));
                    }
                    if self.file.get(klen, rpos + 8, BufId::Data)? == key {
                        let vlen = self.unpack_at(rpos + 4, BufId::Data)?;
                        let kpos = rpos + 8;
                        if u64::from(kpos) + u64::from(klen) + u64::from(vlen)
                            > u64::from(self.dend)
                        {
                            return Err(proto("record value past data end"));
                        }
                        self.publish(kpos, klen, vlen);
                        return Ok(true);
                    }
                }
            }
            httodo -= 8;
            if httodo == 0 {
                return Ok(false);
            }
            htp += 8;
            if htp >= htend {
                htp = htab;
            }
        }
    }

    /// Borrow `len` bytes at `pos` from the underlying file.
    ///
    /// The zero-copy accessor: for the default provider the slice points
    /// into the memory mapping and stays valid for the borrow of the
    /// handle.
    pub fn get(&mut self, len: u32, pos: u32) -> Result<&[u8]> {
        if u64::from(pos) + u64::from(len) > u64::from(self.file.fsize()) {
            return Err(proto("get range past end of file"));
        }
        self.file.get(len, pos, BufId::Default)
    }

    /// Copy `buf.len()` bytes starting at `pos` into `buf`.
    pub fn read(&mut self, buf: &mut [u8], pos: u32) -> Result<()> {
        if u64::from(pos) + buf.len() as u64 > u64::from(self.file.fsize()) {
            return Err(proto("read range past end of file"));
        }
        self.file.pread(buf, pos)
    }

    /// Borrow the value bytes of the last match.
    pub fn getdata(&mut self) -> Result<&[u8]> {
        let (len, pos) = (self.vlen, self.vpos);
        self.get(len, pos)
    }

    /// Borrow the key bytes of the last match.
    pub fn getkey(&mut self) -> Result<&[u8]> {
        let (len, pos) = (self.klen, self.kpos);
        self.get(len, pos)
    }

    /// Copy the value bytes of the last match into the front of `buf`.
    pub fn readdata(&mut self, buf: &mut [u8]) -> Result<()> {
        let (len, pos) = (self.vlen as usize, self.vpos);
        if buf.len() < len {
            return Err(CdbError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "buffer smaller than the matched value",
            )));
        }
        self.read(&mut buf[..len], pos)
    }

    /// Copy the key bytes of the last match into the front of `buf`.
    pub fn readkey(&mut self, buf: &mut [u8]) -> Result<()> {
        let (len, pos) = (self.klen as usize, self.kpos);
        if buf.len() < len {
            return Err(CdbError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "buffer smaller than the matched key",
            )));
        }
        self.read(&mut buf[..len], pos)
    }

    pub(crate) fn unpack_at(&mut self, pos: u32, buf: BufId) -> Result<u32> {
        Ok(unpack(self.file.get(4, pos, buf)?))
    }

    pub(crate) fn publish(&mut self, kpos: u32, klen: u32, vlen: u32) {
        self.kpos = kpos;
        self.klen = klen;
        self.vpos = kpos + klen;
        self.vlen = vlen;
    }
}
