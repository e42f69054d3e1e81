//! Sequential record retrieval, in file order.

use crate::error::Result;
use crate::file::{BufId, CdbFile};
use crate::read::{proto, Cdb};
use crate::TOC_SIZE;

/// Cursor over every record in the data section, in insertion order.
///
/// Starts right behind the table of contents and steps record by record
/// until the data end. Re-creating the cursor restarts the scan from the
/// beginning.
#[derive(Clone, Copy, Debug)]
pub struct CdbSeq {
    pos: u32,
}

impl Default for CdbSeq {
    fn default() -> Self {
        CdbSeq::new()
    }
}

impl CdbSeq {
    /// A cursor positioned at the first record.
    pub fn new() -> Self {
        CdbSeq { pos: TOC_SIZE }
    }

    /// Current byte offset within the file.
    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// Step to the next record.
    ///
    /// On `Ok(true)` the record is published on the handle's accessors and
    /// the cursor has advanced past it; `Ok(false)` means the data section
    /// is exhausted. A record header that points past the data end is a
    /// protocol error.
    pub fn next<F: CdbFile>(&mut self, cdb: &mut Cdb<F>) -> Result<bool> {
        let dend = cdb.dend;
        if self.pos > dend - 8 {
            return Ok(false);
        }
        let klen = cdb.unpack_at(self.pos, BufId::Data)?;
        let vlen = cdb.unpack_at(self.pos + 4, BufId::Data)?;
        let kpos = self.pos + 8;
        if u64::from(kpos) + u64::from(klen) > u64::from(dend)
            || u64::from(kpos) + u64::from(klen) + u64::from(vlen) > u64::from(dend)
        {
            return Err(proto("record extends past data end"));
        }
        cdb.publish(kpos, klen, vlen);
        self.pos = kpos + klen + vlen;
        Ok(true)
    }
}
