//! Constant key/value database: a single immutable file, built once and then
//! only ever read.
//!
//! The format is the classic cdb layout and is binary-compatible with files
//! produced by djb's `cdbmake` and by tinycdb: a 2 KiB table of contents of
//! 256 `(position, entries)` pairs, a data section of
//! `klen, vlen, key, value` records, and 256 open-addressed hash tables at
//! the end of the file, each sized at twice its slot's record count. A
//! lookup costs at most two reads: one probe into the key's slot table, one
//! into the record it points at.
//!
//! # Reading
//!
//! ```no_run
//! # fn demo() -> cdb::Result<()> {
//! let mut db = cdb::Cdb::open("users.cdb")?;
//! if db.find(b"alice")? {
//!     let value = db.getdata()?; // zero-copy, borrowed from the mapping
//! }
//! # Ok(()) }
//! ```
//!
//! Duplicate keys are enumerated with [`CdbFind`], full scans with
//! [`CdbSeq`].
//!
//! # Building
//!
//! ```no_run
//! # fn demo() -> cdb::Result<()> {
//! let mut make = cdb::CdbMake::create("users.cdb.tmp")?;
//! make.add(b"alice", b"...")?;
//! make.put(b"alice", b"...", cdb::PutMode::Replace)?;
//! make.finish()?;
//! // rename over the live file to publish atomically
//! # Ok(()) }
//! ```
//!
//! # Providers
//!
//! Both halves go through the [`CdbFile`] contract. [`OsFile`] (the
//! default) memory-maps for reading and streams writes; [`MemFile`] keeps
//! the whole file in a byte vector. Anything else (an archive member, a
//! remote blob) can implement the trait without changing the format.
//!
//! Readers validate every offset against the file boundaries, so a corrupt
//! or hostile file yields [`CdbError::Proto`], never an out-of-bounds
//! access.

pub mod codec;
pub mod error;
pub mod file;
pub mod hash;
pub mod make;
pub mod read;

pub use error::{CdbError, Result};
pub use file::{BufId, CdbFile, MemFile, OsFile};
pub use make::{CdbMake, PutMode};
pub use read::{Cdb, CdbFind, CdbSeq};

/// Size of the table of contents; also the offset of the first record.
pub(crate) const TOC_SIZE: u32 = 2048;
