//! The default file provider: a memory-mapped file for reading, a plain
//! `std::fs::File` with sequential writes for building.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

use memmap2::Mmap;

use crate::error::{CdbError, Result};
use crate::file::{BufId, CdbFile};

/// File provider backed by the operating system.
///
/// `open` maps the file read-only; `get` then borrows straight out of the
/// mapping, so lookups never copy record bytes. `create` leaves the file
/// unmapped and serves `write`/`seek` with ordinary file I/O; `pread` on a
/// file being written uses positional reads that do not disturb the write
/// position.
///
/// Dropping an `OsFile` unmaps and closes it; an explicit
/// [`close`](CdbFile::close) does the same earlier and is idempotent.
pub struct OsFile {
    file: File,
    map: Option<Mmap>,
    fsize: u32,
}

impl OsFile {
    /// Open an existing database file for reading.
    ///
    /// The provider itself is opened (and the file mapped) later, by
    /// [`CdbFile::open`]; this only acquires the handle.
    pub fn open_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(OsFile::from_file(File::open(path)?))
    }

    /// Create (or truncate) a database file for writing.
    ///
    /// The file is opened read-write: the builder reads flushed records
    /// back for duplicate detection.
    pub fn create_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(OsFile::from_file(file))
    }

    /// Wrap an already-open file handle.
    pub fn from_file(file: File) -> Self {
        OsFile {
            file,
            map: None,
            fsize: 0,
        }
    }

    fn mapped(&self) -> Result<&[u8]> {
        match self.map.as_deref() {
            Some(m) => Ok(m),
            None => Err(CdbError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "file provider is not open for reading",
            ))),
        }
    }
}

/// Bounds-check `pos + len` against `fsize` in 64-bit arithmetic.
#[inline]
fn check_range(fsize: u32, len: u32, pos: u32) -> Result<()> {
    if u64::from(pos) + u64::from(len) > u64::from(fsize) {
        return Err(CdbError::Proto);
    }
    Ok(())
}

impl CdbFile for OsFile {
    fn open(&mut self) -> Result<()> {
        let len = self.file.metadata().map_err(CdbError::Io)?.len();
        // A valid file carries at least the 2 KiB table of contents.
        if len < 2048 {
            return Err(CdbError::Proto);
        }
        // SAFETY: the mapping is read-only and the format contract makes the
        // file immutable once built; nothing in this crate resizes it.
        let map = unsafe { Mmap::map(&self.file) }.map_err(CdbError::Io)?;
        self.fsize = u32::try_from(len).unwrap_or(u32::MAX);
        self.map = Some(map);
        Ok(())
    }

    fn create(&mut self) -> Result<()> {
        self.map = None;
        self.fsize = 0;
        Ok(())
    }

    fn fsize(&self) -> u32 {
        self.fsize
    }

    fn get(&mut self, len: u32, pos: u32, _buf: BufId) -> Result<&[u8]> {
        check_range(self.fsize, len, pos)?;
        let map = self.mapped()?;
        Ok(&map[pos as usize..pos as usize + len as usize])
    }

    fn pread(&mut self, buf: &mut [u8], pos: u32) -> Result<()> {
        if self.map.is_some() {
            let len = u32::try_from(buf.len()).map_err(|_| CdbError::Proto)?;
            check_range(self.fsize, len, pos)?;
            let map = self.mapped()?;
            buf.copy_from_slice(&map[pos as usize..pos as usize + buf.len()]);
            return Ok(());
        }
        read_exact_at(&self.file, buf, u64::from(pos)).map_err(CdbError::Io)
    }

    fn seek(&mut self, pos: u32) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(u64::from(pos)))
            .map_err(CdbError::Io)?;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.file.write_all(buf).map_err(CdbError::Io)
    }

    fn close(&mut self) -> Result<()> {
        self.map = None;
        Ok(())
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], pos: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, pos)
}

#[cfg(windows)]
fn read_exact_at(file: &File, buf: &mut [u8], mut pos: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut off = 0usize;
    while off < buf.len() {
        match file.seek_read(&mut buf[off..], pos) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "positional read past end of file",
                ))
            }
            Ok(n) => {
                off += n;
                pos += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_rejects_short_files() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[0u8; 100]).unwrap();
        let mut f = OsFile::open_path(tmp.path()).unwrap();
        assert!(matches!(f.open(), Err(CdbError::Proto)));
        // still usable for close after the failure
        assert!(f.close().is_ok());
    }

    #[test]
    fn get_is_bounds_checked() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[0u8; 2048]).unwrap();
        let mut f = OsFile::open_path(tmp.path()).unwrap();
        f.open().unwrap();
        assert_eq!(f.fsize(), 2048);
        assert!(f.get(8, 2048, BufId::Default).is_err());
        assert!(f.get(1, u32::MAX, BufId::Default).is_err());
        assert_eq!(f.get(4, 2044, BufId::Default).unwrap(), &[0u8, 0, 0, 0]);
    }

    #[test]
    fn pread_works_while_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = OsFile::create_path(dir.path().join("x.cdb")).unwrap();
        f.create().unwrap();
        f.seek(0).unwrap();
        f.write(b"hello world").unwrap();
        let mut buf = [0u8; 5];
        f.pread(&mut buf, 6).unwrap();
        assert_eq!(&buf, b"world");
        // the write position is unchanged by pread
        f.write(b"!").unwrap();
        let mut all = [0u8; 12];
        f.pread(&mut all, 0).unwrap();
        assert_eq!(&all, b"hello world!");
    }
}
