//! Error kinds shared by readers, builders, and file providers.

use std::fmt;
use std::io;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CdbError>;

/// Everything that can go wrong while reading or building a database.
///
/// Structural problems in a file are deliberately unspecific: a corrupt or
/// hostile input yields [`CdbError::Proto`] with no detail about which check
/// fired, and the operation that hit it leaves the handle usable for further
/// independent calls.
#[derive(Debug)]
pub enum CdbError {
    /// The underlying file provider failed.
    Io(io::Error),
    /// The file is structurally invalid: a table descriptor, record offset,
    /// or length points outside the region it must stay within.
    Proto,
    /// A record with this key already exists (`put` with
    /// [`PutMode::Insert`](crate::make::PutMode::Insert)).
    Exists,
    /// A record, or the finished file including its hash tables, would
    /// exceed the 32-bit limits of the format.
    TooLarge,
}

impl fmt::Display for CdbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CdbError::Io(e) => write!(f, "i/o error: {}", e),
            CdbError::Proto => f.write_str("malformed database file"),
            CdbError::Exists => f.write_str("record already exists"),
            CdbError::TooLarge => f.write_str("record or file exceeds 32-bit format limits"),
        }
    }
}

impl std::error::Error for CdbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CdbError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CdbError {
    fn from(e: io::Error) -> Self {
        CdbError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_keep_their_source() {
        let e = CdbError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(std::error::Error::source(&e).is_some());
        assert!(e.to_string().contains("gone"));
    }

    #[test]
    fn display_is_stable() {
        assert_eq!(CdbError::Proto.to_string(), "malformed database file");
        assert_eq!(CdbError::Exists.to_string(), "record already exists");
    }
}
