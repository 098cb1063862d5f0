//! Storage backend error type.

use std::error::Error;
use std::fmt;

/// Errors reported by [`Store`](crate::Store) backends.
#[derive(Debug)]
pub enum StoreError {
    /// An I/O operation on the backing medium failed.
    Io {
        /// Which store operation was in progress (`"read"`, `"write"`, ...).
        op: &'static str,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// An access fell outside the backing medium.
    OutOfRange {
        /// Requested start offset.
        offset: u32,
        /// Requested length in bytes.
        len: usize,
        /// Capacity of the backing medium in bytes.
        capacity: u32,
    },
    /// The remote peer violated the stream protocol.
    Protocol {
        /// Human-readable description of the violation.
        reason: String,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { op, source } => write!(f, "store {op} failed: {source}"),
            Self::OutOfRange {
                offset,
                len,
                capacity,
            } => write!(
                f,
                "store access out of range: offset {offset} len {len} capacity {capacity}"
            ),
            Self::Protocol { reason } => write!(f, "stream protocol error: {reason}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl StoreError {
    /// Wrap an I/O error with the operation that produced it.
    pub fn io(op: &'static str, source: std::io::Error) -> Self {
        Self::Io { op, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_out_of_range() {
        let e = StoreError::OutOfRange {
            offset: 100,
            len: 32,
            capacity: 64,
        };
        assert_eq!(
            e.to_string(),
            "store access out of range: offset 100 len 32 capacity 64"
        );
    }

    #[test]
    fn io_error_chains_source() {
        let e = StoreError::io(
            "read",
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read"),
        );
        assert!(e.source().is_some());
        assert!(e.to_string().contains("read"));
    }
}
