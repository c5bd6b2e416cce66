#![forbid(unsafe_code)]
//! Error types for the WFS driver.
//!
//! # Error Taxonomy
//!
//! Two layers, as with most format interpreters:
//!
//! | Layer | Type | Crate | Purpose |
//! |-------|------|-------|---------|
//! | Parsing | `ParseError` | `wfs-types` | Byte-level decode failures (short buffers, bad magic) |
//! | Runtime | `WfsError` | `wfs-error` (this crate) | User-facing errors for FUSE, CLI, and API consumers |
//!
//! `wfs-error` does not depend on `wfs-types`. The `ParseError` → `WfsError`
//! conversion lives in `wfs-core`, which sees both.
//!
//! ## Corrupt images
//!
//! Two variants mean "the image is bad" rather than "the caller is wrong":
//!
//! - `Format`: rejected at open time (wrong magic, image too small).
//! - `Corruption`: found while walking live metadata (a chain that hits a free
//!   slot or EOF before the declared size, a cycle caught by the hop ceiling,
//!   a directory table outside the data region).
//!
//! [`WfsError::is_corrupt_format`] groups them so adapters can print a
//! diagnostic instead of a bare errno.
//!
//! ## FUSE errno Mapping
//!
//! | Variant | errno |
//! |---------|-------|
//! | `Io` | raw OS error, else `EIO` |
//! | `Corruption` | `EIO` |
//! | `Format` | `EINVAL` |
//! | `InvalidArgument` | `EINVAL` |
//! | `OutOfRange` | `EINVAL` |
//! | `NotFound` | `ENOENT` |
//! | `NotDirectory` | `ENOTDIR` |
//! | `IsDirectory` | `EISDIR` |
//! | `Unsupported` | `ENOSYS` |
//! | `ReadOnly` | `EROFS` |

use thiserror::Error;

/// Unified error type for all WFS operations.
#[derive(Debug, Error)]
pub enum WfsError {
    /// Operating system I/O error (wraps `std::io::Error`).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Live metadata contradicts itself.
    ///
    /// `block` is the data block where the fault was seen, or 0 when the
    /// fault is not tied to one block (e.g. a root-table slot).
    #[error("corrupt image at block {block}: {detail}")]
    Corruption { block: u64, detail: String },

    /// The byte store is not a usable WFS image.
    #[error("invalid on-disk format: {0}")]
    Format(String),

    /// Malformed path, empty lookup name, or name longer than the format allows.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Read offset past the declared size of the file.
    #[error("offset {offset} is beyond end of file (size {size})")]
    OutOfRange { offset: u64, size: u64 },

    /// Path component, or the entry behind an inode, does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A directory operation was applied to a file.
    #[error("not a directory")]
    NotDirectory,

    /// A file operation was applied to a directory.
    #[error("is a directory")]
    IsDirectory,

    /// Mutating operation; the driver never writes to an image.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// The mount was configured read-only and a write was attempted.
    #[error("read-only filesystem")]
    ReadOnly,
}

impl WfsError {
    /// Convert this error into a POSIX errno suitable for FUSE replies.
    ///
    /// No wildcard arm: a new variant does not compile until it has an errno.
    #[must_use]
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            Self::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
            Self::Corruption { .. } => libc::EIO,
            Self::Format(_) | Self::InvalidArgument(_) | Self::OutOfRange { .. } => libc::EINVAL,
            Self::NotFound(_) => libc::ENOENT,
            Self::NotDirectory => libc::ENOTDIR,
            Self::IsDirectory => libc::EISDIR,
            Self::Unsupported(_) => libc::ENOSYS,
            Self::ReadOnly => libc::EROFS,
        }
    }

    /// Whether this error was caused by bad image contents rather than by
    /// the caller.
    #[must_use]
    pub fn is_corrupt_format(&self) -> bool {
        matches!(self, Self::Corruption { .. } | Self::Format(_))
    }

    /// Shorthand for a [`WfsError::Corruption`] at `block`.
    #[must_use]
    pub fn corruption(block: u64, detail: impl Into<String>) -> Self {
        Self::Corruption {
            block,
            detail: detail.into(),
        }
    }
}

/// Result alias using `WfsError`.
pub type Result<T> = std::result::Result<T, WfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping_covers_all_variants() {
        let cases: Vec<(WfsError, libc::c_int)> = vec![
            (WfsError::Io(std::io::Error::other("test")), libc::EIO),
            (WfsError::corruption(7, "cycle"), libc::EIO),
            (WfsError::Format("bad magic".into()), libc::EINVAL),
            (WfsError::InvalidArgument("empty path".into()), libc::EINVAL),
            (
                WfsError::OutOfRange {
                    offset: 1000,
                    size: 900,
                },
                libc::EINVAL,
            ),
            (WfsError::NotFound("x".into()), libc::ENOENT),
            (WfsError::NotDirectory, libc::ENOTDIR),
            (WfsError::IsDirectory, libc::EISDIR),
            (WfsError::Unsupported("mkdir"), libc::ENOSYS),
            (WfsError::ReadOnly, libc::EROFS),
        ];

        for (error, expected_errno) in &cases {
            assert_eq!(
                error.to_errno(),
                *expected_errno,
                "wrong errno for {error:?}",
            );
        }
    }

    #[test]
    fn io_error_preserves_raw_os_error() {
        let raw = std::io::Error::from_raw_os_error(libc::EPERM);
        let err = WfsError::Io(raw);
        assert_eq!(err.to_errno(), libc::EPERM);
    }

    #[test]
    fn display_formatting() {
        assert_eq!(
            WfsError::corruption(9, "chain ends before declared size").to_string(),
            "corrupt image at block 9: chain ends before declared size"
        );
        assert_eq!(
            WfsError::OutOfRange {
                offset: 1000,
                size: 900
            }
            .to_string(),
            "offset 1000 is beyond end of file (size 900)"
        );
        assert_eq!(
            WfsError::Unsupported("write").to_string(),
            "operation not supported: write"
        );
    }

    #[test]
    fn corrupt_format_is_distinguishable() {
        assert!(WfsError::corruption(3, "cycle").is_corrupt_format());
        assert!(WfsError::Format("bad magic".into()).is_corrupt_format());
        assert!(!WfsError::NotFound("a".into()).is_corrupt_format());
        assert!(!WfsError::InvalidArgument("a".into()).is_corrupt_format());
        assert!(!WfsError::Unsupported("rmdir").is_corrupt_format());
    }
}
