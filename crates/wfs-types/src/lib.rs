#![forbid(unsafe_code)]
//! Shared constants and newtypes for the WFS on-disk format.
//!
//! An image is four contiguous regions: a 16-byte magic header, the root
//! entry table, the block-allocation table and the data region. Every region
//! size is a constant of the format; nothing about the geometry is stored in
//! the image itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod layout;

pub use layout::{
    BLOCK_SIZE, BLOCK_TABLE_SIZE, BLOCK_TABLE_START, DATA_REGION_SIZE, DATA_START, ENTRIES_START,
    ENTRY_SIZE, FILENAME_SIZE, MAGIC, MAGIC_SIZE, MAX_NAME_LEN, N_BLOCKS, ROOT_ENTRY_SLOTS,
    ROOT_TABLE_SIZE, SIZE_DIRECTORY_FLAG, SIZE_MASK, SIZE_RESERVED_MASK, SUBDIR_ENTRY_SLOTS,
    SUBDIR_TABLE_SIZE, block_byte_offset, block_table_slot_offset, root_slot_offset,
    total_image_size,
};

/// Raw block-table value marking a free (unallocated) block.
pub const BLOCK_FREE: u16 = 0x0000;
/// Raw block-table value marking the end of a chain.
pub const BLOCK_EOF: u16 = 0xfffe;

/// 1-based data block number, or one of the two block-table sentinels.
///
/// The same 16-bit space is used for `start_block` fields and for the
/// block-table links, so the sentinels live here rather than in a separate
/// enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockNumber(pub u16);

impl BlockNumber {
    pub const FREE: Self = Self(BLOCK_FREE);
    pub const EOF: Self = Self(BLOCK_EOF);

    #[must_use]
    pub const fn is_free(self) -> bool {
        self.0 == BLOCK_FREE
    }

    #[must_use]
    pub const fn is_eof(self) -> bool {
        self.0 == BLOCK_EOF
    }

    /// Whether this names an actual data block (`1..=N_BLOCKS`).
    #[must_use]
    pub const fn is_data(self) -> bool {
        self.0 >= 1 && (self.0 as u64) <= N_BLOCKS
    }

    /// Zero-based index into the block table and data region.
    ///
    /// Returns `None` for the sentinels and for numbers past `N_BLOCKS`.
    #[must_use]
    pub const fn index(self) -> Option<u64> {
        if self.is_data() {
            Some(self.0 as u64 - 1)
        } else {
            None
        }
    }

    /// Byte offset of this block in the image, if it is a data block.
    #[must_use]
    pub const fn byte_offset(self) -> Option<u64> {
        match self.index() {
            Some(index) => Some(block_byte_offset(index)),
            None => None,
        }
    }
}

/// Inode number handed to FUSE.
///
/// WFS has no inodes on disk. The root directory is [`InodeNumber::ROOT`];
/// every other entry is identified by the byte offset of its 64-byte slot,
/// which is stable because entries never move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InodeNumber(pub u64);

impl InodeNumber {
    pub const ROOT: Self = Self(1);
}

/// Byte offset on a `ByteDevice` (pread/pwrite semantics).
///
/// This is a unit-carrying wrapper to prevent mixing bytes and blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ByteOffset(pub u64);

impl ByteOffset {
    pub const ZERO: Self = Self(0);

    /// Add a byte count, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(self, bytes: u64) -> Option<Self> {
        self.0.checked_add(bytes).map(Self)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("insufficient data: need {needed} bytes at offset {offset}, got {actual}")]
    InsufficientData {
        needed: usize,
        offset: usize,
        actual: usize,
    },
    #[error("invalid magic: expected {expected:#x}, got {actual:#x}")]
    InvalidMagic { expected: u64, actual: u64 },
    #[error("invalid field: {field} ({reason})")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

#[inline]
pub fn ensure_slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8], ParseError> {
    let Some(end) = offset.checked_add(len) else {
        return Err(ParseError::InvalidField {
            field: "offset",
            reason: "overflow",
        });
    };

    if end > data.len() {
        return Err(ParseError::InsufficientData {
            needed: len,
            offset,
            actual: data.len().saturating_sub(offset),
        });
    }

    Ok(&data[offset..end])
}

#[inline]
pub fn read_le_u16(data: &[u8], offset: usize) -> Result<u16, ParseError> {
    let bytes = ensure_slice(data, offset, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub fn read_le_u32(data: &[u8], offset: usize) -> Result<u32, ParseError> {
    let bytes = ensure_slice(data, offset, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub fn read_fixed<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], ParseError> {
    let bytes = ensure_slice(data, offset, N)?;
    let mut out = [0_u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Bytes of a NUL-terminated field up to (not including) the first NUL.
#[must_use]
pub fn nul_terminated(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::FREE => f.write_str("free"),
            Self::EOF => f.write_str("eof"),
            Self(n) => write!(f, "{n}"),
        }
    }
}

impl fmt::Display for InodeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ByteOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_number_classification() {
        assert!(BlockNumber::FREE.is_free());
        assert!(BlockNumber::EOF.is_eof());
        assert!(!BlockNumber::FREE.is_data());
        assert!(!BlockNumber::EOF.is_data());
        assert!(BlockNumber(1).is_data());
        assert!(BlockNumber(16384).is_data());
        assert!(!BlockNumber(16385).is_data());
        assert_eq!(BlockNumber(1).index(), Some(0));
        assert_eq!(BlockNumber(16384).index(), Some(16383));
        assert_eq!(BlockNumber(0xffff).index(), None);
    }

    #[test]
    fn block_number_byte_offset_matches_layout() {
        assert_eq!(BlockNumber(1).byte_offset(), Some(DATA_START));
        assert_eq!(
            BlockNumber(9).byte_offset(),
            Some(DATA_START + 8 * BLOCK_SIZE)
        );
        assert_eq!(BlockNumber::EOF.byte_offset(), None);
    }

    #[test]
    fn block_number_display_names_sentinels() {
        assert_eq!(BlockNumber::FREE.to_string(), "free");
        assert_eq!(BlockNumber::EOF.to_string(), "eof");
        assert_eq!(BlockNumber(42).to_string(), "42");
    }

    #[test]
    fn ensure_slice_reports_shortfall() {
        let data = [0_u8; 10];
        let err = ensure_slice(&data, 8, 4).unwrap_err();
        assert_eq!(
            err,
            ParseError::InsufficientData {
                needed: 4,
                offset: 8,
                actual: 2,
            }
        );
        assert!(matches!(
            ensure_slice(&data, usize::MAX, 2),
            Err(ParseError::InvalidField { field: "offset", .. })
        ));
    }

    #[test]
    fn little_endian_readers() {
        let data = [0x34, 0x12, 0xef, 0xbe, 0xad, 0xde];
        assert_eq!(read_le_u16(&data, 0).unwrap(), 0x1234);
        assert_eq!(read_le_u32(&data, 2).unwrap(), 0xdead_beef);
        assert_eq!(read_fixed::<2>(&data, 4).unwrap(), [0xad, 0xde]);
    }

    #[test]
    fn nul_terminated_stops_at_first_nul() {
        assert_eq!(nul_terminated(b"abc\0def"), b"abc");
        assert_eq!(nul_terminated(b"full"), b"full");
        assert_eq!(nul_terminated(b"\0"), b"");
    }
}
