//! Block-allocation table.
//!
//! `N_BLOCKS` little-endian u16 slots. Slot `i` holds the successor of data
//! block `i + 1`: another block number, [`BlockNumber::EOF`], or
//! [`BlockNumber::FREE`].

use serde::Serialize;
use wfs_types::{BLOCK_EOF, BLOCK_FREE, BlockNumber, ParseError, read_le_u16};

/// Successor link stored for zero-based block `index`.
pub fn parse_link(table: &[u8], index: usize) -> Result<BlockNumber, ParseError> {
    let offset = index.checked_mul(2).ok_or(ParseError::InvalidField {
        field: "index",
        reason: "overflow",
    })?;
    Ok(BlockNumber(read_le_u16(table, offset)?))
}

/// Census of block-table slot values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlockTableStats {
    /// Slots holding [`BLOCK_FREE`].
    pub free: u64,
    /// Slots terminating a chain.
    pub eof: u64,
    /// Slots linking to another data block.
    pub linked: u64,
    /// Slots holding a value that is neither a sentinel nor a block number.
    pub invalid: u64,
}

impl BlockTableStats {
    /// Slots in use by some chain.
    #[must_use]
    pub fn allocated(&self) -> u64 {
        self.eof + self.linked
    }
}

/// Count slot kinds across a raw table.
///
/// A trailing odd byte is ignored.
#[must_use]
pub fn block_table_stats(table: &[u8]) -> BlockTableStats {
    let mut stats = BlockTableStats::default();
    for pair in table.chunks_exact(2) {
        let link = BlockNumber(u16::from_le_bytes([pair[0], pair[1]]));
        match link.0 {
            BLOCK_FREE => stats.free += 1,
            BLOCK_EOF => stats.eof += 1,
            _ if link.is_data() => stats.linked += 1,
            _ => stats.invalid += 1,
        }
    }
    stats
}
