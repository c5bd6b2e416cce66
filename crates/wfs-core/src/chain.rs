//! Block-chain traversal over the allocation table.
//!
//! A file's content lives in a singly linked list of data blocks. The links
//! are the block-table slots, so every hop is one positioned 2-byte read.
//! Nothing on disk prevents cycles: each walk counts the blocks it has
//! visited and gives up at the hop ceiling.

use tracing::warn;
use wfs_block::ByteDevice;
use wfs_error::{Result, WfsError};
use wfs_types::{BLOCK_SIZE, BlockNumber, ByteOffset, N_BLOCKS, block_table_slot_offset};

/// Where a byte offset of a file lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPosition {
    pub block: BlockNumber,
    pub offset_in_block: u64,
}

pub(crate) fn chain_corruption(block: BlockNumber, detail: String) -> WfsError {
    warn!(block = block.0, %detail, "corrupt block chain");
    WfsError::corruption(u64::from(block.0), detail)
}

/// Read-only view of the block table.
#[derive(Clone, Copy)]
pub struct BlockChain<'a> {
    dev: &'a dyn ByteDevice,
    hop_ceiling: u64,
}

impl std::fmt::Debug for BlockChain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockChain")
            .field("hop_ceiling", &self.hop_ceiling)
            .finish_non_exhaustive()
    }
}

impl<'a> BlockChain<'a> {
    #[must_use]
    pub fn new(dev: &'a dyn ByteDevice) -> Self {
        Self {
            dev,
            hop_ceiling: N_BLOCKS,
        }
    }

    /// Lower the number of blocks a single walk may visit.
    ///
    /// A ceiling of zero is raised to one.
    #[must_use]
    pub fn with_hop_ceiling(mut self, ceiling: u64) -> Self {
        self.hop_ceiling = ceiling.clamp(1, N_BLOCKS);
        self
    }

    #[must_use]
    pub fn hop_ceiling(&self) -> u64 {
        self.hop_ceiling
    }

    /// Raw table slot for a data block. Caller guarantees `block.is_data()`.
    fn link(&self, block: BlockNumber, index: u64) -> Result<BlockNumber> {
        let mut raw = [0_u8; 2];
        self.dev
            .read_exact_at(ByteOffset(block_table_slot_offset(index)), &mut raw)?;
        let next = BlockNumber(u16::from_le_bytes(raw));
        tracing::trace!(from = block.0, to = next.0, "block link");
        Ok(next)
    }

    /// Successor of `current` in its chain.
    ///
    /// EOF maps to EOF. Anything that is not a data block, including the
    /// free marker, also maps to EOF so that a stray link ends the walk.
    pub fn next_block(&self, current: BlockNumber) -> Result<BlockNumber> {
        match current.index() {
            Some(index) => self.link(current, index),
            None => Ok(BlockNumber::EOF),
        }
    }

    /// Locate byte `offset` of the chain starting at `start`.
    ///
    /// Returns `None` if `start` is EOF or the chain ends before `offset`.
    /// A free link, an out-of-range block number, or a walk longer than the
    /// hop ceiling is corruption.
    pub fn block_for_offset(
        &self,
        start: BlockNumber,
        offset: u64,
    ) -> Result<Option<BlockPosition>> {
        if start.is_eof() {
            return Ok(None);
        }
        if !start.is_data() {
            return Err(chain_corruption(
                start,
                format!("chain starts at invalid block {}", start.0),
            ));
        }

        let hops = offset / BLOCK_SIZE;
        let mut block = start;
        let mut visited = 1_u64;
        for _ in 0..hops {
            let next = self.next_block(block)?;
            if next.is_eof() {
                return Ok(None);
            }
            self.check_link(block, next)?;
            visited += 1;
            if visited > self.hop_ceiling {
                return Err(chain_corruption(
                    start,
                    format!("chain exceeds {} blocks (cycle?)", self.hop_ceiling),
                ));
            }
            block = next;
        }

        Ok(Some(BlockPosition {
            block,
            offset_in_block: offset % BLOCK_SIZE,
        }))
    }

    /// Reject a free or out-of-range successor of `from`.
    pub(crate) fn check_link(&self, from: BlockNumber, next: BlockNumber) -> Result<()> {
        if next.is_free() {
            return Err(chain_corruption(
                from,
                format!("block {} links to a free slot", from.0),
            ));
        }
        if !next.is_data() {
            return Err(chain_corruption(
                from,
                format!("block {} links to out-of-range block {}", from.0, next.0),
            ));
        }
        Ok(())
    }

    /// Iterate every block of the chain starting at `start`.
    ///
    /// An EOF start yields nothing. The iterator yields one error and then
    /// stops on the first bad link.
    #[must_use]
    pub fn walk(&self, start: BlockNumber) -> ChainWalk<'a> {
        ChainWalk {
            chain: *self,
            start,
            next: Some(start),
            visited: 0,
        }
    }
}

/// Iterator returned by [`BlockChain::walk`].
#[derive(Debug)]
pub struct ChainWalk<'a> {
    chain: BlockChain<'a>,
    start: BlockNumber,
    next: Option<BlockNumber>,
    visited: u64,
}

impl ChainWalk<'_> {
    /// Blocks yielded so far.
    #[must_use]
    pub fn visited(&self) -> u64 {
        self.visited
    }
}

impl Iterator for ChainWalk<'_> {
    type Item = Result<BlockNumber>;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.next.take()?;
        if block.is_eof() {
            return None;
        }
        if !block.is_data() {
            return Some(Err(chain_corruption(
                block,
                format!("chain starts at invalid block {}", block.0),
            )));
        }
        if self.visited >= self.chain.hop_ceiling {
            return Some(Err(chain_corruption(
                self.start,
                format!("chain exceeds {} blocks (cycle?)", self.chain.hop_ceiling),
            )));
        }

        let next = match self.chain.next_block(block) {
            Ok(next) => next,
            Err(err) => return Some(Err(err)),
        };
        self.visited += 1;
        if !next.is_eof() {
            if let Err(err) = self.chain.check_link(block, next) {
                return Some(Err(err));
            }
            self.next = Some(next);
        }
        Some(Ok(block))
    }
}
