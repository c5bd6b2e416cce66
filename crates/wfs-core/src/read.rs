//! File content reads.

use crate::chain::{BlockChain, chain_corruption};
use tracing::debug;
use wfs_block::ByteDevice;
use wfs_error::{Result, WfsError};
use wfs_ondisk::DirectoryEntry;
use wfs_types::{BLOCK_SIZE, ByteOffset};

/// Reads byte ranges of files by following their block chains.
#[derive(Clone, Copy)]
pub struct FileReader<'a> {
    dev: &'a dyn ByteDevice,
    chain: BlockChain<'a>,
}

impl std::fmt::Debug for FileReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileReader")
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

impl<'a> FileReader<'a> {
    #[must_use]
    pub fn new(dev: &'a dyn ByteDevice) -> Self {
        Self {
            dev,
            chain: BlockChain::new(dev),
        }
    }

    /// Use `chain` for traversal, e.g. one with a lowered hop ceiling.
    #[must_use]
    pub fn with_chain(mut self, chain: BlockChain<'a>) -> Self {
        self.chain = chain;
        self
    }

    /// Read up to `length` bytes of `entry` starting at `offset`.
    ///
    /// The result holds exactly `min(length, size - offset)` bytes.
    pub fn read(&self, entry: &DirectoryEntry, offset: u64, length: u64) -> Result<Vec<u8>> {
        if entry.is_root() || entry.is_directory() {
            return Err(WfsError::IsDirectory);
        }
        let size = u64::from(entry.size_bytes());
        if offset > size {
            return Err(WfsError::OutOfRange { offset, size });
        }
        let wanted = length.min(size - offset);
        if wanted == 0 {
            return Ok(Vec::new());
        }

        let start = entry.start_block;
        let Some(position) = self.chain.block_for_offset(start, offset)? else {
            return Err(chain_corruption(
                start,
                format!(
                    "{}: chain ends before offset {offset} of {size}-byte file",
                    entry.name
                ),
            ));
        };

        // `wanted` never exceeds the 28-bit size field.
        let total = usize::try_from(wanted)
            .map_err(|_| WfsError::InvalidArgument(format!("read of {wanted} bytes")))?;
        let mut out = vec![0_u8; total];
        let mut block = position.block;
        let mut intra = position.offset_in_block;
        let mut filled = 0_usize;
        let mut visited = offset / BLOCK_SIZE + 1;

        loop {
            let data_offset = block.byte_offset().ok_or_else(|| {
                chain_corruption(block, format!("block {} is not a data block", block.0))
            })?;
            let step = (total - filled).min((BLOCK_SIZE - intra) as usize);
            self.dev.read_exact_at(
                ByteOffset(data_offset + intra),
                &mut out[filled..filled + step],
            )?;
            filled += step;
            if filled == total {
                break;
            }

            let next = self.chain.next_block(block)?;
            if next.is_eof() || next.is_free() {
                return Err(chain_corruption(
                    block,
                    format!(
                        "{}: chain ends with {} of {size} bytes still owed",
                        entry.name,
                        total - filled
                    ),
                ));
            }
            self.chain.check_link(block, next)?;
            visited += 1;
            if visited > self.chain.hop_ceiling() {
                return Err(chain_corruption(
                    start,
                    format!("chain exceeds {} blocks (cycle?)", self.chain.hop_ceiling()),
                ));
            }
            block = next;
            intra = 0;
        }

        debug!(name = %entry.name, offset, len = filled, "read file range");
        Ok(out)
    }

    /// Whole content of `entry`.
    pub fn read_to_end(&self, entry: &DirectoryEntry) -> Result<Vec<u8>> {
        self.read(entry, 0, u64::from(entry.size_bytes()))
    }
}
