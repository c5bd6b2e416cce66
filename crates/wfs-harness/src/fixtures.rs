//! Canonical images shared by the test suites.

use crate::ImageBuilder;
use anyhow::Result;
use wfs_ondisk::{DirectoryEntry, EntryKind, EntryName};
use wfs_types::{BLOCK_EOF, BLOCK_SIZE, BlockNumber, N_BLOCKS, root_slot_offset};

/// Declared size of `/chain.bin` in [`two_block_chain`].
pub const TWO_BLOCK_SIZE: u32 = 900;

/// Declared size of `/loop.bin` in [`cyclic_chain`]: one block more than a
/// chain can hold without repeating.
pub const CYCLIC_SIZE: u32 = ((N_BLOCKS + 1) * BLOCK_SIZE) as u32;

/// Deterministic content for data block `block`.
#[must_use]
pub fn block_fill(block: u16) -> Vec<u8> {
    (0..BLOCK_SIZE as usize)
        .map(|i| (usize::from(block) * 37 + i) as u8)
        .collect()
}

fn root_file(name: &'static [u8], start: u16, size: u32) -> DirectoryEntry {
    DirectoryEntry {
        name: EntryName::from_raw(padded(name)),
        start_block: BlockNumber(start),
        kind: EntryKind::File,
        size,
    }
}

fn padded(name: &[u8]) -> [u8; wfs_types::FILENAME_SIZE] {
    let mut raw = [0_u8; wfs_types::FILENAME_SIZE];
    raw[..name.len()].copy_from_slice(name);
    raw
}

/// `/chain.bin`: blocks `5 -> 9 -> EOF`, 900 bytes, in root slot 0.
#[must_use]
pub fn two_block_chain() -> ImageBuilder {
    let mut builder = ImageBuilder::new();
    builder.raw_link(BlockNumber(5), 9);
    builder.raw_link(BlockNumber(9), BLOCK_EOF);
    builder.raw_write_block(BlockNumber(5), 0, &block_fill(5));
    builder.raw_write_block(BlockNumber(9), 0, &block_fill(9));
    builder.raw_write(
        root_slot_offset(0),
        &root_file(b"chain.bin", 5, TWO_BLOCK_SIZE).encode(),
    );
    builder
}

/// `/loop.bin`: blocks `3 -> 7 -> 3`, in root slot 0.
#[must_use]
pub fn cyclic_chain() -> ImageBuilder {
    let mut builder = ImageBuilder::new();
    builder.raw_link(BlockNumber(3), 7);
    builder.raw_link(BlockNumber(7), 3);
    builder.raw_write(
        root_slot_offset(0),
        &root_file(b"loop.bin", 3, CYCLIC_SIZE).encode(),
    );
    builder
}

/// A small, well-formed tree for manual mounts and CLI tests.
///
/// ```text
/// /README            text, one block
/// /docs/             directory
/// /docs/guide.txt    text, three blocks
/// /docs/empty        zero bytes
/// /data/             directory
/// /data/pattern.bin  8 KiB, scattered chain
/// ```
pub fn sample_tree() -> Result<ImageBuilder> {
    let mut builder = ImageBuilder::new().scattered();
    builder.add_file("/README", b"WFS sample image.\nMount it read-only and look around.\n")?;
    builder.add_dir("/docs")?;
    let guide: Vec<u8> = b"Blocks are 512 bytes and chained through the block table.\n"
        .iter()
        .copied()
        .cycle()
        .take(1400)
        .collect();
    builder.add_file("/docs/guide.txt", &guide)?;
    builder.add_file("/docs/empty", b"")?;
    builder.add_dir("/data")?;
    let pattern: Vec<u8> = (0..8192_u32).map(|i| (i % 253) as u8).collect();
    builder.add_file("/data/pattern.bin", &pattern)?;
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_fill_differs_between_blocks() {
        assert_eq!(block_fill(5).len(), 512);
        assert_ne!(block_fill(5), block_fill(9));
    }

    #[test]
    fn cyclic_size_fits_size_field() {
        assert!(CYCLIC_SIZE <= wfs_types::SIZE_MASK);
        assert!(u64::from(CYCLIC_SIZE) > N_BLOCKS * BLOCK_SIZE);
    }

    #[test]
    fn sample_tree_builds() {
        assert!(sample_tree().is_ok());
    }
}
