//! Byte layout of a WFS image.
//!
//! ```text
//! 0        16                 4112              36880                 8425488
//! | magic  | root entry table | block table     | data blocks         |
//! |        | 64 x 64 B        | 16384 x u16 LE  | 16384 x 512 B       |
//! ```

/// Size of the magic header in bytes.
pub const MAGIC_SIZE: usize = 16;

/// The four little-endian magic words at offset 0.
pub const MAGIC: [u32; 4] = [0x00c0_ffee, 0x0000_0000, 0xf00d_1350, 0x0000_beef];

/// Length of the on-disk name field, including the terminating NUL.
pub const FILENAME_SIZE: usize = 58;

/// Longest name accepted for lookup or creation.
///
/// The field could hold 57 bytes plus the NUL, but readers of the format
/// reject any component of 56 bytes or more, so names stop at 55.
pub const MAX_NAME_LEN: usize = FILENAME_SIZE - 3;

/// Size of one packed directory-entry record.
pub const ENTRY_SIZE: usize = FILENAME_SIZE + 2 + 4;

pub const BLOCK_SIZE: u64 = 512;
pub const N_BLOCKS: u64 = 16384;

/// Slots in the root directory's entry table.
pub const ROOT_ENTRY_SLOTS: usize = 64;

/// Slots scanned in a subdirectory's entry table.
///
/// This does not match [`ROOT_ENTRY_SLOTS`] and is not derived from the
/// block size (16 records span two blocks). The format does not tie the two
/// together, so neither is derived from the other.
pub const SUBDIR_ENTRY_SLOTS: usize = 16;

/// Low 28 bits of the size word carry the byte size.
pub const SIZE_MASK: u32 = 0x0fff_ffff;
/// Top bit of the size word marks a directory.
pub const SIZE_DIRECTORY_FLAG: u32 = 1 << 31;
/// Bits 28..=30 of the size word, unused by the format.
pub const SIZE_RESERVED_MASK: u32 = !(SIZE_MASK | SIZE_DIRECTORY_FLAG);

pub const ENTRIES_START: u64 = MAGIC_SIZE as u64;
pub const ROOT_TABLE_SIZE: u64 = (ROOT_ENTRY_SLOTS * ENTRY_SIZE) as u64;
pub const SUBDIR_TABLE_SIZE: u64 = (SUBDIR_ENTRY_SLOTS * ENTRY_SIZE) as u64;
pub const BLOCK_TABLE_START: u64 = ENTRIES_START + ROOT_TABLE_SIZE;
pub const BLOCK_TABLE_SIZE: u64 = N_BLOCKS * 2;
pub const DATA_START: u64 = BLOCK_TABLE_START + BLOCK_TABLE_SIZE;
pub const DATA_REGION_SIZE: u64 = N_BLOCKS * BLOCK_SIZE;

/// Minimum byte length of a well-formed image.
#[must_use]
pub const fn total_image_size() -> u64 {
    MAGIC_SIZE as u64 + ROOT_TABLE_SIZE + BLOCK_TABLE_SIZE + DATA_REGION_SIZE
}

/// Byte offset of the data block with zero-based `index`.
///
/// Callers pass `block_number - 1`; the 1-based numbering never reaches
/// this function.
#[must_use]
pub const fn block_byte_offset(index: u64) -> u64 {
    DATA_START + index * BLOCK_SIZE
}

/// Byte offset of the block-table slot for zero-based `index`.
#[must_use]
pub const fn block_table_slot_offset(index: u64) -> u64 {
    BLOCK_TABLE_START + index * 2
}

/// Byte offset of slot `slot` in the root entry table.
#[must_use]
pub const fn root_slot_offset(slot: usize) -> u64 {
    ENTRIES_START + (slot * ENTRY_SIZE) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_record_is_64_bytes() {
        assert_eq!(ENTRY_SIZE, 64);
    }

    #[test]
    fn names_stop_short_of_the_field() {
        assert_eq!(MAX_NAME_LEN, 55);
        assert!(MAX_NAME_LEN < FILENAME_SIZE - 1);
    }

    #[test]
    fn region_boundaries() {
        assert_eq!(ENTRIES_START, 16);
        assert_eq!(BLOCK_TABLE_START, 4112);
        assert_eq!(DATA_START, 36880);
        assert_eq!(total_image_size(), 36880 + 16384 * 512);
        assert_eq!(total_image_size(), DATA_START + DATA_REGION_SIZE);
    }

    #[test]
    fn block_offsets_are_zero_based() {
        assert_eq!(block_byte_offset(0), DATA_START);
        assert_eq!(block_byte_offset(4), DATA_START + 2048);
        assert_eq!(
            block_byte_offset(N_BLOCKS - 1) + BLOCK_SIZE,
            total_image_size()
        );
    }

    #[test]
    fn table_slot_offsets() {
        assert_eq!(block_table_slot_offset(0), BLOCK_TABLE_START);
        assert_eq!(
            block_table_slot_offset(N_BLOCKS - 1) + 2,
            DATA_START
        );
        assert_eq!(root_slot_offset(0), 16);
        assert_eq!(root_slot_offset(ROOT_ENTRY_SLOTS), BLOCK_TABLE_START);
    }

    #[test]
    fn root_and_subdir_slot_counts_differ() {
        // Subdirectories scan fewer slots than the root holds. Unifying the
        // two would change which entries are visible on existing images.
        assert_eq!(ROOT_ENTRY_SLOTS, 64);
        assert_eq!(SUBDIR_ENTRY_SLOTS, 16);
        assert_ne!(ROOT_ENTRY_SLOTS, SUBDIR_ENTRY_SLOTS);
        assert_eq!(SUBDIR_TABLE_SIZE, 2 * BLOCK_SIZE);
    }

    #[test]
    fn size_word_masks_partition_u32() {
        assert_eq!(SIZE_RESERVED_MASK, 0x7000_0000);
        assert_eq!(SIZE_MASK | SIZE_DIRECTORY_FLAG | SIZE_RESERVED_MASK, u32::MAX);
        assert_eq!(SIZE_MASK & SIZE_DIRECTORY_FLAG, 0);
    }
}
