//! Directory table scanning.
//!
//! A directory is a fixed array of 64-byte entry records. The root's array
//! sits in the header at [`ENTRIES_START`]; a subdirectory's starts at its
//! first data block and is read as one contiguous run, whatever the block
//! table says about the blocks it spans.

use crate::parse_to_wfs_error;
use serde::Serialize;
use tracing::{trace, warn};
use wfs_block::ByteDevice;
use wfs_error::{Result, WfsError};
use wfs_ondisk::DirectoryEntry;
use wfs_types::{
    ByteOffset, ENTRIES_START, ENTRY_SIZE, InodeNumber, MAX_NAME_LEN, ROOT_ENTRY_SLOTS,
    SUBDIR_ENTRY_SLOTS, SUBDIR_TABLE_SIZE, total_image_size,
};

/// A decoded entry together with the byte offset of its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatedEntry {
    pub offset: ByteOffset,
    pub entry: DirectoryEntry,
}

impl LocatedEntry {
    /// Inode number of this entry (its slot offset).
    #[must_use]
    pub fn inode(&self) -> InodeNumber {
        InodeNumber(self.offset.0)
    }
}

/// Placement of one directory's entry table in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableLocation {
    pub offset: u64,
    pub slots: usize,
}

impl TableLocation {
    #[must_use]
    pub fn byte_len(&self) -> u64 {
        (self.slots * ENTRY_SIZE) as u64
    }
}

/// Enumerates and searches directory tables.
#[derive(Clone, Copy)]
pub struct DirectoryScanner<'a> {
    dev: &'a dyn ByteDevice,
}

impl std::fmt::Debug for DirectoryScanner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryScanner")
            .field("dev_len", &self.dev.len_bytes())
            .finish()
    }
}

impl<'a> DirectoryScanner<'a> {
    #[must_use]
    pub fn new(dev: &'a dyn ByteDevice) -> Self {
        Self { dev }
    }

    /// Where the table of `dir` lives.
    ///
    /// The empty entry is the root. Any other entry must be a directory
    /// whose table fits inside the data region.
    pub fn table_location(dir: &DirectoryEntry) -> Result<TableLocation> {
        if dir.is_root() {
            return Ok(TableLocation {
                offset: ENTRIES_START,
                slots: ROOT_ENTRY_SLOTS,
            });
        }
        if !dir.is_directory() {
            return Err(WfsError::NotDirectory);
        }

        let start = dir.start_block;
        let Some(offset) = start.byte_offset() else {
            warn!(start = start.0, name = %dir.name, "directory start block out of range");
            return Err(WfsError::corruption(
                u64::from(start.0),
                format!("directory {} starts at invalid block {}", dir.name, start.0),
            ));
        };
        if offset + SUBDIR_TABLE_SIZE > total_image_size() {
            warn!(start = start.0, name = %dir.name, "directory table runs past data region");
            return Err(WfsError::corruption(
                u64::from(start.0),
                format!("directory {} table runs past the data region", dir.name),
            ));
        }
        Ok(TableLocation {
            offset,
            slots: SUBDIR_ENTRY_SLOTS,
        })
    }

    /// Non-empty entries of `dir` in table order.
    fn occupied(&self, dir: &DirectoryEntry) -> Result<Vec<LocatedEntry>> {
        let location = Self::table_location(dir)?;
        let mut table = vec![0_u8; location.slots * ENTRY_SIZE];
        self.dev
            .read_exact_at(ByteOffset(location.offset), &mut table)?;

        let mut out = Vec::new();
        for (slot, record) in table.chunks_exact(ENTRY_SIZE).enumerate() {
            let entry = DirectoryEntry::parse_from_bytes(record).map_err(|e| parse_to_wfs_error(&e))?;
            if entry.is_empty() {
                continue;
            }
            out.push(LocatedEntry {
                offset: ByteOffset(location.offset + (slot * ENTRY_SIZE) as u64),
                entry,
            });
        }
        trace!(offset = location.offset, occupied = out.len(), "scanned directory table");
        Ok(out)
    }

    /// First non-empty entry of `dir` named exactly `name`.
    pub fn find(&self, dir: &DirectoryEntry, name: &[u8]) -> Result<Option<LocatedEntry>> {
        check_lookup_name(name)?;
        Ok(self
            .occupied(dir)?
            .into_iter()
            .find(|located| located.entry.name.matches(name)))
    }

    /// Number of non-empty slots in `dir`.
    pub fn count(&self, dir: &DirectoryEntry) -> Result<usize> {
        Ok(self.occupied(dir)?.len())
    }

    /// Call `visitor` once per non-empty entry of `dir`, in table order.
    pub fn for_each<F>(&self, dir: &DirectoryEntry, mut visitor: F) -> Result<()>
    where
        F: FnMut(&LocatedEntry),
    {
        for located in &self.occupied(dir)? {
            visitor(located);
        }
        Ok(())
    }

    /// All non-empty entries of `dir`.
    pub fn entries(&self, dir: &DirectoryEntry) -> Result<Vec<LocatedEntry>> {
        self.occupied(dir)
    }

    /// Decode the record at a raw slot offset.
    pub fn entry_at(&self, offset: ByteOffset) -> Result<DirectoryEntry> {
        let mut record = [0_u8; ENTRY_SIZE];
        self.dev.read_exact_at(offset, &mut record)?;
        DirectoryEntry::parse_from_bytes(&record).map_err(|e| parse_to_wfs_error(&e))
    }
}

/// Lookup names must be non-empty and fit the name field.
pub(crate) fn check_lookup_name(name: &[u8]) -> Result<()> {
    if name.is_empty() {
        return Err(WfsError::InvalidArgument("empty lookup name".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(WfsError::InvalidArgument(format!(
            "name is {} bytes, at most {MAX_NAME_LEN} allowed",
            name.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wfs_harness::ImageBuilder;
    use wfs_ondisk::EntryKind;
    use wfs_types::{BlockNumber, N_BLOCKS, root_slot_offset};

    fn file(name: &str, start: u16, size: u32) -> DirectoryEntry {
        DirectoryEntry::new(name.as_bytes(), BlockNumber(start), EntryKind::File, size).unwrap()
    }

    #[test]
    fn root_table_location() {
        let loc = DirectoryScanner::table_location(&DirectoryEntry::root()).unwrap();
        assert_eq!(loc.offset, 16);
        assert_eq!(loc.slots, ROOT_ENTRY_SLOTS);
        assert_eq!(loc.byte_len(), 4096);
    }

    #[test]
    fn file_is_not_a_directory() {
        let err = DirectoryScanner::table_location(&file("a", 3, 1)).unwrap_err();
        assert!(matches!(err, WfsError::NotDirectory));
    }

    #[test]
    fn directory_outside_data_region_is_corruption() {
        let bad_start =
            DirectoryEntry::new(b"d", BlockNumber(0xfffe), EntryKind::Directory, 0).unwrap();
        assert!(matches!(
            DirectoryScanner::table_location(&bad_start),
            Err(WfsError::Corruption { block: 0xfffe, .. })
        ));

        // Last block: a two-block table would run off the end.
        let last = u16::try_from(N_BLOCKS).unwrap();
        let tail = DirectoryEntry::new(b"d", BlockNumber(last), EntryKind::Directory, 0).unwrap();
        assert!(matches!(
            DirectoryScanner::table_location(&tail),
            Err(WfsError::Corruption { .. })
        ));
    }

    #[test]
    fn count_ignores_slot_order() {
        let mut builder = ImageBuilder::new();
        for (slot, name) in [(63, "z"), (0, "a"), (17, "m"), (40, "q")] {
            builder.put_root_slot(slot, &file(name, 2, 0)).unwrap();
        }
        // Named but unallocated: empty.
        builder.put_root_slot(5, &file("ghost", 0, 0)).unwrap();
        let dev = builder.build();
        let scanner = DirectoryScanner::new(&dev);
        assert_eq!(scanner.count(&DirectoryEntry::root()).unwrap(), 4);

        let mut names = Vec::new();
        scanner
            .for_each(&DirectoryEntry::root(), |e| names.push(e.entry.name_str()))
            .unwrap();
        assert_eq!(names, vec!["a", "m", "q", "z"]);
    }

    #[test]
    fn find_returns_first_match_with_offset() {
        let mut builder = ImageBuilder::new();
        builder.put_root_slot(3, &file("dup", 2, 10)).unwrap();
        builder.put_root_slot(9, &file("dup", 4, 20)).unwrap();
        let dev = builder.build();
        let scanner = DirectoryScanner::new(&dev);

        let hit = scanner.find(&DirectoryEntry::root(), b"dup").unwrap().unwrap();
        assert_eq!(hit.offset, ByteOffset(root_slot_offset(3)));
        assert_eq!(hit.entry.size_bytes(), 10);
        assert_eq!(hit.inode(), InodeNumber(root_slot_offset(3)));
        assert!(scanner.find(&DirectoryEntry::root(), b"du").unwrap().is_none());
    }

    #[test]
    fn find_rejects_bad_names() {
        let dev = ImageBuilder::new().build();
        let scanner = DirectoryScanner::new(&dev);
        assert!(matches!(
            scanner.find(&DirectoryEntry::root(), b""),
            Err(WfsError::InvalidArgument(_))
        ));
        let long = vec![b'x'; MAX_NAME_LEN + 1];
        assert!(matches!(
            scanner.find(&DirectoryEntry::root(), &long),
            Err(WfsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn subdirectory_scans_sixteen_slots() {
        let mut builder = ImageBuilder::new();
        builder.add_dir("/sub").unwrap();
        for i in 0..SUBDIR_ENTRY_SLOTS {
            builder.add_file(&format!("/sub/f{i}"), b"x").unwrap();
        }
        let dev = builder.build();
        let scanner = DirectoryScanner::new(&dev);
        let sub = scanner.find(&DirectoryEntry::root(), b"sub").unwrap().unwrap();
        assert_eq!(scanner.count(&sub.entry).unwrap(), SUBDIR_ENTRY_SLOTS);
        assert!(scanner.find(&sub.entry, b"f15").unwrap().is_some());

        let entries = scanner.entries(&sub.entry).unwrap();
        assert_eq!(entries.len(), SUBDIR_ENTRY_SLOTS);
        let at = scanner.entry_at(entries[0].offset).unwrap();
        assert_eq!(at, entries[0].entry);
    }
}
