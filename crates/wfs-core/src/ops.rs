//! Inode-level operations consumed by the FUSE adapter.

use crate::WfsImage;
use crate::path::Resolved;
use crate::scan::LocatedEntry;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::time::{SystemTime, UNIX_EPOCH};
use wfs_error::{Result, WfsError};
use wfs_ondisk::{DirectoryEntry, EntryKind};
use wfs_types::{
    BLOCK_SIZE, BLOCK_TABLE_START, ByteOffset, DATA_START, ENTRIES_START, ENTRY_SIZE, InodeNumber,
    MAX_NAME_LEN, total_image_size,
};

// ── VFS semantics layer ─────────────────────────────────────────────────────

/// File type as reported to the VFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    RegularFile,
    Directory,
}

impl From<EntryKind> for FileType {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::File => Self::RegularFile,
            EntryKind::Directory => Self::Directory,
        }
    }
}

/// Stat-like attributes returned by [`FsOps::getattr`] and [`FsOps::lookup`].
///
/// WFS stores no timestamps or ownership; those fields are fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InodeAttr {
    pub ino: InodeNumber,
    pub size: u64,
    /// Number of 512-byte blocks covered by `size`.
    pub blocks: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub crtime: SystemTime,
    pub kind: FileType,
    /// POSIX permission bits.
    pub perm: u16,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u32,
    pub blksize: u32,
}

impl InodeAttr {
    /// Attributes for `entry` living at inode `ino`.
    ///
    /// The root is `0755`; every other entry is read-only `0444`.
    #[must_use]
    pub fn for_entry(ino: InodeNumber, entry: &DirectoryEntry) -> Self {
        let (kind, perm, nlink, size) = if entry.is_root() {
            (FileType::Directory, 0o755, 2, 0)
        } else if entry.is_directory() {
            (FileType::Directory, 0o444, 2, u64::from(entry.size_bytes()))
        } else {
            (FileType::RegularFile, 0o444, 1, u64::from(entry.size_bytes()))
        };
        Self {
            ino,
            size,
            blocks: size.div_ceil(BLOCK_SIZE),
            atime: UNIX_EPOCH,
            mtime: UNIX_EPOCH,
            ctime: UNIX_EPOCH,
            crtime: UNIX_EPOCH,
            kind,
            perm,
            nlink,
            uid: 0,
            gid: 0,
            rdev: 0,
            blksize: BLOCK_SIZE as u32,
        }
    }
}

/// One name in a directory listing.
///
/// `offset` is the cookie to pass back to resume after this entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub ino: InodeNumber,
    pub offset: u64,
    pub kind: FileType,
    pub name: Vec<u8>,
}

impl DirEntry {
    #[must_use]
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// Inode-addressed filesystem operations.
///
/// The FUSE adapter talks to the image only through this trait. Mutating
/// operations default to `Unsupported`.
pub trait FsOps: Send + Sync {
    /// Attributes of inode `ino`.
    fn getattr(&self, ino: InodeNumber) -> Result<InodeAttr>;

    /// Attributes of the entry `name` inside directory `parent`.
    fn lookup(&self, parent: InodeNumber, name: &OsStr) -> Result<InodeAttr>;

    /// Listing of directory `ino` starting at cookie `offset` (0 for the start).
    ///
    /// An empty result marks the end of the directory.
    fn readdir(&self, ino: InodeNumber, offset: u64) -> Result<Vec<DirEntry>>;

    /// Up to `size` bytes of file `ino` starting at `offset`.
    fn read(&self, ino: InodeNumber, offset: u64, size: u32) -> Result<Vec<u8>>;

    fn mkdir(&self, _parent: InodeNumber, _name: &OsStr) -> Result<InodeAttr> {
        Err(WfsError::Unsupported("mkdir"))
    }

    fn rmdir(&self, _parent: InodeNumber, _name: &OsStr) -> Result<()> {
        Err(WfsError::Unsupported("rmdir"))
    }

    fn create(&self, _parent: InodeNumber, _name: &OsStr) -> Result<InodeAttr> {
        Err(WfsError::Unsupported("create"))
    }

    fn write(&self, _ino: InodeNumber, _offset: u64, _data: &[u8]) -> Result<u32> {
        Err(WfsError::Unsupported("write"))
    }

    fn unlink(&self, _parent: InodeNumber, _name: &OsStr) -> Result<()> {
        Err(WfsError::Unsupported("unlink"))
    }
}

// ── Inode addressing ────────────────────────────────────────────────────────

/// Whether `offset` is the start of an entry slot in the root table or in
/// the data region.
fn is_slot_offset(offset: u64) -> bool {
    let entry = ENTRY_SIZE as u64;
    if (ENTRIES_START..BLOCK_TABLE_START).contains(&offset) {
        return (offset - ENTRIES_START) % entry == 0;
    }
    offset >= DATA_START
        && offset + entry <= total_image_size()
        && (offset - DATA_START) % entry == 0
}

impl WfsImage {
    /// Entry addressed by inode `ino`.
    ///
    /// Data-region inodes must have come out of an earlier lookup, listing
    /// or path resolution on this image.
    pub fn entry_for_inode(&self, ino: InodeNumber) -> Result<DirectoryEntry> {
        if ino == InodeNumber::ROOT {
            return Ok(DirectoryEntry::root());
        }
        if !is_slot_offset(ino.0) || !self.was_issued(ino) {
            return Err(WfsError::NotFound(format!("inode {ino}")));
        }
        let entry = self.scanner().entry_at(ByteOffset(ino.0))?;
        if entry.is_empty() {
            return Err(WfsError::NotFound(format!("inode {ino}")));
        }
        Ok(entry)
    }

    /// Attributes for a resolved path.
    #[must_use]
    pub fn attr_for(&self, resolved: &Resolved) -> InodeAttr {
        InodeAttr::for_entry(resolved.inode(), &resolved.entry())
    }

    fn directory_for_inode(&self, ino: InodeNumber) -> Result<DirectoryEntry> {
        let dir = self.entry_for_inode(ino)?;
        if !dir.is_root() && !dir.is_directory() {
            return Err(WfsError::NotDirectory);
        }
        Ok(dir)
    }
}

impl FsOps for WfsImage {
    fn getattr(&self, ino: InodeNumber) -> Result<InodeAttr> {
        let entry = self.entry_for_inode(ino)?;
        Ok(InodeAttr::for_entry(ino, &entry))
    }

    fn lookup(&self, parent: InodeNumber, name: &OsStr) -> Result<InodeAttr> {
        let dir = self.directory_for_inode(parent)?;
        let not_found = || WfsError::NotFound(name.to_string_lossy().into_owned());
        // A name no entry can hold is simply absent.
        if name.len() > MAX_NAME_LEN {
            return Err(not_found());
        }
        let located = self
            .scanner()
            .find(&dir, name.as_encoded_bytes())?
            .ok_or_else(not_found)?;
        self.note_issued(located.inode());
        Ok(InodeAttr::for_entry(located.inode(), &located.entry))
    }

    fn readdir(&self, ino: InodeNumber, offset: u64) -> Result<Vec<DirEntry>> {
        let dir = self.directory_for_inode(ino)?;
        let children: Vec<LocatedEntry> = self.scanner().entries(&dir)?;
        for child in &children {
            self.note_issued(child.inode());
        }

        let dots = [
            (ino, FileType::Directory, b".".to_vec()),
            (InodeNumber::ROOT, FileType::Directory, b"..".to_vec()),
        ];
        let listing = dots.into_iter().chain(children.into_iter().map(|child| {
            (
                child.inode(),
                FileType::from(child.entry.kind),
                child.entry.name.as_bytes().to_vec(),
            )
        }));

        Ok(listing
            .enumerate()
            .filter(|(idx, _)| (*idx as u64) >= offset)
            .map(|(idx, (ino, kind, name))| DirEntry {
                ino,
                offset: idx as u64 + 1,
                kind,
                name,
            })
            .collect())
    }

    fn read(&self, ino: InodeNumber, offset: u64, size: u32) -> Result<Vec<u8>> {
        let entry = self.entry_for_inode(ino)?;
        self.reader().read(&entry, offset, u64::from(size))
    }
}
