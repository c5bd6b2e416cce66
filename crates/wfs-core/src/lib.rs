#![forbid(unsafe_code)]
//! WFS format interpreter.
//!
//! [`WfsImage`] owns a validated byte device and hands out the borrowed
//! components that do the work:
//!
//! - [`BlockChain`] follows block-table links;
//! - [`DirectoryScanner`] reads and searches directory tables;
//! - [`PathResolver`] walks absolute paths from the root;
//! - [`FileReader`] reads byte ranges of files.
//!
//! Each component borrows the device for its lifetime and recomputes
//! everything from the image on every call. There is no cache. The only
//! state the image keeps is the set of data-region inodes it has handed
//! out, so that inode numbers it never issued are rejected.

pub mod chain;
pub mod ops;
pub mod path;
pub mod read;
pub mod scan;
pub mod verify;

pub use chain::{BlockChain, BlockPosition, ChainWalk};
pub use ops::{DirEntry, FileType, FsOps, InodeAttr};
pub use path::{PathResolver, Resolved, basename};
pub use read::FileReader;
pub use scan::{DirectoryScanner, LocatedEntry, TableLocation};
pub use verify::{Finding, FindingKind, IntegrityReport, verify_image};
pub use wfs_block::{ByteDevice, FileByteDevice, MemByteDevice};
pub use wfs_error::{Result, WfsError};
pub use wfs_ondisk::{BlockTableStats, DirectoryEntry, EntryKind, EntryName};
pub use wfs_types::{BlockNumber, ByteOffset, InodeNumber};

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};
use wfs_types::{BLOCK_TABLE_SIZE, BLOCK_TABLE_START, DATA_START, ParseError, total_image_size};

/// Options for opening an image.
///
/// Validation is on by default. Turn it off only to poke at a damaged
/// image with the diagnostic tools.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Skip the minimum-size and magic checks.
    pub skip_validation: bool,
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    pub name: String,
    pub kind: EntryKind,
    pub size: u32,
}

/// Kind and size of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntryAttr {
    pub kind: EntryKind,
    pub size: u64,
}

/// An opened WFS image.
pub struct WfsImage {
    dev: Box<dyn ByteDevice>,
    /// Data-region slot offsets returned by lookups, listings and path
    /// resolution. Root-table slots need no entry.
    issued: RwLock<HashSet<u64>>,
}

impl std::fmt::Debug for WfsImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WfsImage")
            .field("dev_len", &self.dev.len_bytes())
            .field("issued", &self.issued.read().len())
            .finish()
    }
}

impl WfsImage {
    /// Open the image at `path` read-only, with validation.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, &OpenOptions::default())
    }

    pub fn open_with_options(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        let dev = FileByteDevice::open(path.as_ref())?;
        Self::from_device(Box::new(dev), options)
    }

    /// Wrap an already-opened device.
    ///
    /// Fails with `Format` if the device is smaller than a full image or
    /// carries the wrong magic, unless validation is skipped.
    pub fn from_device(dev: Box<dyn ByteDevice>, options: &OpenOptions) -> Result<Self> {
        let len = dev.len_bytes();
        if !options.skip_validation {
            let needed = total_image_size();
            if len < needed {
                return Err(WfsError::Format(format!(
                    "image is {len} bytes, too small to contain a WFS file system ({needed} bytes)"
                )));
            }
            let magic = wfs_block::read_magic_region(&*dev)?;
            Self::validate_magic(&magic)?;
        }
        info!(len, skip_validation = options.skip_validation, "opened WFS image");
        Ok(Self {
            dev,
            issued: RwLock::new(HashSet::new()),
        })
    }

    /// Check a 16-byte header against the WFS magic.
    pub fn validate_magic(bytes: &[u8]) -> Result<()> {
        wfs_ondisk::validate_magic(bytes)
            .map_err(|e| WfsError::Format(format!("image has incorrect magic number: {e}")))
    }

    #[must_use]
    pub fn device(&self) -> &dyn ByteDevice {
        &*self.dev
    }

    #[must_use]
    pub fn chain(&self) -> BlockChain<'_> {
        BlockChain::new(self.device())
    }

    #[must_use]
    pub fn scanner(&self) -> DirectoryScanner<'_> {
        DirectoryScanner::new(self.device())
    }

    #[must_use]
    pub fn resolver(&self) -> PathResolver<'_> {
        PathResolver::new(self.device())
    }

    #[must_use]
    pub fn reader(&self) -> FileReader<'_> {
        FileReader::new(self.device())
    }

    pub fn resolve(&self, path: &str) -> Result<DirectoryEntry> {
        self.resolver().resolve(path)
    }

    pub fn resolve_located(&self, path: &str) -> Result<Resolved> {
        let resolved = self.resolver().resolve_located(path)?;
        self.note_issued(resolved.inode());
        Ok(resolved)
    }

    /// Record that `ino` was handed out to a caller.
    pub(crate) fn note_issued(&self, ino: InodeNumber) {
        if ino.0 >= DATA_START {
            self.issued.write().insert(ino.0);
        }
    }

    /// Whether `ino` is a root-table slot or a data-region slot handed out
    /// earlier.
    pub(crate) fn was_issued(&self, ino: InodeNumber) -> bool {
        ino.0 < DATA_START || self.issued.read().contains(&ino.0)
    }

    /// Non-empty entries of directory `dir`, in table order.
    pub fn list_directory(&self, dir: &DirectoryEntry) -> Result<Vec<EntryInfo>> {
        let mut out = Vec::new();
        self.scanner().for_each(dir, |located| {
            out.push(EntryInfo {
                name: located.entry.name_str(),
                kind: located.entry.kind,
                size: located.entry.size_bytes(),
            });
        })?;
        debug!(count = out.len(), "listed directory");
        Ok(out)
    }

    /// Kind and size of `entry`. The root reports a zero-sized directory.
    #[must_use]
    pub fn get_attributes(&self, entry: &DirectoryEntry) -> EntryAttr {
        if entry.is_root() {
            return EntryAttr {
                kind: EntryKind::Directory,
                size: 0,
            };
        }
        EntryAttr {
            kind: entry.kind,
            size: u64::from(entry.size_bytes()),
        }
    }

    /// Read up to `length` bytes of `entry` starting at `offset`.
    ///
    /// The inode-addressed form is [`FsOps::read`].
    pub fn read(&self, entry: &DirectoryEntry, offset: u64, length: u64) -> Result<Vec<u8>> {
        self.reader().read(entry, offset, length)
    }

    pub fn block_table_stats(&self) -> Result<BlockTableStats> {
        let table = read_block_table(self.device())?;
        Ok(wfs_ondisk::block_table_stats(&table))
    }

    pub fn verify(&self) -> Result<IntegrityReport> {
        verify_image(self.device())
    }
}

/// Whole block table in one read.
pub(crate) fn read_block_table(dev: &dyn ByteDevice) -> Result<Vec<u8>> {
    let mut table = vec![0_u8; BLOCK_TABLE_SIZE as usize];
    dev.read_exact_at(ByteOffset(BLOCK_TABLE_START), &mut table)?;
    Ok(table)
}

/// Map a byte-level decode failure to the runtime error.
///
/// Magic and field faults are format errors; a short buffer while decoding
/// live metadata means the image is damaged.
pub(crate) fn parse_to_wfs_error(e: &ParseError) -> WfsError {
    match e {
        ParseError::InvalidMagic { .. } | ParseError::InvalidField { .. } => {
            WfsError::Format(e.to_string())
        }
        ParseError::InsufficientData { .. } => WfsError::Corruption {
            block: 0,
            detail: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wfs_harness::{ImageBuilder, fixtures};

    #[test]
    fn open_rejects_small_image() {
        let mut bytes = ImageBuilder::new().into_bytes();
        bytes.truncate(bytes.len() - 1);
        let err = WfsImage::from_device(Box::new(MemByteDevice::new(bytes)), &OpenOptions::default())
            .unwrap_err();
        assert!(matches!(err, WfsError::Format(_)), "{err:?}");
        assert!(err.is_corrupt_format());
    }

    #[test]
    fn open_rejects_bad_magic() {
        let mut bytes = ImageBuilder::new().into_bytes();
        bytes[0] ^= 0xff;
        let dev = Box::new(MemByteDevice::new(bytes.clone()));
        let err = WfsImage::from_device(dev, &OpenOptions::default()).unwrap_err();
        assert!(matches!(err, WfsError::Format(_)));
        assert!(err.to_string().contains("magic"));

        let skipped = OpenOptions {
            skip_validation: true,
        };
        assert!(WfsImage::from_device(Box::new(MemByteDevice::new(bytes)), &skipped).is_ok());
    }

    #[test]
    fn open_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), fixtures::two_block_chain().into_bytes()).unwrap();
        let image = WfsImage::open(file.path()).unwrap();
        let entry = image.resolve("/chain.bin").unwrap();
        assert_eq!(image.read(&entry, 0, 900).unwrap().len(), 900);
    }

    #[test]
    fn facade_operations() {
        let mut builder = ImageBuilder::new();
        builder.add_dir("/d").unwrap();
        builder.add_file("/d/one", b"1").unwrap();
        builder.add_file("/d/two", b"22").unwrap();
        let image =
            WfsImage::from_device(Box::new(builder.build()), &OpenOptions::default()).unwrap();

        let root = image.resolve("/").unwrap();
        assert_eq!(
            image.get_attributes(&root),
            EntryAttr {
                kind: EntryKind::Directory,
                size: 0
            }
        );

        let d = image.resolve("/d").unwrap();
        let listing = image.list_directory(&d).unwrap();
        assert_eq!(
            listing,
            vec![
                EntryInfo {
                    name: "one".into(),
                    kind: EntryKind::File,
                    size: 1
                },
                EntryInfo {
                    name: "two".into(),
                    kind: EntryKind::File,
                    size: 2
                },
            ]
        );
        let two = image.resolve("/d/two").unwrap();
        assert_eq!(image.get_attributes(&two).size, 2);
        assert_eq!(image.read(&two, 0, 10).unwrap(), b"22");
        assert!(matches!(
            image.list_directory(&two),
            Err(WfsError::NotDirectory)
        ));
    }

    #[test]
    fn stats_count_chains() {
        let image = WfsImage::from_device(
            Box::new(fixtures::two_block_chain().build()),
            &OpenOptions::default(),
        )
        .unwrap();
        let stats = image.block_table_stats().unwrap();
        assert_eq!(stats.linked, 1);
        assert_eq!(stats.eof, 1);
        assert_eq!(stats.free, 16382);
        assert_eq!(stats.invalid, 0);
    }

    #[test]
    fn validate_magic_accepts_encoded_header() {
        WfsImage::validate_magic(&wfs_ondisk::encode_magic()).unwrap();
        assert!(matches!(
            WfsImage::validate_magic(&[0_u8; 16]),
            Err(WfsError::Format(_))
        ));
        assert!(matches!(
            WfsImage::validate_magic(&[0_u8; 4]),
            Err(WfsError::Format(_))
        ));
    }

    #[test]
    fn parse_error_mapping() {
        let e = parse_to_wfs_error(&ParseError::InvalidField {
            field: "name",
            reason: "empty",
        });
        assert!(matches!(e, WfsError::Format(_)));
        let e = parse_to_wfs_error(&ParseError::InsufficientData {
            needed: 64,
            offset: 0,
            actual: 10,
        });
        assert!(matches!(e, WfsError::Corruption { block: 0, .. }));
    }
}
