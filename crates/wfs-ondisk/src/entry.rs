//! Directory-entry record codec.
//!
//! ```text
//! offset  size  field
//!      0    58  name, NUL-terminated, unused bytes zero
//!     58     2  start_block (u16 LE, 1-based, 0 = unallocated)
//!     60     4  size word (u32 LE): bit 31 directory flag,
//!               bits 28..=30 reserved, bits 0..=27 byte size
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use wfs_types::{
    BlockNumber, ENTRY_SIZE, FILENAME_SIZE, MAX_NAME_LEN, ParseError, SIZE_DIRECTORY_FLAG,
    SIZE_MASK, ensure_slice, nul_terminated, read_fixed, read_le_u16, read_le_u32,
};

const START_BLOCK_OFFSET: usize = FILENAME_SIZE;
const SIZE_OFFSET: usize = FILENAME_SIZE + 2;

/// Fixed-width, NUL-padded name field.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryName([u8; FILENAME_SIZE]);

impl EntryName {
    pub const EMPTY: Self = Self([0; FILENAME_SIZE]);

    /// Build a name field from `name`.
    ///
    /// The name must be non-empty, at most [`MAX_NAME_LEN`] bytes, and free
    /// of NUL and `/`.
    pub fn new(name: &[u8]) -> Result<Self, ParseError> {
        if name.is_empty() {
            return Err(ParseError::InvalidField {
                field: "name",
                reason: "empty",
            });
        }
        if name.len() > MAX_NAME_LEN {
            return Err(ParseError::InvalidField {
                field: "name",
                reason: "longer than name field",
            });
        }
        if name.iter().any(|b| *b == 0 || *b == b'/') {
            return Err(ParseError::InvalidField {
                field: "name",
                reason: "contains NUL or separator",
            });
        }
        let mut raw = [0_u8; FILENAME_SIZE];
        raw[..name.len()].copy_from_slice(name);
        Ok(Self(raw))
    }

    #[must_use]
    pub const fn from_raw(raw: [u8; FILENAME_SIZE]) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(&self) -> &[u8; FILENAME_SIZE] {
        &self.0
    }

    /// Name bytes up to the terminator.
    ///
    /// A corrupt field with no NUL yields all 58 bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        nul_terminated(&self.0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }

    /// Exact comparison against a lookup name.
    #[must_use]
    pub fn matches(&self, name: &[u8]) -> bool {
        self.as_bytes() == name
    }

    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

impl fmt::Debug for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl fmt::Display for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

/// What an entry's content is.
///
/// On disk this is the top bit of the size word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One decoded directory-entry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: EntryName,
    pub start_block: BlockNumber,
    pub kind: EntryKind,
    /// Byte size; never exceeds [`SIZE_MASK`].
    pub size: u32,
}

impl DirectoryEntry {
    /// The distinguished empty entry, standing for the root directory.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            name: EntryName::EMPTY,
            start_block: BlockNumber::FREE,
            kind: EntryKind::Directory,
            size: 0,
        }
    }

    /// Build an entry for encoding.
    pub fn new(
        name: &[u8],
        start_block: BlockNumber,
        kind: EntryKind,
        size: u32,
    ) -> Result<Self, ParseError> {
        if size > SIZE_MASK {
            return Err(ParseError::InvalidField {
                field: "size",
                reason: "exceeds 28-bit size field",
            });
        }
        Ok(Self {
            name: EntryName::new(name)?,
            start_block,
            kind,
            size,
        })
    }

    /// Decode the first [`ENTRY_SIZE`] bytes of `bytes`.
    ///
    /// Field extraction only: any bit pattern decodes. Reserved size bits
    /// are dropped.
    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        ensure_slice(bytes, 0, ENTRY_SIZE)?;
        let name = EntryName::from_raw(read_fixed::<FILENAME_SIZE>(bytes, 0)?);
        let start_block = BlockNumber(read_le_u16(bytes, START_BLOCK_OFFSET)?);
        let word = read_le_u32(bytes, SIZE_OFFSET)?;
        let kind = if word & SIZE_DIRECTORY_FLAG == SIZE_DIRECTORY_FLAG {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        Ok(Self {
            name,
            start_block,
            kind,
            size: word & SIZE_MASK,
        })
    }

    /// Encode to the packed on-disk record. Reserved bits are written as zero.
    #[must_use]
    pub fn encode(&self) -> [u8; ENTRY_SIZE] {
        let mut out = [0_u8; ENTRY_SIZE];
        out[..FILENAME_SIZE].copy_from_slice(self.name.raw());
        out[START_BLOCK_OFFSET..SIZE_OFFSET].copy_from_slice(&self.start_block.0.to_le_bytes());
        out[SIZE_OFFSET..ENTRY_SIZE].copy_from_slice(&self.size_word().to_le_bytes());
        out
    }

    #[must_use]
    pub fn size_word(&self) -> u32 {
        let flag = match self.kind {
            EntryKind::Directory => SIZE_DIRECTORY_FLAG,
            EntryKind::File => 0,
        };
        (self.size & SIZE_MASK) | flag
    }

    /// An entry is empty iff its name's first byte is 0 or it has no start block.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() || self.start_block.is_free()
    }

    /// Empty entries double as the root-directory handle.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.is_empty()
    }

    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    #[must_use]
    pub fn size_bytes(&self) -> u32 {
        self.size & SIZE_MASK
    }

    #[must_use]
    pub fn name_str(&self) -> String {
        self.name.to_string_lossy()
    }
}
