#![forbid(unsafe_code)]
//! Synthetic WFS images for tests, benches and manual mounts.
//!
//! [`ImageBuilder`] lays out a full-size image in memory. The high-level
//! calls (`add_dir`, `add_file`) allocate blocks and slots the way a
//! well-formed image would; the low-level calls (`set_link`, `put_root_slot`,
//! `write_block`) poke arbitrary bytes so tests can build broken images.

pub mod fixtures;
pub mod manifest;

use anyhow::{Context, Result, bail, ensure};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use wfs_block::MemByteDevice;
use wfs_ondisk::{DirectoryEntry, EntryKind, encode_magic};
use wfs_types::{
    BLOCK_EOF, BLOCK_SIZE, BlockNumber, ENTRY_SIZE, InodeNumber, N_BLOCKS, ROOT_ENTRY_SLOTS,
    SIZE_MASK, SUBDIR_ENTRY_SLOTS, SUBDIR_TABLE_SIZE, block_table_slot_offset, root_slot_offset,
    total_image_size,
};

pub use manifest::{Fill, ImageManifest, ManifestEntry, load_manifest};

/// Multiplier for the scattered allocation order. Odd, so it permutes
/// `0..N_BLOCKS`.
const SCATTER_STRIDE: usize = 7919;

const BLOCKS: usize = N_BLOCKS as usize;
const BLOCK_LEN: usize = BLOCK_SIZE as usize;

#[derive(Debug, Clone)]
struct DirTable {
    /// First block of the table, or `None` for the root.
    start: Option<BlockNumber>,
    next_slot: usize,
    capacity: usize,
    names: HashSet<Vec<u8>>,
}

impl DirTable {
    fn slot_offset(&self, slot: usize) -> u64 {
        match self.start.and_then(BlockNumber::byte_offset) {
            Some(base) => base + (slot * ENTRY_SIZE) as u64,
            None => root_slot_offset(slot),
        }
    }
}

/// In-memory image under construction.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    bytes: Vec<u8>,
    used: Vec<bool>,
    scatter: bool,
    cursor: usize,
    dirs: HashMap<String, DirTable>,
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBuilder {
    /// Empty, well-formed image: magic, no entries, every block free.
    #[must_use]
    pub fn new() -> Self {
        let mut bytes = vec![0_u8; total_image_size() as usize];
        bytes[..16].copy_from_slice(&encode_magic());
        let mut dirs = HashMap::new();
        dirs.insert(
            "/".to_owned(),
            DirTable {
                start: None,
                next_slot: 0,
                capacity: ROOT_ENTRY_SLOTS,
                names: HashSet::new(),
            },
        );
        Self {
            bytes,
            used: vec![false; BLOCKS],
            scatter: false,
            cursor: 0,
            dirs,
        }
    }

    /// Continue building on an existing image.
    ///
    /// Blocks with a non-free table slot count as used. Only the root is
    /// known as a directory; new root entries go after its last occupied slot.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        ensure!(
            bytes.len() as u64 >= total_image_size(),
            "image is {} bytes, need {}",
            bytes.len(),
            total_image_size()
        );
        let mut builder = Self::new();
        builder.bytes = bytes;
        for index in 0..BLOCKS {
            let at = block_table_slot_offset(index as u64) as usize;
            builder.used[index] = builder.bytes[at] != 0 || builder.bytes[at + 1] != 0;
        }

        let mut last = None;
        for slot in 0..ROOT_ENTRY_SLOTS {
            let at = root_slot_offset(slot) as usize;
            let entry = DirectoryEntry::parse_from_bytes(&builder.bytes[at..at + ENTRY_SIZE])
                .context("decode root slot")?;
            if !entry.is_empty() {
                last = Some(slot);
                if let Some(root) = builder.dirs.get_mut("/") {
                    root.names.insert(entry.name.as_bytes().to_vec());
                }
            }
        }
        if let Some(root) = builder.dirs.get_mut("/") {
            root.next_slot = last.map_or(0, |slot| slot + 1);
        }
        Ok(builder)
    }

    /// Allocate file blocks in a scrambled order instead of lowest-first,
    /// so chains jump around the data region.
    #[must_use]
    pub fn scattered(mut self) -> Self {
        self.scatter = true;
        self
    }

    // ── High-level construction ─────────────────────────────────────────

    /// Add an empty directory at absolute `path`. Its parent must exist.
    ///
    /// The table takes two contiguous blocks chained `start -> start+1 -> EOF`.
    pub fn add_dir(&mut self, path: &str) -> Result<InodeNumber> {
        let (parent, name) = split_path(path)?;
        self.check_placeable(&parent, name.as_bytes())?;

        let start = self.alloc_pair().with_context(|| format!("no room for {path}"))?;
        self.raw_link(start, start.0 + 1);
        self.raw_link(BlockNumber(start.0 + 1), BLOCK_EOF);

        let entry = DirectoryEntry::new(
            name.as_bytes(),
            start,
            EntryKind::Directory,
            SUBDIR_TABLE_SIZE as u32,
        )
        .with_context(|| format!("bad directory entry {path}"))?;
        let ino = self.place(&parent, &entry)?;
        self.dirs.insert(
            normalize(path),
            DirTable {
                start: Some(start),
                next_slot: 0,
                capacity: SUBDIR_ENTRY_SLOTS,
                names: HashSet::new(),
            },
        );
        Ok(ino)
    }

    /// Add a file at absolute `path` holding `content`.
    ///
    /// An empty file gets the EOF marker as its start block.
    pub fn add_file(&mut self, path: &str, content: &[u8]) -> Result<InodeNumber> {
        let (parent, name) = split_path(path)?;
        self.check_placeable(&parent, name.as_bytes())?;
        let size = u32::try_from(content.len())
            .ok()
            .filter(|size| *size <= SIZE_MASK)
            .with_context(|| format!("{path}: {} bytes exceeds the size field", content.len()))?;

        let mut blocks = Vec::with_capacity(content.len().div_ceil(BLOCK_LEN));
        for _ in 0..content.len().div_ceil(BLOCK_LEN) {
            match self.alloc_block() {
                Some(block) => blocks.push(block),
                None => {
                    for block in &blocks {
                        self.release(*block);
                    }
                    bail!("{path}: image is out of free blocks");
                }
            }
        }

        for (i, block) in blocks.iter().enumerate() {
            let next = blocks.get(i + 1).map_or(BLOCK_EOF, |b| b.0);
            self.raw_link(*block, next);
            let chunk = &content[i * BLOCK_LEN..content.len().min((i + 1) * BLOCK_LEN)];
            self.raw_write_block(*block, 0, chunk);
        }

        let start = blocks.first().copied().unwrap_or(BlockNumber::EOF);
        let entry = DirectoryEntry::new(name.as_bytes(), start, EntryKind::File, size)
            .with_context(|| format!("bad file entry {path}"))?;
        self.place(&parent, &entry)
    }

    fn check_placeable(&self, parent: &str, name: &[u8]) -> Result<()> {
        let table = self
            .dirs
            .get(parent)
            .with_context(|| format!("parent directory {parent} does not exist"))?;
        ensure!(
            !table.names.contains(name),
            "{parent} already has an entry named {}",
            String::from_utf8_lossy(name)
        );
        ensure!(
            table.next_slot < table.capacity,
            "directory {parent} is full ({} slots)",
            table.capacity
        );
        Ok(())
    }

    fn place(&mut self, parent: &str, entry: &DirectoryEntry) -> Result<InodeNumber> {
        let table = self
            .dirs
            .get_mut(parent)
            .with_context(|| format!("parent directory {parent} does not exist"))?;
        let offset = table.slot_offset(table.next_slot);
        table.next_slot += 1;
        table.names.insert(entry.name.as_bytes().to_vec());
        self.raw_write(offset, &entry.encode());
        Ok(InodeNumber(offset))
    }

    // ── Block allocation ────────────────────────────────────────────────

    fn alloc_block(&mut self) -> Option<BlockNumber> {
        if self.scatter {
            while self.cursor < BLOCKS {
                let index = (self.cursor * SCATTER_STRIDE) % BLOCKS;
                self.cursor += 1;
                if !self.used[index] {
                    self.used[index] = true;
                    return Some(index_to_block(index));
                }
            }
        }
        let index = self.used.iter().position(|used| !used)?;
        self.used[index] = true;
        Some(index_to_block(index))
    }

    fn alloc_pair(&mut self) -> Option<BlockNumber> {
        let index = (0..BLOCKS - 1).find(|i| !self.used[*i] && !self.used[i + 1])?;
        self.used[index] = true;
        self.used[index + 1] = true;
        Some(index_to_block(index))
    }

    fn release(&mut self, block: BlockNumber) {
        if let Some(index) = block.index() {
            self.used[index as usize] = false;
        }
    }

    // ── Low-level pokes ─────────────────────────────────────────────────

    /// Set the table slot of data block `block` to `next`.
    pub fn set_link(&mut self, block: u16, next: u16) -> Result<()> {
        let block = data_block(block)?;
        self.raw_link(block, next);
        Ok(())
    }

    /// Copy `data` into data block `block` at `offset` within the block.
    pub fn write_block(&mut self, block: u16, offset: usize, data: &[u8]) -> Result<()> {
        let block = data_block(block)?;
        ensure!(
            offset + data.len() <= BLOCK_LEN,
            "write of {} bytes at {offset} overflows block {}",
            data.len(),
            block.0
        );
        self.raw_write_block(block, offset, data);
        Ok(())
    }

    /// Write `entry` into root-table slot `slot`. Returns the slot offset.
    pub fn put_root_slot(&mut self, slot: usize, entry: &DirectoryEntry) -> Result<u64> {
        ensure!(slot < ROOT_ENTRY_SLOTS, "root slot {slot} out of range");
        let offset = root_slot_offset(slot);
        self.raw_write(offset, &entry.encode());
        Ok(offset)
    }

    /// Write `entry` into slot `slot` of the table starting at block `dir_start`.
    pub fn put_slot(&mut self, dir_start: u16, slot: usize, entry: &DirectoryEntry) -> Result<u64> {
        ensure!(slot < SUBDIR_ENTRY_SLOTS, "directory slot {slot} out of range");
        let start = data_block(dir_start)?;
        let base = start
            .byte_offset()
            .with_context(|| format!("block {dir_start} has no data offset"))?;
        ensure!(
            base + SUBDIR_TABLE_SIZE <= total_image_size(),
            "table at block {dir_start} runs past the data region"
        );
        let offset = base + (slot * ENTRY_SIZE) as u64;
        self.raw_write(offset, &entry.encode());
        Ok(offset)
    }

    /// Overwrite raw image bytes at `offset`.
    pub fn write_raw(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(data.len() as u64)
            .context("raw write overflows")?;
        ensure!(
            end <= self.bytes.len() as u64,
            "raw write past end of image: {offset}+{}",
            data.len()
        );
        self.raw_write(offset, data);
        Ok(())
    }

    /// Caller guarantees the range is inside the image.
    fn raw_write(&mut self, offset: u64, data: &[u8]) {
        let start = offset as usize;
        self.bytes[start..start + data.len()].copy_from_slice(data);
    }

    /// Caller guarantees `block.is_data()`.
    fn raw_link(&mut self, block: BlockNumber, next: u16) {
        if let Some(index) = block.index() {
            self.used[index as usize] = true;
            self.raw_write(block_table_slot_offset(index), &next.to_le_bytes());
        }
    }

    fn raw_write_block(&mut self, block: BlockNumber, offset: usize, data: &[u8]) {
        if let Some(base) = block.byte_offset() {
            self.raw_write(base + offset as u64, data);
        }
    }

    // ── Output ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn build(self) -> MemByteDevice {
        MemByteDevice::new(self.bytes)
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, &self.bytes).with_context(|| format!("failed to write {}", path.display()))
    }
}

fn index_to_block(index: usize) -> BlockNumber {
    BlockNumber((index + 1) as u16)
}

fn data_block(block: u16) -> Result<BlockNumber> {
    let block = BlockNumber(block);
    ensure!(block.is_data(), "block {} is not a data block", block.0);
    Ok(block)
}

/// Canonical form of an absolute path: single separators, no trailing one.
fn normalize(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    format!("/{}", parts.join("/"))
}

/// Split an absolute path into its normalized parent and final component.
fn split_path(path: &str) -> Result<(String, String)> {
    ensure!(path.starts_with('/'), "path must be absolute: {path}");
    let mut parts: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    let name = parts.pop().with_context(|| format!("path names no entry: {path}"))?;
    Ok((format!("/{}", parts.join("/")), name.to_owned()))
}
