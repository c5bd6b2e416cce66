//! Whole-image consistency check.
//!
//! Walks the directory tree from the root and traces every chain it finds.
//! Problems become [`Finding`]s rather than errors so one bad file does not
//! hide the rest of the report. Only device I/O failures abort the walk.

use crate::chain::BlockChain;
use crate::read_block_table;
use crate::scan::{DirectoryScanner, LocatedEntry};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use wfs_block::ByteDevice;
use wfs_error::{Result, WfsError};
use wfs_ondisk::{BlockTableStats, DirectoryEntry, EntryName, block_table_stats, parse_link};
use wfs_types::{BLOCK_SIZE, BlockNumber, N_BLOCKS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingKind {
    /// The entry's first block is neither EOF nor a data block.
    BadStart { start: u16 },
    /// A chain links to a free slot.
    FreeLink { block: u16 },
    /// A chain links to a value outside the block range.
    OutOfRangeLink { block: u16, next: u16 },
    /// A chain revisits one of its own blocks.
    ChainCycle { block: u16 },
    /// The declared size needs more blocks than an intact chain holds.
    SizeExceedsChain { size: u64, capacity: u64 },
    /// A block already belongs to another entry's chain.
    SharedBlock { block: u16, owner: String },
    /// A directory table does not fit the data region.
    TableOutOfRange { start: u16 },
    /// A directory table was reached twice during the walk.
    DirectoryLoop { offset: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub path: String,
    #[serde(flatten)]
    pub kind: FindingKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub findings: Vec<Finding>,
    pub directories: u64,
    pub files: u64,
    /// Distinct blocks reached through some chain.
    pub referenced_blocks: u64,
    /// Allocated table slots that no chain reaches.
    pub orphaned_blocks: u64,
    pub table: BlockTableStats,
}

impl IntegrityReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// One entry reached by the walk, linked to the directory that holds it.
struct Node {
    parent: Option<usize>,
    name: EntryName,
}

/// A directory being walked and the children still to visit.
type Frame = (usize, std::vec::IntoIter<LocatedEntry>);

const ROOT_NODE: usize = 0;

struct Verifier<'a> {
    scanner: DirectoryScanner<'a>,
    chain: BlockChain<'a>,
    nodes: Vec<Node>,
    owners: HashMap<BlockNumber, usize>,
    tables: HashSet<u64>,
    findings: Vec<Finding>,
    directories: u64,
    files: u64,
}

impl Verifier<'_> {
    /// Absolute path of `node`, rebuilt from its ancestors.
    fn path_of(&self, node: usize) -> String {
        let mut names = Vec::new();
        let mut cursor = Some(node);
        while let Some(idx) = cursor {
            let entry = &self.nodes[idx];
            if entry.parent.is_some() {
                names.push(entry.name.to_string());
            }
            cursor = entry.parent;
        }
        if names.is_empty() {
            return "/".to_owned();
        }
        names.iter().rev().fold(String::new(), |mut path, name| {
            path.push('/');
            path.push_str(name);
            path
        })
    }

    fn report(&mut self, node: usize, kind: FindingKind) {
        let path = self.path_of(node);
        warn!(path, ?kind, "integrity finding");
        self.findings.push(Finding { path, kind });
    }

    /// Follow the chain at `start`, claiming its blocks for `node`.
    ///
    /// Returns the chain length if it ends cleanly at EOF, `None` if it broke.
    fn trace(&mut self, node: usize, start: BlockNumber) -> Result<Option<u64>> {
        if start.is_eof() {
            return Ok(Some(0));
        }
        if !start.is_data() {
            self.report(node, FindingKind::BadStart { start: start.0 });
            return Ok(None);
        }

        let mut seen = HashSet::new();
        let mut block = start;
        loop {
            if !seen.insert(block) {
                self.report(node, FindingKind::ChainCycle { block: block.0 });
                return Ok(None);
            }
            match self.owners.get(&block).copied() {
                Some(owner) if owner != node => {
                    let owner = self.path_of(owner);
                    self.report(
                        node,
                        FindingKind::SharedBlock {
                            block: block.0,
                            owner,
                        },
                    );
                }
                Some(_) => {}
                None => {
                    self.owners.insert(block, node);
                }
            }

            let next = self.chain.next_block(block)?;
            if next.is_eof() {
                return Ok(Some(seen.len() as u64));
            }
            if next.is_free() {
                self.report(node, FindingKind::FreeLink { block: block.0 });
                return Ok(None);
            }
            if !next.is_data() {
                self.report(
                    node,
                    FindingKind::OutOfRangeLink {
                        block: block.0,
                        next: next.0,
                    },
                );
                return Ok(None);
            }
            block = next;
        }
    }

    /// Claim the table of directory `dir` and list its children.
    ///
    /// `None` when the table is unreadable or was already walked.
    fn enter(
        &mut self,
        node: usize,
        dir: &DirectoryEntry,
    ) -> Result<Option<Vec<LocatedEntry>>> {
        let location = match DirectoryScanner::table_location(dir) {
            Ok(location) => location,
            Err(WfsError::Corruption { .. }) => {
                self.report(
                    node,
                    FindingKind::TableOutOfRange {
                        start: dir.start_block.0,
                    },
                );
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        if !self.tables.insert(location.offset) {
            self.report(
                node,
                FindingKind::DirectoryLoop {
                    offset: location.offset,
                },
            );
            return Ok(None);
        }
        self.directories += 1;
        self.scanner.entries(dir).map(Some)
    }

    /// Depth-first walk from the root, children in table order.
    ///
    /// The pending directories live on a heap stack, so nesting depth is
    /// bounded only by the image.
    fn walk(&mut self) -> Result<()> {
        let mut stack: Vec<Frame> = Vec::new();
        if let Some(children) = self.enter(ROOT_NODE, &DirectoryEntry::root())? {
            stack.push((ROOT_NODE, children.into_iter()));
        }

        while let Some((dir_node, children)) = stack.last_mut() {
            let parent = *dir_node;
            let Some(child) = children.next() else {
                stack.pop();
                continue;
            };

            let node = self.nodes.len();
            self.nodes.push(Node {
                parent: Some(parent),
                name: child.entry.name,
            });
            let blocks = self.trace(node, child.entry.start_block)?;
            if child.entry.is_directory() {
                if let Some(grandchildren) = self.enter(node, &child.entry)? {
                    stack.push((node, grandchildren.into_iter()));
                }
            } else {
                self.files += 1;
                let size = u64::from(child.entry.size_bytes());
                if let Some(blocks) = blocks {
                    let capacity = blocks * BLOCK_SIZE;
                    if size > capacity {
                        self.report(node, FindingKind::SizeExceedsChain { size, capacity });
                    }
                }
            }
        }
        debug!(nodes = self.nodes.len(), "walked directory tree");
        Ok(())
    }
}

/// Check the tree and block table of the image on `dev`.
pub fn verify_image(dev: &dyn ByteDevice) -> Result<IntegrityReport> {
    let mut verifier = Verifier {
        scanner: DirectoryScanner::new(dev),
        chain: BlockChain::new(dev),
        nodes: vec![Node {
            parent: None,
            name: EntryName::EMPTY,
        }],
        owners: HashMap::new(),
        tables: HashSet::new(),
        findings: Vec::new(),
        directories: 0,
        files: 0,
    };
    verifier.walk()?;

    let raw_table = read_block_table(dev)?;
    let mut orphaned_blocks = 0_u64;
    for index in 0..N_BLOCKS as usize {
        let link = parse_link(&raw_table, index).map_err(|e| crate::parse_to_wfs_error(&e))?;
        let block = BlockNumber((index + 1) as u16);
        if !link.is_free() && !verifier.owners.contains_key(&block) {
            orphaned_blocks += 1;
        }
    }

    let report = IntegrityReport {
        referenced_blocks: verifier.owners.len() as u64,
        findings: verifier.findings,
        directories: verifier.directories,
        files: verifier.files,
        orphaned_blocks,
        table: block_table_stats(&raw_table),
    };
    debug!(
        findings = report.findings.len(),
        directories = report.directories,
        files = report.files,
        "verified image"
    );
    Ok(report)
}
