#![forbid(unsafe_code)]
//! On-disk format parsing for WFS structures.
//!
//! Pure parsing crate with no I/O. Decodes byte slices into
//! the magic header, directory-entry records and block-table links.

pub mod entry;
pub mod header;
pub mod table;

pub use entry::{DirectoryEntry, EntryKind, EntryName};
pub use header::{encode_magic, validate_magic};
pub use table::{BlockTableStats, block_table_stats, parse_link};
