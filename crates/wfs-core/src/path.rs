//! Absolute path resolution.

use crate::scan::{DirectoryScanner, LocatedEntry, check_lookup_name};
use tracing::debug;
use wfs_block::ByteDevice;
use wfs_error::{Result, WfsError};
use wfs_ondisk::DirectoryEntry;
use wfs_types::InodeNumber;

/// Outcome of a path walk: the root, or an entry in some table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Root,
    Entry(LocatedEntry),
}

impl Resolved {
    #[must_use]
    pub fn entry(&self) -> DirectoryEntry {
        match self {
            Self::Root => DirectoryEntry::root(),
            Self::Entry(located) => located.entry,
        }
    }

    #[must_use]
    pub fn inode(&self) -> InodeNumber {
        match self {
            Self::Root => InodeNumber::ROOT,
            Self::Entry(located) => located.inode(),
        }
    }
}

/// Walks `/`-separated paths from the root entry.
#[derive(Debug, Clone, Copy)]
pub struct PathResolver<'a> {
    scanner: DirectoryScanner<'a>,
}

impl<'a> PathResolver<'a> {
    #[must_use]
    pub fn new(dev: &'a dyn ByteDevice) -> Self {
        Self {
            scanner: DirectoryScanner::new(dev),
        }
    }

    /// Resolve `path` to its entry. The root resolves to the empty entry.
    pub fn resolve(&self, path: &str) -> Result<DirectoryEntry> {
        self.resolve_located(path).map(|resolved| resolved.entry())
    }

    /// Resolve `path`, keeping the slot offset of the final entry.
    pub fn resolve_located(&self, path: &str) -> Result<Resolved> {
        if path.is_empty() {
            return Err(WfsError::InvalidArgument("empty path".into()));
        }
        if !path.starts_with('/') {
            return Err(WfsError::InvalidArgument(format!(
                "path is not absolute: {path}"
            )));
        }

        let mut current = Resolved::Root;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            check_lookup_name(component.as_bytes())?;
            let dir = current.entry();
            if !dir.is_root() && !dir.is_directory() {
                return Err(WfsError::NotDirectory);
            }
            current = match self.scanner.find(&dir, component.as_bytes())? {
                Some(located) => Resolved::Entry(located),
                None => return Err(WfsError::NotFound(path.to_owned())),
            };
        }

        debug!(path, inode = current.inode().0, "resolved path");
        Ok(current)
    }

    /// Entry of the directory containing `path`.
    ///
    /// Trailing separators are ignored. Single-component paths, and paths
    /// with no separator at all, yield the root.
    pub fn resolve_parent(&self, path: &str) -> Result<DirectoryEntry> {
        let trimmed = path.trim_end_matches('/');
        let dirname = match trimmed.rfind('/') {
            None | Some(0) => return Ok(DirectoryEntry::root()),
            Some(sep) => &trimmed[..sep],
        };

        let parent = self.resolve(dirname)?;
        if !parent.is_root() && !parent.is_directory() {
            return Err(WfsError::corruption(
                u64::from(parent.start_block.0),
                format!("parent of {path} is not a directory"),
            ));
        }
        Ok(parent)
    }
}

/// Final component of `path`, ignoring trailing separators.
///
/// `None` when nothing remains after trimming or no separator is present.
#[must_use]
pub fn basename(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    trimmed.rfind('/').map(|sep| &trimmed[sep + 1..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use wfs_harness::ImageBuilder;
    use wfs_ondisk::EntryKind;
    use wfs_types::MAX_NAME_LEN;

    fn sample_tree() -> wfs_block::MemByteDevice {
        let mut builder = ImageBuilder::new();
        builder.add_dir("/docs").unwrap();
        builder.add_dir("/docs/notes").unwrap();
        builder.add_file("/docs/notes/todo.txt", b"buy milk").unwrap();
        builder.add_file("/docs/readme", b"hello").unwrap();
        builder.add_file("/top.bin", &[1, 2, 3]).unwrap();
        builder.build()
    }

    #[test]
    fn resolves_nested_entries() {
        let dev = sample_tree();
        let resolver = PathResolver::new(&dev);

        let todo = resolver.resolve("/docs/notes/todo.txt").unwrap();
        assert_eq!(todo.name.as_bytes(), b"todo.txt");
        assert_eq!(todo.kind, EntryKind::File);
        assert_eq!(todo.size_bytes(), 8);

        let notes = resolver.resolve("//docs///notes/").unwrap();
        assert!(notes.is_directory());
        assert_eq!(notes.name.as_bytes(), b"notes");
    }

    #[test]
    fn separator_only_paths_are_root() {
        let dev = sample_tree();
        let resolver = PathResolver::new(&dev);
        for path in ["/", "//", "////"] {
            assert!(resolver.resolve(path).unwrap().is_root(), "{path}");
            assert_eq!(resolver.resolve_located(path).unwrap(), Resolved::Root);
        }
        assert_eq!(
            resolver.resolve_located("/").unwrap().inode(),
            InodeNumber::ROOT
        );
    }

    #[test]
    fn malformed_paths_are_invalid() {
        let dev = sample_tree();
        let resolver = PathResolver::new(&dev);
        assert!(matches!(
            resolver.resolve(""),
            Err(WfsError::InvalidArgument(_))
        ));
        assert!(matches!(
            resolver.resolve("docs/readme"),
            Err(WfsError::InvalidArgument(_))
        ));
        let long = format!("/{}", "a".repeat(MAX_NAME_LEN + 1));
        assert!(matches!(
            resolver.resolve(&long),
            Err(WfsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn missing_and_non_directory_components() {
        let dev = sample_tree();
        let resolver = PathResolver::new(&dev);
        assert!(matches!(
            resolver.resolve("/docs/missing"),
            Err(WfsError::NotFound(_))
        ));
        assert!(matches!(
            resolver.resolve("/top.bin/x"),
            Err(WfsError::NotDirectory)
        ));
    }

    #[test]
    fn parent_resolution() {
        let dev = sample_tree();
        let resolver = PathResolver::new(&dev);
        assert!(resolver.resolve_parent("/docs").unwrap().is_root());
        assert!(resolver.resolve_parent("/docs/").unwrap().is_root());
        assert!(resolver.resolve_parent("relative").unwrap().is_root());
        assert_eq!(
            resolver.resolve_parent("/docs/notes/todo.txt").unwrap().name.as_bytes(),
            b"notes"
        );
        assert!(matches!(
            resolver.resolve_parent("/nope/x"),
            Err(WfsError::NotFound(_))
        ));
        assert!(matches!(
            resolver.resolve_parent("/top.bin/x"),
            Err(WfsError::Corruption { .. })
        ));
    }

    #[test]
    fn basename_cases() {
        assert_eq!(basename("/docs/readme"), Some("readme"));
        assert_eq!(basename("/docs/notes///"), Some("notes"));
        assert_eq!(basename("/top"), Some("top"));
        assert_eq!(basename("///"), None);
        assert_eq!(basename(""), None);
        assert_eq!(basename("plain"), None);
    }

    fn component() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{0,6}"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn parent_then_find_matches_resolve(
            dirs in proptest::collection::vec(component(), 1..4),
            leaf in component(),
            trailing in 0_usize..3,
        ) {
            let mut builder = ImageBuilder::new();
            let mut path = String::new();
            for dir in &dirs {
                path.push('/');
                path.push_str(dir);
                builder.add_dir(&path).unwrap();
            }
            path.push('/');
            path.push_str(&leaf);
            builder.add_file(&path, leaf.as_bytes()).unwrap();
            let dev = builder.build();
            let resolver = PathResolver::new(&dev);
            let scanner = DirectoryScanner::new(&dev);

            let query = format!("{path}{}", "/".repeat(trailing));
            let direct = resolver.resolve(&query).unwrap();
            let parent = resolver.resolve_parent(&query).unwrap();
            let name = basename(&query).unwrap();
            let via_parent = scanner.find(&parent, name.as_bytes()).unwrap().unwrap();
            prop_assert_eq!(via_parent.entry, direct);

            // Same check one level up, on a directory.
            let dir_path = path.rsplit_once('/').map(|(head, _)| head.to_owned()).unwrap();
            let dir_direct = resolver.resolve(&dir_path).unwrap();
            let dir_parent = resolver.resolve_parent(&dir_path).unwrap();
            let dir_name = basename(&dir_path).unwrap();
            let dir_via = scanner.find(&dir_parent, dir_name.as_bytes()).unwrap().unwrap();
            prop_assert_eq!(dir_via.entry, dir_direct);
        }
    }
}
