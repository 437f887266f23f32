//! In-memory guest filesystem for testing.
//!
//! Reproduces the 9P behaviour the staging layer has to cope with:
//! - reading an existing zero-length file fails with "not found"
//! - `create_directory` never checks for an existing entry, so a careless
//!   caller ends up with duplicate names in a directory listing

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::future::{ready, Future};

use crate::core::{parent_path, path_segments, InodeId, PathLookup, VfsError};
use crate::fs::GuestFs;

/// Inode number of the root directory.
pub const ROOT_INODE: InodeId = 0;

/// In-memory guest filesystem.
pub struct MemoryFs {
    /// Inode table (id -> node)
    nodes: RefCell<BTreeMap<InodeId, Node>>,
    /// Next inode number to hand out
    next_id: Cell<InodeId>,
}

struct Node {
    name: String,
    kind: NodeKind,
}

enum NodeKind {
    Directory { entries: Vec<InodeId> },
    File { data: Vec<u8> },
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Create a filesystem holding only the root directory.
    pub fn new() -> Self {
        let fs = Self {
            nodes: RefCell::new(BTreeMap::new()),
            next_id: Cell::new(ROOT_INODE + 1),
        };

        fs.nodes.borrow_mut().insert(
            ROOT_INODE,
            Node {
                name: String::new(),
                kind: NodeKind::Directory {
                    entries: Vec::new(),
                },
            },
        );

        fs
    }

    /// Number of inodes, root included.
    pub fn inode_count(&self) -> usize {
        self.nodes.borrow().len()
    }

    fn alloc_id(&self) -> InodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn child_named(&self, dir: InodeId, name: &str) -> Option<InodeId> {
        let nodes = self.nodes.borrow();
        match &nodes.get(&dir)?.kind {
            NodeKind::Directory { entries } => entries
                .iter()
                .copied()
                .find(|id| nodes.get(id).is_some_and(|n| n.name == name)),
            NodeKind::File { .. } => None,
        }
    }

    fn link(&self, name: &str, parent_id: InodeId, kind: NodeKind) -> InodeId {
        let id = self.alloc_id();
        let mut nodes = self.nodes.borrow_mut();
        nodes.insert(
            id,
            Node {
                name: String::from(name),
                kind,
            },
        );
        if let Some(Node {
            kind: NodeKind::Directory { entries },
            ..
        }) = nodes.get_mut(&parent_id)
        {
            entries.push(id);
        }
        id
    }

    fn read_file_sync(&self, path: &str) -> Result<Vec<u8>, VfsError> {
        let id = self
            .search_path(path)
            .id
            .ok_or_else(|| VfsError::not_found(path))?;

        let nodes = self.nodes.borrow();
        match nodes.get(&id).map(|n| &n.kind) {
            Some(NodeKind::File { data }) if data.is_empty() => Err(VfsError::not_found(path)),
            Some(NodeKind::File { data }) => Ok(data.clone()),
            Some(NodeKind::Directory { .. }) => Err(VfsError::NotAFile(String::from(path))),
            None => Err(VfsError::not_found(path)),
        }
    }

    fn create_file_sync(&self, path: &str, data: &[u8]) -> Result<(), VfsError> {
        let lookup = self.search_path(path);

        if let Some(id) = lookup.id {
            let mut nodes = self.nodes.borrow_mut();
            return match nodes.get_mut(&id).map(|n| &mut n.kind) {
                Some(NodeKind::File { data: existing }) => {
                    *existing = data.to_vec();
                    Ok(())
                }
                _ => Err(VfsError::NotAFile(String::from(path))),
            };
        }

        let parent_id = lookup
            .parent_id
            .ok_or_else(|| VfsError::not_found(parent_path(path)))?;
        let name = path_segments(path)
            .last()
            .ok_or_else(|| VfsError::invalid_path("Empty file name"))?;
        self.link(
            name,
            parent_id,
            NodeKind::File {
                data: data.to_vec(),
            },
        );
        Ok(())
    }
}

impl GuestFs for MemoryFs {
    fn search_path(&self, path: &str) -> PathLookup {
        let segments: Vec<&str> = path_segments(path).collect();
        let mut current = ROOT_INODE;
        let mut parent = None;

        for (i, segment) in segments.iter().enumerate() {
            match self.child_named(current, segment) {
                Some(child) => {
                    parent = Some(current);
                    current = child;
                }
                None if i + 1 == segments.len() && self.is_directory(current) => {
                    return PathLookup::missing(Some(current));
                }
                None => return PathLookup::missing(None),
            }
        }

        PathLookup::found(current, parent)
    }

    fn is_directory(&self, id: InodeId) -> bool {
        matches!(
            self.nodes.borrow().get(&id).map(|n| &n.kind),
            Some(NodeKind::Directory { .. })
        )
    }

    fn read_dir(&self, path: &str) -> Vec<String> {
        let Some(id) = self.search_path(path).id else {
            return Vec::new();
        };

        let nodes = self.nodes.borrow();
        match nodes.get(&id).map(|n| &n.kind) {
            Some(NodeKind::Directory { entries }) => entries
                .iter()
                .filter_map(|child| nodes.get(child).map(|n| n.name.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn create_directory(&self, name: &str, parent_id: InodeId) -> InodeId {
        self.link(
            name,
            parent_id,
            NodeKind::Directory {
                entries: Vec::new(),
            },
        )
    }

    fn read_file<'a>(
        &'a self,
        path: &'a str,
    ) -> impl Future<Output = Result<Vec<u8>, VfsError>> + 'a {
        ready(self.read_file_sync(path))
    }

    fn create_file<'a>(
        &'a self,
        path: &'a str,
        data: &'a [u8],
    ) -> impl Future<Output = Result<(), VfsError>> + 'a {
        ready(self.create_file_sync(path, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollster::block_on;

    #[test]
    fn test_root_lookup() {
        let fs = MemoryFs::new();
        assert_eq!(fs.search_path("/"), PathLookup::found(ROOT_INODE, None));
        assert_eq!(fs.search_path(""), PathLookup::found(ROOT_INODE, None));
        assert!(fs.is_directory(ROOT_INODE));
    }

    #[test]
    fn test_missing_lookup_reports_parent() {
        let fs = MemoryFs::new();
        let root_dir = fs.create_directory("root", ROOT_INODE);

        assert_eq!(fs.search_path("/root/x"), PathLookup::missing(Some(root_dir)));
        assert_eq!(fs.search_path("/root/x/y"), PathLookup::missing(None));
        assert_eq!(fs.search_path("root"), PathLookup::found(root_dir, Some(ROOT_INODE)));
    }

    #[test]
    fn test_create_directory_does_not_dedupe() {
        let fs = MemoryFs::new();
        fs.create_directory("dup", ROOT_INODE);
        fs.create_directory("dup", ROOT_INODE);

        assert_eq!(fs.read_dir("/"), vec![String::from("dup"), String::from("dup")]);
    }

    #[test]
    fn test_write_read_file() {
        let fs = MemoryFs::new();
        block_on(fs.create_file("/hello.txt", b"Hello")).unwrap();
        assert_eq!(block_on(fs.read_file("/hello.txt")).unwrap(), b"Hello");

        block_on(fs.create_file("/hello.txt", b"Bye")).unwrap();
        assert_eq!(block_on(fs.read_file("/hello.txt")).unwrap(), b"Bye");
        assert_eq!(fs.read_dir("/").len(), 1);
    }

    #[test]
    fn test_create_file_without_parent_fails() {
        let fs = MemoryFs::new();
        let err = block_on(fs.create_file("/a/b.txt", b"x")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_empty_file_read_quirk() {
        let fs = MemoryFs::new();
        block_on(fs.create_file("/empty", b"")).unwrap();

        assert!(fs.search_path("/empty").exists());
        assert!(block_on(fs.read_file("/empty")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_read_dir_of_file_is_empty() {
        let fs = MemoryFs::new();
        block_on(fs.create_file("/f", b"x")).unwrap();
        assert!(fs.read_dir("/f").is_empty());
        assert!(fs.read_dir("/missing").is_empty());
    }
}
