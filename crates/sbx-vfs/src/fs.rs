//! GuestFs trait definition.

use std::future::Future;

use crate::core::{InodeId, PathLookup, VfsError};

/// Filesystem handle exposed by a running emulated machine.
///
/// The lookup and directory primitives are synchronous (they touch the
/// in-memory 9P inode table); whole-file reads and writes go through the
/// emulator's async file API.
pub trait GuestFs {
    // ========== Lookup ==========

    /// Resolve a path to its inode and parent inode.
    fn search_path(&self, path: &str) -> PathLookup;

    /// Check if an inode is a directory.
    fn is_directory(&self, id: InodeId) -> bool;

    // ========== Directory Operations ==========

    /// List the entry names of a directory.
    ///
    /// Files have no entries; missing paths list as empty.
    fn read_dir(&self, path: &str) -> Vec<String>;

    /// Create a single directory named `name` under `parent_id`.
    ///
    /// The 9P primitive does not check for an existing entry of the same
    /// name, so callers must look before they create.
    fn create_directory(&self, name: &str, parent_id: InodeId) -> InodeId;

    // ========== File Operations ==========

    /// Read a whole file.
    fn read_file<'a>(
        &'a self,
        path: &'a str,
    ) -> impl Future<Output = Result<Vec<u8>, VfsError>> + 'a;

    /// Create or overwrite a file. The parent directory must exist.
    fn create_file<'a>(
        &'a self,
        path: &'a str,
        data: &'a [u8],
    ) -> impl Future<Output = Result<(), VfsError>> + 'a;
}
