//! Guest Filesystem Layer
//!
//! The emulated machine exposes its filesystem through a 9P handle that only
//! knows a handful of primitives: path search, directory listing, directory
//! creation under a parent inode, and whole-file read/write. This crate wraps
//! those primitives:
//!
//! - **Types**: `FileInfo`, `FileContents`, `PathLookup` for entries and lookups
//! - **Path**: segment splitting, joining, parent helpers
//! - **GuestFs**: the trait a machine's filesystem handle implements
//! - **Tree**: iterative listing, `mkdir -p`, normalized reads, staged writes
//! - **Testing**: `MemoryFs`, an in-memory filesystem with 9P semantics
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    File Staging (sbx-cli)                      │
//! └───────────────────────────────┬──────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  tree: list_tree · create_dir_all · read_file · write_file     │
//! └───────────────────────────────┬──────────────────────────────┘
//!                                 │  GuestFs
//!                 ┌───────────────┴────────────────┐
//!                 ▼                                ▼
//!        v86 fs9p (wasm32, sbx-cli)         MemoryFs (tests)
//! ```

pub mod core;
pub mod fs;
pub mod testing;
pub mod tree;

pub use core::{join_path, parent_path, path_segments};
pub use core::{FileContents, FileInfo, InodeId, PathLookup, VfsError};
pub use fs::GuestFs;
pub use testing::MemoryFs;
pub use tree::{create_dir_all, list_tree, read_file, write_file};
