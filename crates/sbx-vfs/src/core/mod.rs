//! Core filesystem types and utilities

mod error;
mod path;
mod types;

pub use error::VfsError;
pub use path::{join_path, parent_path, path_segments};
pub use types::{FileContents, FileInfo, InodeId, PathLookup};
