//! Test doubles for the guest filesystem

mod memory_fs;

pub use memory_fs::{MemoryFs, ROOT_INODE};
