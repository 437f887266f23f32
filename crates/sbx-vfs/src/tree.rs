//! Tree operations built on the GuestFs primitives.
//!
//! Listing and directory creation walk the tree with an explicit stack and a
//! segment loop rather than recursion, so a pathological guest tree cannot
//! exhaust the (small) wasm stack.

use tracing::{debug, warn};

use crate::core::{join_path, parent_path, path_segments, FileContents, FileInfo, VfsError};
use crate::fs::GuestFs;

/// List a path.
///
/// - Directory: every descendant, depth-first pre-order (a directory is
///   emitted before its children), paths formed as `"{parent}/{name}"`.
/// - File: a single descriptor.
/// - Missing: empty.
pub fn list_tree<F: GuestFs + ?Sized>(fs: &F, path: &str) -> Vec<FileInfo> {
    let root = fs.search_path(path);
    let Some(root_id) = root.id else {
        return Vec::new();
    };
    if !fs.is_directory(root_id) {
        return vec![FileInfo::file(path)];
    }

    let mut result = Vec::new();
    let mut stack: Vec<String> = children_reversed(fs, path);

    while let Some(entry_path) = stack.pop() {
        let lookup = fs.search_path(&entry_path);
        let Some(id) = lookup.id else {
            // Raced with a concurrent delete; skip it.
            continue;
        };

        if fs.is_directory(id) {
            result.push(FileInfo::dir(entry_path.as_str()));
            stack.extend(children_reversed(fs, &entry_path));
        } else {
            result.push(FileInfo::file(entry_path));
        }
    }

    result
}

/// Child paths of a directory, reversed so that popping yields listing order.
fn children_reversed<F: GuestFs + ?Sized>(fs: &F, dir: &str) -> Vec<String> {
    fs.read_dir(dir)
        .iter()
        .rev()
        .map(|name| join_path(dir, name))
        .collect()
}

/// Create a directory and all missing parents, root downward.
///
/// Each segment is looked up before it is created, so repeated calls never
/// produce duplicate entries.
pub fn create_dir_all<F: GuestFs + ?Sized>(fs: &F, path: &str) -> Result<(), VfsError> {
    let mut current = if path.starts_with('/') {
        String::from("/")
    } else {
        String::new()
    };

    for segment in path_segments(path) {
        current = join_path(&current, segment);

        let lookup = fs.search_path(&current);
        match lookup.id {
            Some(id) if fs.is_directory(id) => continue,
            Some(_) => return Err(VfsError::NotADirectory(current)),
            None => {
                let parent = lookup
                    .parent_id
                    .ok_or_else(|| VfsError::not_found(parent_path(&current)))?;
                let id = fs.create_directory(segment, parent);
                debug!(target: "sbx::stage", path = %current, id, "created directory");
            }
        }
    }

    Ok(())
}

/// Read a file, distinguishing absence from emptiness.
///
/// Returns `Ok(None)` if nothing exists at `path`. The 9P read path reports
/// "not found" for an existing zero-length file; that case is returned as
/// empty bytes.
pub async fn read_file<F: GuestFs + ?Sized>(
    fs: &F,
    path: &str,
) -> Result<Option<Vec<u8>>, VfsError> {
    if !fs.search_path(path).exists() {
        warn!(target: "sbx::stage", path, "file not found");
        return Ok(None);
    }

    match fs.read_file(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.is_not_found() => Ok(Some(Vec::new())),
        Err(err) => Err(err),
    }
}

/// Write a file, creating its parent directories first.
pub async fn write_file<F: GuestFs + ?Sized>(
    fs: &F,
    path: &str,
    contents: impl Into<FileContents>,
) -> Result<(), VfsError> {
    let bytes = contents.into().into_bytes();

    create_dir_all(fs, &parent_path(path))?;
    fs.create_file(path, &bytes).await?;

    debug!(target: "sbx::stage", path, len = bytes.len(), "wrote file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryFs;
    use pollster::block_on;

    #[test]
    fn test_list_missing_is_empty() {
        let fs = MemoryFs::new();
        assert!(list_tree(&fs, "/nope").is_empty());
    }

    #[test]
    fn test_list_single_file() {
        let fs = MemoryFs::new();
        block_on(write_file(&fs, "/root/a.txt", "x")).unwrap();

        let listing = list_tree(&fs, "/root/a.txt");
        assert_eq!(listing, vec![FileInfo::file("/root/a.txt")]);
    }

    #[test]
    fn test_list_is_pre_order() {
        let fs = MemoryFs::new();
        block_on(write_file(&fs, "t/b/inner.txt", "1")).unwrap();
        block_on(write_file(&fs, "t/a.txt", "2")).unwrap();
        create_dir_all(&fs, "t/b/c").unwrap();

        let paths: Vec<(String, bool)> = list_tree(&fs, "t")
            .into_iter()
            .map(|f| (f.path, f.is_dir))
            .collect();

        assert_eq!(
            paths,
            vec![
                (String::from("t/b"), true),
                (String::from("t/b/inner.txt"), false),
                (String::from("t/b/c"), true),
                (String::from("t/a.txt"), false),
            ]
        );
    }

    #[test]
    fn test_create_dir_all_is_idempotent() {
        let fs = MemoryFs::new();
        create_dir_all(&fs, "/root/tutorial/data").unwrap();
        create_dir_all(&fs, "/root/tutorial/data").unwrap();
        create_dir_all(&fs, "/root/tutorial").unwrap();

        assert_eq!(fs.read_dir("/root"), vec![String::from("tutorial")]);
        assert_eq!(fs.read_dir("/root/tutorial"), vec![String::from("data")]);
    }

    #[test]
    fn test_create_dir_all_through_file_fails() {
        let fs = MemoryFs::new();
        block_on(write_file(&fs, "/root/file", "x")).unwrap();

        let err = create_dir_all(&fs, "/root/file/sub").unwrap_err();
        assert_eq!(err, VfsError::NotADirectory(String::from("/root/file")));
    }

    #[test]
    fn test_read_missing_is_none() {
        let fs = MemoryFs::new();
        assert_eq!(block_on(read_file(&fs, "/root/missing")).unwrap(), None);
    }

    #[test]
    fn test_read_empty_file_is_empty_bytes() {
        let fs = MemoryFs::new();
        block_on(write_file(&fs, "/root/empty", Vec::new())).unwrap();

        // The raw primitive reports the quirk...
        assert!(block_on(fs.read_file("/root/empty")).unwrap_err().is_not_found());
        // ...which the tree helper normalizes.
        assert_eq!(block_on(read_file(&fs, "/root/empty")).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_read_directory_is_error() {
        let fs = MemoryFs::new();
        create_dir_all(&fs, "/root").unwrap();
        let err = block_on(read_file(&fs, "/root")).unwrap_err();
        assert_eq!(err, VfsError::NotAFile(String::from("/root")));
    }
}
