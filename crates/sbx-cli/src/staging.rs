//! File staging
//!
//! Moves tutorial data in and out of the guest filesystem: directory
//! listings, reads, writes, mounting local or remote files under the
//! tutorial directory, and flushing the guest page cache.
//!
//! Listing and reading never fail from the caller's point of view; problems
//! are logged and an empty result comes back. Writes report filesystem
//! errors but treat a missing session as a logged no-op.

use sbx_vfs::{create_dir_all, join_path, list_tree, read_file, write_file, FileContents, FileInfo};
use tracing::{error, info};

use crate::config::CMD_DROP_CACHES;
use crate::dispatch::{ExecMode, ExecOptions};
use crate::error::StageError;
use crate::machine::Machine;
use crate::platform::Platform;
use crate::session::Session;

/// What to place in the guest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MountSource {
    /// Bytes picked by the user (name is the picked file's name).
    File { name: String, data: Vec<u8> },
    /// A URL to download.
    Url(String),
}

impl MountSource {
    pub fn file(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        MountSource::File {
            name: name.into(),
            data: data.into(),
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        MountSource::Url(url.into())
    }
}

/// File name for a downloaded URL: its last path segment, or `unknown`.
pub fn infer_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => String::from(name),
        _ => String::from("unknown"),
    }
}

impl<M, P> Session<M, P>
where
    M: Machine + 'static,
    P: Platform + 'static,
{
    /// Recursively list `path` (pre-order, parents before children).
    pub fn list(&self, path: &str) -> Vec<FileInfo> {
        match self.active_machine("list") {
            Some(machine) => list_tree(machine.fs(), path),
            None => Vec::new(),
        }
    }

    /// Read a guest file. `None` if it does not exist or cannot be read.
    pub async fn read(&self, path: &str) -> Option<Vec<u8>> {
        let machine = self.active_machine("read")?;
        match read_file(machine.fs(), path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(target: "sbx::stage", path, error = %e, "read failed");
                None
            }
        }
    }

    /// Write a guest file, creating missing parent directories.
    pub async fn write(&self, path: &str, contents: impl Into<FileContents>) -> Result<(), StageError> {
        let Some(machine) = self.active_machine("write") else {
            return Ok(());
        };
        write_file(machine.fs(), path, contents).await?;
        Ok(())
    }

    /// Create a directory and any missing ancestors.
    pub async fn make_directory(&self, path: &str) -> Result<(), StageError> {
        let Some(machine) = self.active_machine("make_directory") else {
            return Ok(());
        };
        create_dir_all(machine.fs(), path)?;
        Ok(())
    }

    /// Place a file under the tutorial directory.
    ///
    /// `path` is relative to the tutorial directory. When it is empty or ends
    /// in `/`, the source's name is appended. Returns the relative path the
    /// file was written to.
    pub async fn mount(&self, path: &str, source: MountSource) -> Result<String, StageError> {
        let (name, data) = match source {
            MountSource::File { name, data } => (name, data),
            MountSource::Url(url) => {
                let data = self.platform.fetch(&url).await?;
                (infer_name(&url), data)
            }
        };

        let relative = if path.is_empty() || path.ends_with('/') {
            join_path(path, &name)
        } else {
            String::from(path)
        };
        let target = join_path(&self.config.tutorial_dir, relative.trim_start_matches('/'));

        self.write(&target, data).await?;
        info!(target: "sbx::stage", path = %target, "mounted");
        Ok(relative)
    }

    /// Flush guest page caches and give the guest a moment to settle.
    pub async fn drop_caches(&self) {
        if self.active_machine("drop_caches").is_none() {
            return;
        }
        self.execute(CMD_DROP_CACHES, ExecOptions::mode(ExecMode::Bus));
        self.platform.sleep(self.config.cache_settle_delay()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_name() {
        assert_eq!(infer_name("https://host/data/reads.fq"), "reads.fq");
        assert_eq!(infer_name("https://host/data/ref.fa?token=abc"), "ref.fa");
        assert_eq!(infer_name("https://host/data/ref.fa#L1"), "ref.fa");
        assert_eq!(infer_name("plain.txt"), "plain.txt");
    }

    #[test]
    fn test_infer_name_falls_back() {
        assert_eq!(infer_name("https://host/data/"), "unknown");
        assert_eq!(infer_name(""), "unknown");
    }
}
