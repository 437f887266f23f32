//! Core types for the guest filesystem layer.
//!
//! Defines inode lookups, listing entries and file payloads.

use serde::{Deserialize, Serialize};

/// Inode number assigned by the 9P filesystem (root is 0).
pub type InodeId = u32;

/// Result of resolving a path against the guest filesystem.
///
/// Mirrors the 9P `SearchPath` answer: the entry's inode if it exists, and the
/// inode of the deepest existing parent when only the final segment is
/// missing. A missing intermediate directory leaves `parent_id` empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathLookup {
    /// Inode of the entry (None = not found)
    pub id: Option<InodeId>,
    /// Inode of the parent directory, if that directory exists
    pub parent_id: Option<InodeId>,
}

impl PathLookup {
    /// Lookup for an existing entry.
    pub fn found(id: InodeId, parent_id: Option<InodeId>) -> Self {
        Self {
            id: Some(id),
            parent_id,
        }
    }

    /// Lookup for a missing entry.
    pub fn missing(parent_id: Option<InodeId>) -> Self {
        Self { id: None, parent_id }
    }

    /// Check if the entry exists.
    pub fn exists(&self) -> bool {
        self.id.is_some()
    }
}

/// One filesystem entry as seen at listing time.
///
/// A transient snapshot owned by the caller; it is not kept in sync with the
/// guest filesystem afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Path, spelled relative to the path that was listed
    pub path: String,

    /// Is this a directory?
    pub is_dir: bool,

    /// File contents, when captured (base64 on the wire)
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_contents")]
    pub contents: Option<Vec<u8>>,
}

impl FileInfo {
    /// Descriptor for a regular file.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            contents: None,
        }
    }

    /// Descriptor for a directory.
    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            contents: None,
        }
    }

    /// Attach captured contents.
    pub fn with_contents(mut self, contents: Vec<u8>) -> Self {
        self.contents = Some(contents);
        self
    }
}

/// Serde adapter keeping captured contents compact in JSON.
///
/// A plain `Vec<u8>` becomes an array of numbers, roughly four characters per
/// byte; base64 is four per three. Arrays written before the switch are still
/// accepted.
mod base64_contents {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Encoded {
        Base64(String),
        Bytes(Vec<u8>),
    }

    pub fn serialize<S: Serializer>(contents: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match contents {
            Some(bytes) => serializer.serialize_some(&general_purpose::STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<Encoded>::deserialize(deserializer)? {
            Some(Encoded::Base64(text)) => general_purpose::STANDARD
                .decode(text)
                .map(Some)
                .map_err(serde::de::Error::custom),
            Some(Encoded::Bytes(bytes)) => Ok(Some(bytes)),
            None => Ok(None),
        }
    }
}

/// Contents handed to a file write: text or raw bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileContents {
    /// Text, stored as UTF-8
    Text(String),
    /// Raw bytes, stored as-is
    Bytes(Vec<u8>),
}

impl FileContents {
    /// Convert to the bytes that land on the guest disk.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            FileContents::Text(text) => text.into_bytes(),
            FileContents::Bytes(bytes) => bytes,
        }
    }

    /// Length in bytes once written.
    pub fn len(&self) -> usize {
        match self {
            FileContents::Text(text) => text.len(),
            FileContents::Bytes(bytes) => bytes.len(),
        }
    }

    /// Check if the contents are empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for FileContents {
    fn from(text: &str) -> Self {
        FileContents::Text(String::from(text))
    }
}

impl From<String> for FileContents {
    fn from(text: String) -> Self {
        FileContents::Text(text)
    }
}

impl From<Vec<u8>> for FileContents {
    fn from(bytes: Vec<u8>) -> Self {
        FileContents::Bytes(bytes)
    }
}

impl From<&[u8]> for FileContents {
    fn from(bytes: &[u8]) -> Self {
        FileContents::Bytes(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let hit = PathLookup::found(7, Some(0));
        assert!(hit.exists());
        assert_eq!(hit.parent_id, Some(0));

        let miss = PathLookup::missing(None);
        assert!(!miss.exists());
    }

    #[test]
    fn test_file_info_serializes_camel_case() {
        let info = FileInfo::dir("tutorial/data");
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, r#"{"path":"tutorial/data","isDir":true}"#);

        let file = FileInfo::file("tutorial/a.txt").with_contents(b"hi".to_vec());
        let json = serde_json::to_string(&file).unwrap();
        let restored: FileInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, file);
    }

    #[test]
    fn test_contents_are_base64_in_json() {
        let file = FileInfo::file("a.bin").with_contents(vec![0, 1, 2, 254, 255]);
        let json = serde_json::to_string(&file).unwrap();
        assert_eq!(json, r#"{"path":"a.bin","isDir":false,"contents":"AAEC/v8="}"#);
    }

    #[test]
    fn test_large_contents_stay_compact() {
        let data: Vec<u8> = (0..1_500_000u32).map(|i| (i * 7 % 251) as u8).collect();
        let file = FileInfo::file("reads.bam").with_contents(data.clone());
        let json = serde_json::to_string(&file).unwrap();

        // base64 costs 4/3; a number array costs about 3.5 chars per byte.
        assert!(json.len() < data.len() * 14 / 10);
        let restored: FileInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.contents, Some(data));
    }

    #[test]
    fn test_number_array_contents_still_load() {
        let restored: FileInfo =
            serde_json::from_str(r#"{"path":"a.txt","isDir":false,"contents":[104,105]}"#).unwrap();
        assert_eq!(restored.contents, Some(b"hi".to_vec()));

        let empty: FileInfo =
            serde_json::from_str(r#"{"path":"e","isDir":false,"contents":""}"#).unwrap();
        assert_eq!(empty.contents, Some(Vec::new()));
    }

    #[test]
    fn test_file_contents_bytes() {
        assert_eq!(FileContents::from("héllo").into_bytes(), "héllo".as_bytes());
        assert_eq!(FileContents::from(vec![0u8, 255]).into_bytes(), vec![0, 255]);
        assert!(FileContents::from("").is_empty());
        assert_eq!(FileContents::from(&b"abc"[..]).len(), 3);
    }
}
