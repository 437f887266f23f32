//! Typed access to namespaced state.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use sbx_vfs::FileInfo;

use crate::error::{Result, StateError};
use crate::key::{state_key, Namespace, GUEST_PREFIX};
use crate::store::KvStore;

/// Saved copy of a tutorial's filesystem: every entry of the tutorial
/// directory in listing order, files with their contents.
pub type FsSnapshot = Vec<FileInfo>;

/// Namespaced state on top of a [`KvStore`].
pub struct LocalState<S> {
    store: S,
    prefix: String,
}

impl<S: KvStore> LocalState<S> {
    /// State scoped to the guest user.
    pub fn new(store: S) -> Self {
        Self::with_prefix(store, GUEST_PREFIX)
    }

    /// State scoped to an explicit key prefix.
    pub fn with_prefix(store: S, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Storage key for `(namespace, identifier)`.
    pub fn key(&self, namespace: Namespace, identifier: Option<&str>) -> String {
        state_key(&self.prefix, namespace, identifier)
    }

    // -------------------------------------------------------------------------
    // Generic access
    // -------------------------------------------------------------------------

    /// Load the value stored for `(namespace, identifier)`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        namespace: Namespace,
        identifier: Option<&str>,
    ) -> Result<Option<T>> {
        let key = self.key(namespace, identifier);
        match self.store.get_item(&key).await? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    /// Save `value` for `(namespace, identifier)`, replacing any previous
    /// value, and hand it back.
    ///
    /// The `fs` namespace refuses to save without a tutorial identifier.
    pub async fn set<T: Serialize>(
        &self,
        namespace: Namespace,
        identifier: Option<&str>,
        value: T,
    ) -> Result<T> {
        if namespace == Namespace::Fs && identifier.map_or(true, str::is_empty) {
            return Err(StateError::NoActiveTutorial);
        }

        let key = self.key(namespace, identifier);
        let json = serde_json::to_value(&value)?;
        self.store.set_item(&key, json).await?;

        debug!(target: "sbx::state", key = %key, "saved state");
        Ok(value)
    }

    // -------------------------------------------------------------------------
    // IDE buffers
    // -------------------------------------------------------------------------

    /// Load the saved buffer of an IDE file.
    pub async fn get_ide<T: DeserializeOwned>(&self, file_name: &str) -> Result<Option<T>> {
        self.get(Namespace::Ide, Some(file_name)).await
    }

    /// Save the buffer of an IDE file.
    pub async fn set_ide<T: Serialize>(&self, file_name: &str, value: T) -> Result<T> {
        self.set(Namespace::Ide, Some(file_name), value).await
    }

    // -------------------------------------------------------------------------
    // File system
    // -------------------------------------------------------------------------

    /// Load a tutorial's filesystem snapshot (empty if none, or no tutorial).
    pub async fn get_fs(&self, tutorial: &str) -> Result<FsSnapshot> {
        if tutorial.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .get(Namespace::Fs, Some(tutorial))
            .await?
            .unwrap_or_default())
    }

    /// Save a tutorial's filesystem snapshot.
    pub async fn set_fs(&self, tutorial: &str, snapshot: FsSnapshot) -> Result<FsSnapshot> {
        debug!(target: "sbx::state", tutorial, entries = snapshot.len(), "saving FS state");
        self.set(Namespace::Fs, Some(tutorial), snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use pollster::block_on;
    use serde_json::json;

    #[test]
    fn test_set_then_get() {
        let state = LocalState::new(MemoryStore::new());
        block_on(state.set(Namespace::Sandbox, None, json!({"x": 1}))).unwrap();

        let value: Option<Value> = block_on(state.get(Namespace::Sandbox, None)).unwrap();
        assert_eq!(value, Some(json!({"x": 1})));
        assert_eq!(state.store().keys(), vec![String::from("guest:sandbox:")]);
    }

    #[test]
    fn test_set_overwrites_wholesale() {
        let state = LocalState::new(MemoryStore::new());
        block_on(state.set(Namespace::Studio, None, json!({"a": 1, "b": 2}))).unwrap();
        block_on(state.set(Namespace::Studio, None, json!({"c": 3}))).unwrap();

        let value: Value = block_on(state.get(Namespace::Studio, None)).unwrap().unwrap();
        assert_eq!(value, json!({"c": 3}));
    }

    #[test]
    fn test_missing_and_null_are_none() {
        let state = LocalState::new(MemoryStore::new());
        let missing: Option<Value> = block_on(state.get(Namespace::Quiz, None)).unwrap();
        assert!(missing.is_none());

        block_on(state.set(Namespace::Quiz, None, Value::Null)).unwrap();
        let null: Option<Value> = block_on(state.get(Namespace::Quiz, None)).unwrap();
        assert!(null.is_none());
    }

    #[test]
    fn test_set_returns_value() {
        let state = LocalState::new(MemoryStore::new());
        let returned = block_on(state.set_ide("main.py", String::from("print(1)"))).unwrap();
        assert_eq!(returned, "print(1)");

        let buffer: Option<String> = block_on(state.get_ide("main.py")).unwrap();
        assert_eq!(buffer.as_deref(), Some("print(1)"));
        let other: Option<String> = block_on(state.get_ide("other.py")).unwrap();
        assert!(other.is_none());
    }

    #[test]
    fn test_fs_requires_tutorial() {
        let state = LocalState::new(MemoryStore::new());
        let snapshot = vec![FileInfo::dir("/root/tutorial/data")];

        let err = block_on(state.set_fs("", snapshot.clone())).unwrap_err();
        assert!(err.is_fatal());
        let err = block_on(state.set(Namespace::Fs, None, snapshot)).unwrap_err();
        assert!(matches!(err, StateError::NoActiveTutorial));
        assert!(state.store().is_empty());
    }

    #[test]
    fn test_fs_snapshot_round_trip() {
        let state = LocalState::new(MemoryStore::new());
        let snapshot = vec![
            FileInfo::dir("/root/tutorial/data"),
            FileInfo::file("/root/tutorial/data/a.bed").with_contents(b"chr1\t1\t2\n".to_vec()),
        ];

        block_on(state.set_fs("bedtools-intro", snapshot.clone())).unwrap();
        assert_eq!(block_on(state.get_fs("bedtools-intro")).unwrap(), snapshot);
        assert!(block_on(state.get_fs("other")).unwrap().is_empty());
        assert!(block_on(state.get_fs("")).unwrap().is_empty());
    }

    #[test]
    fn test_type_mismatch_is_serde_error() {
        let state = LocalState::new(MemoryStore::new());
        block_on(state.set(Namespace::Sandbox, None, json!("text"))).unwrap();

        let err = block_on(state.get::<Vec<u32>>(Namespace::Sandbox, None)).unwrap_err();
        assert!(matches!(err, StateError::Serde(_)));
    }

    #[test]
    fn test_prefix_scopes_keys() {
        let state = LocalState::with_prefix(MemoryStore::new(), "user-7");
        block_on(state.set(Namespace::Sandbox, None, 1u8)).unwrap();
        assert_eq!(state.store().keys(), vec![String::from("user-7:sandbox:")]);
    }
}
