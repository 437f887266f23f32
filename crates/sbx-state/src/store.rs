use std::future::Future;

use serde_json::Value;

use crate::error::Result;

/// Minimal async key-value interface backing [`crate::LocalState`].
///
/// Values are structured JSON; the store never interprets them.
pub trait KvStore {
    /// Fetch the value stored under `key`, if any.
    fn get_item<'a>(&'a self, key: &'a str) -> impl Future<Output = Result<Option<Value>>> + 'a;

    /// Store `value` under `key`, replacing whatever was there.
    fn set_item<'a>(&'a self, key: &'a str, value: Value) -> impl Future<Output = Result<()>> + 'a;
}
