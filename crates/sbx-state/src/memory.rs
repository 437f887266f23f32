//! In-memory key-value store, used natively and in tests.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::future::{ready, Future};

use serde_json::Value;

use crate::error::Result;
use crate::store::KvStore;

/// Key-value store held in memory for the lifetime of the value.
#[derive(Default)]
pub struct MemoryStore {
    items: RefCell<BTreeMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys currently stored, in order.
    pub fn keys(&self) -> Vec<String> {
        self.items.borrow().keys().cloned().collect()
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Check if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get_item<'a>(&'a self, key: &'a str) -> impl Future<Output = Result<Option<Value>>> + 'a {
        ready(Ok(self.items.borrow().get(key).cloned()))
    }

    fn set_item<'a>(&'a self, key: &'a str, value: Value) -> impl Future<Output = Result<()>> + 'a {
        self.items.borrow_mut().insert(String::from(key), value);
        ready(Ok(()))
    }
}
