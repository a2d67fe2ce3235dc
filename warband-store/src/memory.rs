// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory replicated store for tests and simulations.
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::error::StoreError;
use crate::path::StorePath;
use crate::traits::{CasOutcome, ReplicatedStore};

#[derive(Debug, Default)]
pub struct InnerMemoryStore {
    entries: BTreeMap<String, Value>,
    watchers: HashMap<String, watch::Sender<Option<Value>>>,
}

/// An in-memory store over the replicated document tree.
///
/// Faithful to the consistency contract of the remote store it stands in
/// for: per-path last-write-wins, atomic compare-and-swap on a single path,
/// no relation between writes to different paths. `MemoryStore` supports
/// usage in asynchronous and multi-threaded contexts by wrapping an
/// [`InnerMemoryStore`] with an `RwLock` and `Arc`; cloning shares the
/// underlying tree, which is what lets one instance stand in for the
/// store shared by many concurrent writers.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<InnerMemoryStore>>,
}

impl MemoryStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Obtain a read-lock on the store.
    fn read_store(&self) -> RwLockReadGuard<'_, InnerMemoryStore> {
        self.inner
            .read()
            .expect("acquire shared read access on store")
    }

    /// Obtain a write-lock on the store.
    fn write_store(&self) -> RwLockWriteGuard<'_, InnerMemoryStore> {
        self.inner
            .write()
            .expect("acquire exclusive write access on store")
    }

    fn notify(store: &mut InnerMemoryStore, path: &str) {
        if let Some(sender) = store.watchers.get(path) {
            let current = store.entries.get(path).cloned();
            sender.send_replace(current);
        }
    }
}

impl ReplicatedStore for MemoryStore {
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        Ok(self.read_store().entries.get(path.as_str()).cloned())
    }

    async fn set(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        let mut store = self.write_store();
        store.entries.insert(path.as_str().to_owned(), value);
        Self::notify(&mut store, path.as_str());
        Ok(())
    }

    async fn update(&self, path: &StorePath, fields: Map<String, Value>) -> Result<(), StoreError> {
        let mut store = self.write_store();
        let entry = store
            .entries
            .entry(path.as_str().to_owned())
            .or_insert_with(|| Value::Object(Map::new()));

        match entry {
            Value::Object(existing) => existing.extend(fields),
            other => *other = Value::Object(fields),
        }

        Self::notify(&mut store, path.as_str());
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        path: &StorePath,
        expected: Option<&Value>,
        new: Value,
    ) -> Result<CasOutcome, StoreError> {
        let mut store = self.write_store();
        let current = store.entries.get(path.as_str());

        if current != expected {
            return Ok(CasOutcome::Conflict(current.cloned()));
        }

        store.entries.insert(path.as_str().to_owned(), new);
        Self::notify(&mut store, path.as_str());
        Ok(CasOutcome::Committed)
    }

    async fn delete(&self, path: &StorePath) -> Result<(), StoreError> {
        let mut store = self.write_store();
        store.entries.remove(path.as_str());
        Self::notify(&mut store, path.as_str());
        Ok(())
    }

    async fn list(&self, prefix: &StorePath) -> Result<Vec<(StorePath, Value)>, StoreError> {
        let store = self.read_store();
        let from = format!("{}/", prefix.as_str());

        let entries = store
            .entries
            .range(from.clone()..)
            .take_while(|(path, _)| path.starts_with(&from))
            .map(|(path, value)| (path.parse(), value.clone()))
            .filter_map(|(path, value)| path.ok().map(|path| (path, value)))
            .collect();

        Ok(entries)
    }

    async fn watch(&self, path: &StorePath) -> Result<watch::Receiver<Option<Value>>, StoreError> {
        let mut store = self.write_store();
        let current = store.entries.get(path.as_str()).cloned();

        let receiver = match store.watchers.get(path.as_str()) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = watch::channel(current);
                store.watchers.insert(path.as_str().to_owned(), sender);
                receiver
            }
        };

        Ok(receiver)
    }
}
