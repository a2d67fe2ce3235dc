// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definition for path-addressed replicated stores.
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::error::StoreError;
use crate::path::StorePath;

/// Outcome of a per-path conditional write.
#[derive(Clone, Debug, PartialEq)]
pub enum CasOutcome {
    /// The expected prior value matched and the new value was written.
    Committed,

    /// Another writer changed the path first; carries the value observed
    /// at swap time so the caller can re-evaluate.
    Conflict(Option<Value>),
}

/// Interface for storing, deleting, querying and watching values in the
/// replicated JSON document tree.
///
/// Consistency contract, which every implementation must honour and no
/// consumer may assume more than:
///
/// - each path converges independently (eventual, per-path consistency);
/// - concurrent plain writes to one path resolve last-write-wins;
/// - [`compare_and_swap`](LocalReplicatedStore::compare_and_swap) is atomic
///   for a single path only;
/// - nothing relates writes across two paths, ever.
///
/// Two variants of the trait are provided: one which is thread-safe and one
/// which is purely intended for single-threaded execution contexts.
#[trait_variant::make(ReplicatedStore: Send)]
pub trait LocalReplicatedStore: Clone {
    /// Read the value at a path.
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError>;

    /// Write the value at a path, replacing any prior value.
    async fn set(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;

    /// Merge the given fields into the object stored at a path.
    ///
    /// A missing or non-object prior value is replaced by an object holding
    /// exactly the given fields.
    async fn update(&self, path: &StorePath, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// Conditionally replace the value at a path.
    ///
    /// Commits only if the current value equals `expected`; otherwise
    /// returns [`CasOutcome::Conflict`] with the value observed instead.
    async fn compare_and_swap(
        &self,
        path: &StorePath,
        expected: Option<&Value>,
        new: Value,
    ) -> Result<CasOutcome, StoreError>;

    /// Remove the value at a path.
    ///
    /// Removing an absent path is not an error.
    async fn delete(&self, path: &StorePath) -> Result<(), StoreError>;

    /// All values stored strictly below the given prefix, with their full
    /// paths.
    async fn list(&self, prefix: &StorePath) -> Result<Vec<(StorePath, Value)>, StoreError>;

    /// Subscribe to value changes at a path.
    ///
    /// The receiver holds the value current at subscription time and is
    /// notified on every subsequent write or delete. Readers must tolerate
    /// the value changing between successive reads; the watch delivers the
    /// latest value, not every intermediate one.
    async fn watch(&self, path: &StorePath) -> Result<watch::Receiver<Option<Value>>, StoreError>;
}

/// Read a typed record from a path.
pub async fn get_record<S, T>(store: &S, path: &StorePath) -> Result<Option<T>, StoreError>
where
    S: ReplicatedStore + Sync,
    T: DeserializeOwned,
{
    match store.get(path).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Write a typed record to a path.
pub async fn set_record<S, T>(store: &S, path: &StorePath, record: &T) -> Result<(), StoreError>
where
    S: ReplicatedStore + Sync,
    T: Serialize + Sync,
{
    let value = serde_json::to_value(record)?;
    store.set(path, value).await
}
