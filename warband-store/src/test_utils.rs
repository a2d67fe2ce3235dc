// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fault-injection wrappers for driving coordination flows through the
//! failure modes the replicated store exhibits in the field: latency
//! jitter, unreachable windows, writes that die mid-saga.
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::error::StoreError;
use crate::path::StorePath;
use crate::traits::{CasOutcome, ReplicatedStore};

#[derive(Debug)]
struct FaultState {
    rng: ChaCha12Rng,
    latency_ms: Option<(u64, u64)>,
    /// Remaining writes to let through; `None` means unlimited.
    write_budget: Option<usize>,
}

/// A store wrapper injecting deterministic, seeded faults.
///
/// Latency jitter is drawn from a seeded RNG so a simulation replays
/// identically for the same seed. Write failures are scheduled with
/// [`fail_writes_after`](FaultStore::fail_writes_after), which is how
/// partial multi-path writes (the saga interrupted mid-flight) are
/// produced in tests. Reads stay healthy throughout: a store that rejects
/// writes must still serve read-only browsing.
#[derive(Clone, Debug)]
pub struct FaultStore<S> {
    inner: S,
    faults: Arc<Mutex<FaultState>>,
}

impl<S> FaultStore<S> {
    pub fn new(inner: S, seed: u64) -> Self {
        Self {
            inner,
            faults: Arc::new(Mutex::new(FaultState {
                rng: ChaCha12Rng::seed_from_u64(seed),
                latency_ms: None,
                write_budget: None,
            })),
        }
    }

    /// Delay every operation by a duration drawn from `[min_ms, max_ms]`.
    pub fn with_latency(self, min_ms: u64, max_ms: u64) -> Self {
        self.state().latency_ms = Some((min_ms, max_ms));
        self
    }

    /// Let `budget` further writes through, then fail every write until
    /// [`heal`](FaultStore::heal) is called. A budget of zero makes the
    /// store write-unreachable immediately.
    pub fn fail_writes_after(&self, budget: usize) {
        self.state().write_budget = Some(budget);
    }

    /// Lift any scheduled write failures.
    pub fn heal(&self) {
        self.state().write_budget = None;
    }

    fn state(&self) -> MutexGuard<'_, FaultState> {
        self.faults.lock().expect("acquire fault state lock")
    }

    async fn jitter(&self) {
        let delay = {
            let mut state = self.state();
            state
                .latency_ms
                .map(|(min, max)| state.rng.random_range(min..=max))
        };

        if let Some(millis) = delay {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    fn consume_write_budget(&self) -> Result<(), StoreError> {
        let mut state = self.state();
        match &mut state.write_budget {
            None => Ok(()),
            Some(0) => Err(StoreError::unavailable("scheduled write failure")),
            Some(budget) => {
                *budget -= 1;
                Ok(())
            }
        }
    }
}

impl<S> ReplicatedStore for FaultStore<S>
where
    S: ReplicatedStore + Sync,
{
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        self.jitter().await;
        self.inner.get(path).await
    }

    async fn set(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.jitter().await;
        self.consume_write_budget()?;
        self.inner.set(path, value).await
    }

    async fn update(&self, path: &StorePath, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.jitter().await;
        self.consume_write_budget()?;
        self.inner.update(path, fields).await
    }

    async fn compare_and_swap(
        &self,
        path: &StorePath,
        expected: Option<&Value>,
        new: Value,
    ) -> Result<CasOutcome, StoreError> {
        self.jitter().await;
        self.consume_write_budget()?;
        self.inner.compare_and_swap(path, expected, new).await
    }

    async fn delete(&self, path: &StorePath) -> Result<(), StoreError> {
        self.jitter().await;
        self.consume_write_budget()?;
        self.inner.delete(path).await
    }

    async fn list(&self, prefix: &StorePath) -> Result<Vec<(StorePath, Value)>, StoreError> {
        self.jitter().await;
        self.inner.list(prefix).await
    }

    async fn watch(&self, path: &StorePath) -> Result<watch::Receiver<Option<Value>>, StoreError> {
        self.inner.watch(path).await
    }
}
