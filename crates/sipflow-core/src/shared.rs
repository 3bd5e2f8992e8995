//! Store handle shared between a capture thread and a renderer.
//!
//! Ingestion and structural changes take the write lock. Queries take the
//! read lock; cached filter verdicts are atomics on each call, so evaluating
//! filters under the read lock is safe.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{ConfigError, StoreConfig};
use crate::filter::FilterKind;
use crate::matcher::CompileError;
use crate::packet::Packet;
use crate::store::{CallStore, IngestOutcome, StoreStats};

#[derive(Debug, Clone)]
pub struct SharedCallStore {
    inner: Arc<RwLock<CallStore>>,
}

impl SharedCallStore {
    pub fn new(config: StoreConfig) -> Result<Self, ConfigError> {
        Ok(Self::from_store(CallStore::new(config)?))
    }

    pub fn from_store(store: CallStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    pub fn ingest(&self, packet: &Packet) -> IngestOutcome {
        self.inner.write().ingest(packet)
    }

    pub fn set_filter(&self, kind: FilterKind, expression: Option<&str>) -> Result<(), CompileError> {
        self.inner.write().set_filter(kind, expression)
    }

    pub fn stats(&self) -> StoreStats {
        self.inner.read().stats()
    }

    pub fn has_changed(&self) -> bool {
        self.inner.read().has_changed()
    }

    /// Indexes of the visible calls, in display order.
    pub fn visible_indexes(&self) -> Vec<u64> {
        self.inner
            .read()
            .visible_calls()
            .iter()
            .map(|call| call.index())
            .collect()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, CallStore> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, CallStore> {
        self.inner.write()
    }
}
