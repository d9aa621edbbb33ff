//! In-memory registry store for testing.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use skylift_core::AppName;

use crate::error::{ControlError, ControlResult};
use crate::types::AppRecord;

use super::{AppStore, Mutation};

/// In-memory registry store.
///
/// Not suitable for production use; entries are lost when the process
/// exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, AppRecord>>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppStore for MemoryStore {
    async fn insert(&self, record: &AppRecord) -> ControlResult<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        let key = record.name.to_string();
        if records.contains_key(&key) {
            return Err(ControlError::Conflict(key));
        }

        records.insert(key, record.clone());
        Ok(())
    }

    async fn get(&self, name: &AppName) -> ControlResult<AppRecord> {
        let records = self
            .records
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        records
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| ControlError::NotFound(name.to_string()))
    }

    async fn list(&self) -> ControlResult<Vec<AppRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        Ok(records.values().cloned().collect())
    }

    async fn update(&self, name: &AppName, mutate: Mutation) -> ControlResult<AppRecord> {
        let mut records = self
            .records
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        let record = records
            .get_mut(name.as_str())
            .ok_or_else(|| ControlError::NotFound(name.to_string()))?;

        mutate(record);
        Ok(record.clone())
    }

    async fn remove(&self, name: &AppName) -> ControlResult<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?;

        if records.remove(name.as_str()).is_none() {
            return Err(ControlError::NotFound(name.to_string()));
        }
        Ok(())
    }
}
