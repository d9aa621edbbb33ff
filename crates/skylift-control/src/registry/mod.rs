//! Application registry storage backends.
//!
//! The registry is the durable record of every application. All mutation
//! goes through [`AppStore::update`], an atomic read-modify-write applied
//! under the store's internal lock, so concurrent operations on the same
//! entry cannot lose updates.

mod json;
mod memory;

pub use json::JsonStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use skylift_core::AppName;

use crate::error::ControlResult;
use crate::types::AppRecord;

/// A single atomic mutation of a registry record.
pub type Mutation = Box<dyn FnOnce(&mut AppRecord) + Send>;

/// Backend for storing application records.
#[async_trait]
pub trait AppStore: Send + Sync {
    /// Insert a new record.
    ///
    /// Fails with [`Conflict`](crate::error::ControlError::Conflict) when a
    /// record with the same name already exists.
    async fn insert(&self, record: &AppRecord) -> ControlResult<()>;

    /// Get a record by name.
    ///
    /// Fails with [`NotFound`](crate::error::ControlError::NotFound) when
    /// the application does not exist.
    async fn get(&self, name: &AppName) -> ControlResult<AppRecord>;

    /// List every record, ordered by name.
    async fn list(&self) -> ControlResult<Vec<AppRecord>>;

    /// Apply a mutation atomically and return the updated record.
    ///
    /// The closure runs under the store's lock; no other writer can
    /// interleave between the read and the write.
    async fn update(&self, name: &AppName, mutate: Mutation) -> ControlResult<AppRecord>;

    /// Remove a record.
    ///
    /// Fails with [`NotFound`](crate::error::ControlError::NotFound) when
    /// the application does not exist.
    async fn remove(&self, name: &AppName) -> ControlResult<()>;
}
