//! Store trait definitions.
//!
//! Reconcilers and resolvers work against these traits, never against a
//! concrete backend.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::apis::{
    Alert, Dashboard, LabelSelector, NotificationChannel, Object, ProviderConfig, Secret,
};

use super::error::Result;
use super::event::Event;

/// Typed access to the records of one kind.
#[async_trait]
pub trait ResourceStore<T: Object>: Send + Sync {
    /// Get a record by key (`name`, or `namespace/name` for namespaced kinds).
    async fn get(&self, key: &str) -> Result<Option<T>>;

    /// List records matching the selector, sorted by key.
    async fn list(&self, selector: &LabelSelector) -> Result<Vec<T>>;

    /// Insert or replace a record.
    ///
    /// Emits [`Event::Applied`] when metadata or spec changed and
    /// [`Event::StatusUpdated`] when only the status did.
    async fn apply(&self, object: T) -> Result<T>;

    /// Change the stored record in place, atomically with respect to other
    /// writers. Returns `None` without calling `change` when no record is
    /// stored under `key`. Emits events like [`ResourceStore::apply`].
    async fn update_with(
        &self,
        key: &str,
        change: Box<dyn for<'a> FnOnce(&'a mut T) + Send>,
    ) -> Result<Option<T>>;

    /// Remove a record. Removing an absent record is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Composite store holding every kind the provider reads or writes.
pub trait DataStore:
    ResourceStore<Dashboard>
    + ResourceStore<Alert>
    + ResourceStore<NotificationChannel>
    + ResourceStore<ProviderConfig>
    + ResourceStore<Secret>
    + Send
    + Sync
{
    /// Subscribe to change events for all kinds.
    fn subscribe(&self) -> broadcast::Receiver<Event>;
}
