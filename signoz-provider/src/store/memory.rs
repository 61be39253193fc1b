//! In-memory store backing the binary and the tests.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::apis::{AnyRecord, LabelSelector, Object, ResourceKind};

use super::error::Result;
use super::event::Event;
use super::traits::{DataStore, ResourceStore};

const EVENT_CAPACITY: usize = 1024;

/// Records are kept as JSON, keyed by kind and key, so one store serves every
/// kind and listings come out sorted by key.
pub struct MemoryStore {
    records: RwLock<BTreeMap<(ResourceKind, String), Value>>,
    events: broadcast::Sender<Event>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            records: RwLock::new(BTreeMap::new()),
            events,
        }
    }

    /// Load a JSON manifest holding a list of records tagged with `kind`.
    /// Returns the number of records loaded.
    pub async fn load_manifest(&self, path: &Path) -> Result<usize> {
        let content = tokio::fs::read_to_string(path).await?;
        let records: Vec<AnyRecord> = serde_json::from_str(&content)?;
        let count = records.len();
        for record in records {
            self.insert(record).await?;
        }
        debug!(path = %path.display(), count, "Loaded manifest");
        Ok(count)
    }

    /// Insert a record of any kind.
    pub async fn insert(&self, record: AnyRecord) -> Result<()> {
        match record {
            AnyRecord::Dashboard(r) => self.put(r).await.map(drop),
            AnyRecord::Alert(r) => self.put(r).await.map(drop),
            AnyRecord::NotificationChannel(r) => self.put(r).await.map(drop),
            AnyRecord::ProviderConfig(r) => self.put(r).await.map(drop),
            AnyRecord::Secret(r) => self.put(r).await.map(drop),
        }
    }

    async fn put<T: Object>(&self, object: T) -> Result<T> {
        let key = object.key();
        let value = serde_json::to_value(&object)?;

        let event = {
            let mut records = self.records.write().await;
            let previous = records.insert((T::KIND, key.clone()), value.clone());
            change_event(T::KIND, key, previous.as_ref(), &value)
        };

        // No subscribers is fine.
        let _ = self.events.send(event);
        Ok(object)
    }
}

fn change_event(kind: ResourceKind, key: String, previous: Option<&Value>, value: &Value) -> Event {
    match previous {
        Some(prev) if without_status(prev) == without_status(value) => {
            Event::StatusUpdated { kind, key }
        }
        _ => Event::Applied { kind, key },
    }
}

fn without_status(value: &Value) -> Value {
    let mut value = value.clone();
    if let Value::Object(map) = &mut value {
        map.remove("status");
    }
    value
}

#[async_trait]
impl<T: Object> ResourceStore<T> for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<T>> {
        let records = self.records.read().await;
        match records.get(&(T::KIND, key.to_string())) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    async fn list(&self, selector: &LabelSelector) -> Result<Vec<T>> {
        let records = self.records.read().await;
        let mut out = Vec::new();
        for ((kind, _), value) in records.iter() {
            if *kind != T::KIND {
                continue;
            }
            let object: T = serde_json::from_value(value.clone())?;
            if selector.matches(&object.meta().labels) {
                out.push(object);
            }
        }
        Ok(out)
    }

    async fn apply(&self, object: T) -> Result<T> {
        self.put(object).await
    }

    async fn update_with(
        &self,
        key: &str,
        change: Box<dyn for<'a> FnOnce(&'a mut T) + Send>,
    ) -> Result<Option<T>> {
        let (object, event) = {
            let mut records = self.records.write().await;
            let slot = (T::KIND, key.to_string());
            let Some(previous) = records.get(&slot) else {
                return Ok(None);
            };
            let mut object: T = serde_json::from_value(previous.clone())?;
            change(&mut object);
            let value = serde_json::to_value(&object)?;
            let event = change_event(T::KIND, key.to_string(), Some(previous), &value);
            records.insert(slot, value);
            (object, event)
        };

        let _ = self.events.send(event);
        Ok(Some(object))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let removed = self
            .records
            .write()
            .await
            .remove(&(T::KIND, key.to_string()))
            .is_some();
        if removed {
            let _ = self.events.send(Event::Deleted {
                kind: T::KIND,
                key: key.to_string(),
            });
        }
        Ok(())
    }
}

impl DataStore for MemoryStore {
    fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }
}
