use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{Collection, Fields, Filter, Record, RecordStore};
use crate::error::{StoreError, StoreResult};

/// Process-local store with failure injection, used by tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<Collection, BTreeMap<String, Fields>>>,
    failure: Mutex<Option<StoreError>>,
    calls: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `err` until cleared with `None`.
    pub async fn set_failure(&self, err: Option<StoreError>) {
        *self.failure.lock().await = err;
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    async fn check(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match self.failure.lock().await.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn not_found(collection: &Collection, id: &str) -> StoreError {
    StoreError::NotFound(format!("{collection}/{id}"))
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn query(&self, collection: &Collection, filter: &Filter) -> StoreResult<Vec<Record>> {
        self.check().await?;
        let collections = self.collections.lock().await;
        let records = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| filter.matches(fields))
                    .map(|(id, fields)| Record {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    async fn get(&self, collection: &Collection, id: &str) -> StoreResult<Option<Record>> {
        self.check().await?;
        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Record {
                id: id.to_string(),
                fields: fields.clone(),
            }))
    }

    async fn create(&self, collection: &Collection, fields: Fields) -> StoreResult<String> {
        self.check().await?;
        let id = Uuid::new_v4().simple().to_string();
        self.collections
            .lock()
            .await
            .entry(collection.clone())
            .or_default()
            .insert(id.clone(), fields);
        debug!(%collection, %id, "memory record created");
        Ok(id)
    }

    async fn set(&self, collection: &Collection, id: &str, fields: Fields) -> StoreResult<()> {
        self.check().await?;
        self.collections
            .lock()
            .await
            .entry(collection.clone())
            .or_default()
            .insert(id.to_string(), fields);
        Ok(())
    }

    async fn update(&self, collection: &Collection, id: &str, fields: Fields) -> StoreResult<()> {
        self.check().await?;
        let mut collections = self.collections.lock().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| not_found(collection, id))?;
        doc.extend(fields);
        Ok(())
    }

    async fn delete(&self, collection: &Collection, id: &str) -> StoreResult<()> {
        self.check().await?;
        let mut collections = self.collections.lock().await;
        collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .map(|_| ())
            .ok_or_else(|| not_found(collection, id))
    }
}
