//! Record store client — the seam between the managers and the document
//! store.
//!
//! Grow spaces live in the `growSpaces` collection; each grow space owns a
//! nested `notes` collection keyed by canonical date. Backends see plain
//! JSON objects and never interpret the domain types.

pub mod memory;
pub mod mongo;

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Top-level fields of a stored document.
pub type Fields = serde_json::Map<String, Value>;

pub const GROW_SPACES: &str = "growSpaces";
pub const NOTES: &str = "notes";

/// Address of a collection in the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    GrowSpaces,
    Notes { grow_space_id: String },
}

impl Collection {
    pub fn notes(grow_space_id: impl Into<String>) -> Self {
        Collection::Notes {
            grow_space_id: grow_space_id.into(),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::GrowSpaces => f.write_str(GROW_SPACES),
            Collection::Notes { grow_space_id } => {
                write!(f, "{GROW_SPACES}/{grow_space_id}/{NOTES}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Eq { field: String, value: Value },
}

impl Filter {
    pub fn field_eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq { field, value } => fields.get(field) == Some(value),
        }
    }
}

/// A document as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub fields: Fields,
}

impl Record {
    pub fn decode<T: DeserializeOwned>(self) -> StoreResult<T> {
        serde_json::from_value(Value::Object(self.fields))
            .map_err(|e| StoreError::Decode(format!("{}: {e}", self.id)))
    }
}

/// Serialize `value` into top-level document fields.
pub fn to_fields<T: Serialize>(value: &T) -> StoreResult<Fields> {
    match serde_json::to_value(value).map_err(|e| StoreError::Encode(e.to_string()))? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::Encode(format!("expected an object, got {other}"))),
    }
}

/// Document store capability consumed by the managers.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    async fn query(&self, collection: &Collection, filter: &Filter) -> StoreResult<Vec<Record>>;

    async fn get(&self, collection: &Collection, id: &str) -> StoreResult<Option<Record>>;

    /// Insert a new document and return its store-assigned id.
    async fn create(&self, collection: &Collection, fields: Fields) -> StoreResult<String>;

    /// Write `fields` as the whole document under `id`, creating it if needed.
    async fn set(&self, collection: &Collection, id: &str, fields: Fields) -> StoreResult<()>;

    /// Overwrite the given top-level fields of an existing document.
    async fn update(&self, collection: &Collection, id: &str, fields: Fields) -> StoreResult<()>;

    async fn delete(&self, collection: &Collection, id: &str) -> StoreResult<()>;
}
