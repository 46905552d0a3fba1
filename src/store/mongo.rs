//! MongoDB backend.
//!
//! Grow spaces use `ObjectId` keys, exposed to callers as hex strings. Notes
//! of every grow space share one `notes` collection under the composite key
//! `{growSpaceId}/{date}`; the scope fields are stripped again on read.

use async_trait::async_trait;
use futures_util::stream::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use serde_json::Value;
use tracing::{debug, info};

use super::{Collection, Fields, Filter, Record, RecordStore, GROW_SPACES, NOTES};
use crate::config::Config;
use crate::error::{StoreError, StoreResult};

const SCOPE_FIELD: &str = "growSpaceId";
const KEY_FIELD: &str = "date";

fn backend(e: mongodb::error::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect to the configured deployment and verify it answers a ping.
    pub async fn connect(config: &Config) -> StoreResult<Self> {
        let mut options = ClientOptions::parse(&config.mongo_uri)
            .await
            .map_err(|e| StoreError::Unavailable(format!("bad MongoDB URI: {e}")))?;
        options.server_selection_timeout = Some(config.server_selection_timeout);

        let client = Client::with_options(options).map_err(backend)?;
        let db = client.database(&config.database);
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Unavailable(format!("ping failed: {e}")))?;
        info!(database = %config.database, "connected to MongoDB");
        Ok(Self::new(db))
    }

    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn documents(&self, collection: &Collection) -> mongodb::Collection<Document> {
        match collection {
            Collection::GrowSpaces => self.db.collection(GROW_SPACES),
            Collection::Notes { .. } => self.db.collection(NOTES),
        }
    }
}

fn key(collection: &Collection, id: &str) -> StoreResult<Bson> {
    match collection {
        Collection::GrowSpaces => ObjectId::parse_str(id)
            .map(Bson::ObjectId)
            .map_err(|_| StoreError::InvalidId(id.to_string())),
        Collection::Notes { grow_space_id } => Ok(Bson::String(format!("{grow_space_id}/{id}"))),
    }
}

fn scope(collection: &Collection) -> Document {
    let mut selector = Document::new();
    if let Collection::Notes { grow_space_id } = collection {
        selector.insert(SCOPE_FIELD, grow_space_id.as_str());
    }
    selector
}

fn encode(fields: &Fields) -> StoreResult<Document> {
    bson::to_document(fields).map_err(|e| StoreError::Encode(e.to_string()))
}

/// Encode a full document, tagging nested records with their scope and key.
fn encode_scoped(collection: &Collection, id: &str, fields: &Fields) -> StoreResult<Document> {
    let mut document = encode(fields)?;
    if let Collection::Notes { grow_space_id } = collection {
        document.insert(SCOPE_FIELD, grow_space_id.as_str());
        document.insert(KEY_FIELD, id);
    }
    Ok(document)
}

fn decode(collection: &Collection, mut document: Document) -> StoreResult<Record> {
    let raw_id = document.remove("_id");
    let id = match collection {
        Collection::GrowSpaces => match raw_id {
            Some(Bson::ObjectId(oid)) => oid.to_hex(),
            Some(Bson::String(s)) => s,
            other => {
                return Err(StoreError::Decode(format!("unexpected _id {other:?}")));
            }
        },
        Collection::Notes { .. } => {
            document.remove(SCOPE_FIELD);
            match document.remove(KEY_FIELD) {
                Some(Bson::String(s)) => s,
                other => {
                    return Err(StoreError::Decode(format!("unexpected note key {other:?}")));
                }
            }
        }
    };

    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(fields) => Ok(Record { id, fields }),
        other => Err(StoreError::Decode(format!("expected a document, got {other}"))),
    }
}

#[async_trait]
impl RecordStore for MongoStore {
    fn backend_tag(&self) -> &'static str {
        "mongodb"
    }

    async fn query(&self, collection: &Collection, filter: &Filter) -> StoreResult<Vec<Record>> {
        let mut selector = scope(collection);
        if let Filter::Eq { field, value } = filter {
            let value = Bson::try_from(value.clone()).map_err(|e| StoreError::Encode(e.to_string()))?;
            selector.insert(field.as_str(), value);
        }

        let mut cursor = self.documents(collection).find(selector).await.map_err(backend)?;
        let mut records = Vec::new();
        while let Some(document) = cursor.try_next().await.map_err(backend)? {
            records.push(decode(collection, document)?);
        }
        debug!(%collection, count = records.len(), "query complete");
        Ok(records)
    }

    async fn get(&self, collection: &Collection, id: &str) -> StoreResult<Option<Record>> {
        let found = self
            .documents(collection)
            .find_one(doc! { "_id": key(collection, id)? })
            .await
            .map_err(backend)?;
        found.map(|document| decode(collection, document)).transpose()
    }

    async fn create(&self, collection: &Collection, fields: Fields) -> StoreResult<String> {
        let documents = self.documents(collection);
        let id = match collection {
            Collection::GrowSpaces => {
                let result = documents.insert_one(encode(&fields)?).await.map_err(backend)?;
                result
                    .inserted_id
                    .as_object_id()
                    .map(|oid| oid.to_hex())
                    .ok_or_else(|| StoreError::Backend("inserted id is not an ObjectId".into()))?
            }
            Collection::Notes { .. } => {
                let id = ObjectId::new().to_hex();
                let mut document = encode_scoped(collection, &id, &fields)?;
                document.insert("_id", key(collection, &id)?);
                documents.insert_one(document).await.map_err(backend)?;
                id
            }
        };
        debug!(%collection, %id, "record created");
        Ok(id)
    }

    async fn set(&self, collection: &Collection, id: &str, fields: Fields) -> StoreResult<()> {
        let replacement = encode_scoped(collection, id, &fields)?;
        self.documents(collection)
            .replace_one(doc! { "_id": key(collection, id)? }, replacement)
            .upsert(true)
            .await
            .map_err(backend)?;
        debug!(%collection, %id, "record written");
        Ok(())
    }

    async fn update(&self, collection: &Collection, id: &str, fields: Fields) -> StoreResult<()> {
        let result = self
            .documents(collection)
            .update_one(doc! { "_id": key(collection, id)? }, doc! { "$set": encode(&fields)? })
            .await
            .map_err(backend)?;
        if result.matched_count == 0 {
            return Err(StoreError::NotFound(format!("{collection}/{id}")));
        }
        debug!(%collection, %id, "record updated");
        Ok(())
    }

    async fn delete(&self, collection: &Collection, id: &str) -> StoreResult<()> {
        let result = self
            .documents(collection)
            .delete_one(doc! { "_id": key(collection, id)? })
            .await
            .map_err(backend)?;
        if result.deleted_count == 0 {
            return Err(StoreError::NotFound(format!("{collection}/{id}")));
        }
        debug!(%collection, %id, "record deleted");
        Ok(())
    }
}
