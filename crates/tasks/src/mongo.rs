//! MongoDB adapter
//!
//! Reads `MONGO_URI` and `MONGO_DB` from the runtime configuration. When
//! `MONGO_DB` is unset the database named in the URI is used.
//!
//! Requests are validated into a [`DocumentOperation`] before the adapter is
//! reached, so an unsupported operation never opens a client.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

use taskbridge_common::{
    BridgeError, BridgeResult, DocumentOperation, DocumentRequest, RuntimeConfig,
};

use crate::connection::{Connection, Connector};
use crate::sql::required_var;

/// Connection settings for MongoDB
#[derive(Clone, PartialEq, Eq)]
pub struct MongoSettings {
    pub uri: String,
    pub database: Option<String>,
}

impl std::fmt::Debug for MongoSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoSettings")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl MongoSettings {
    pub fn from_config(config: &RuntimeConfig) -> BridgeResult<Self> {
        Ok(Self {
            uri: required_var(config, "MONGO_URI")?,
            database: config.non_empty_var("MONGO_DB").map(str::to_string),
        })
    }
}

/// Opens one MongoDB client per call
pub struct MongoConnector {
    config: Arc<RuntimeConfig>,
}

impl MongoConnector {
    pub fn new(config: Arc<RuntimeConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for MongoConnector {
    type Conn = MongoSession;

    fn backend(&self) -> &'static str {
        "mongo"
    }

    async fn connect(&self) -> BridgeResult<MongoSession> {
        let settings = MongoSettings::from_config(&self.config)?;
        let options = ClientOptions::parse(&settings.uri)
            .await
            .map_err(|e| BridgeError::Configuration(format!("invalid MONGO_URI: {}", e)))?;

        let database = settings
            .database
            .or_else(|| options.default_database.clone())
            .ok_or_else(|| {
                BridgeError::Configuration(
                    "MONGO_DB is not set and MONGO_URI names no database".to_string(),
                )
            })?;

        debug!("Opening MongoDB client for database {}", database);
        let client = Client::with_options(options).map_err(mongo_error)?;
        Ok(MongoSession { client, database })
    }
}

/// An open MongoDB client bound to one database
pub struct MongoSession {
    client: Client,
    database: String,
}

#[async_trait]
impl Connection for MongoSession {
    type Request = DocumentRequest;

    async fn execute(&mut self, request: DocumentRequest) -> BridgeResult<Value> {
        let collection: Collection<Document> = self
            .client
            .database(&self.database)
            .collection(&request.collection);

        debug!(
            "MongoDB {} on {}.{}",
            request.operation.kind(),
            self.database,
            request.collection
        );

        match request.operation {
            DocumentOperation::Find { filter } => {
                let cursor = collection
                    .find(to_document(filter)?, None)
                    .await
                    .map_err(mongo_error)?;
                let documents: Vec<Document> = cursor.try_collect().await.map_err(mongo_error)?;
                Ok(Value::Array(
                    documents
                        .into_iter()
                        .map(|d| Bson::Document(d).into_relaxed_extjson())
                        .collect(),
                ))
            }
            DocumentOperation::InsertOne { document } => {
                let result = collection
                    .insert_one(to_document(document)?, None)
                    .await
                    .map_err(mongo_error)?;
                Ok(json!({
                    "acknowledged": true,
                    "insertedId": result.inserted_id.into_relaxed_extjson(),
                }))
            }
            DocumentOperation::UpdateOne { filter, update } => {
                let result = collection
                    .update_one(to_document(filter)?, to_document(update)?, None)
                    .await
                    .map_err(mongo_error)?;
                Ok(json!({
                    "acknowledged": true,
                    "matchedCount": result.matched_count,
                    "modifiedCount": result.modified_count,
                    "upsertedId": result.upserted_id.map(Bson::into_relaxed_extjson),
                }))
            }
            DocumentOperation::DeleteOne { filter } => {
                let result = collection
                    .delete_one(to_document(filter)?, None)
                    .await
                    .map_err(mongo_error)?;
                Ok(json!({
                    "acknowledged": true,
                    "deletedCount": result.deleted_count,
                }))
            }
        }
    }

    async fn close(self) -> BridgeResult<()> {
        self.client.shutdown().await;
        Ok(())
    }
}

/// Extended JSON object to BSON document (`{"$oid": ...}` becomes an ObjectId)
fn to_document(map: Map<String, Value>) -> BridgeResult<Document> {
    Document::try_from(map).map_err(|e| BridgeError::InvalidRequest(format!("invalid document: {}", e)))
}

fn mongo_error(e: mongodb::error::Error) -> BridgeError {
    match e.kind.as_ref() {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Authentication { .. }
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. } => BridgeError::Connection(e.to_string()),
        _ => BridgeError::Backend(e.to_string()),
    }
}
