//! User scenario against an in-memory document store
//!
//! Drives `UserCommands` through the dispatcher and a real `Adapter`, with a
//! connector that keeps documents in memory and counts connections.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use taskbridge_common::{BridgeResult, DocumentOperation, DocumentRequest, MONGO_TASK};
use taskbridge_tasks::{
    expect_user_absent, expect_user_present, Adapter, Connection, Connector, Dispatcher,
    UserCommands,
};

#[derive(Default)]
struct Store {
    documents: Mutex<Vec<Map<String, Value>>>,
    next_id: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

fn matches_filter(document: &Map<String, Value>, filter: &Map<String, Value>) -> bool {
    filter.iter().all(|(k, v)| document.get(k) == Some(v))
}

struct MemoryConnector {
    store: Arc<Store>,
}

struct MemoryConnection {
    store: Arc<Store>,
}

#[async_trait]
impl Connector for MemoryConnector {
    type Conn = MemoryConnection;

    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn connect(&self) -> BridgeResult<MemoryConnection> {
        self.store.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConnection {
            store: self.store.clone(),
        })
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    type Request = DocumentRequest;

    async fn execute(&mut self, request: DocumentRequest) -> BridgeResult<Value> {
        let mut documents = self.store.documents.lock().unwrap();
        match request.operation {
            DocumentOperation::Find { filter } => Ok(Value::Array(
                documents
                    .iter()
                    .filter(|d| matches_filter(d, &filter))
                    .cloned()
                    .map(Value::Object)
                    .collect(),
            )),
            DocumentOperation::InsertOne { mut document } => {
                let id = self.store.next_id.fetch_add(1, Ordering::SeqCst);
                document.insert("_id".to_string(), json!(id));
                documents.push(document);
                Ok(json!({ "acknowledged": true, "insertedId": id }))
            }
            DocumentOperation::UpdateOne { filter, update } => {
                let target = documents.iter_mut().find(|d| matches_filter(d, &filter));
                let matched = target.is_some() as u64;
                if let (Some(document), Some(Value::Object(set))) = (target, update.get("$set")) {
                    document.extend(set.clone());
                }
                Ok(json!({
                    "acknowledged": true,
                    "matchedCount": matched,
                    "modifiedCount": matched,
                    "upsertedId": null,
                }))
            }
            DocumentOperation::DeleteOne { filter } => {
                let position = documents.iter().position(|d| matches_filter(d, &filter));
                let deleted = match position {
                    Some(index) => {
                        documents.remove(index);
                        1
                    }
                    None => 0,
                };
                Ok(json!({ "acknowledged": true, "deletedCount": deleted }))
            }
        }
    }

    async fn close(self) -> BridgeResult<()> {
        self.store.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn users_over_memory() -> (UserCommands<Dispatcher>, Arc<Store>) {
    let store = Arc::new(Store::default());
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(
        MONGO_TASK,
        Adapter::new(MemoryConnector {
            store: store.clone(),
        }),
    );
    (UserCommands::new(dispatcher), store)
}

#[tokio::test]
async fn test_insert_find_delete_find() {
    let (users, store) = users_over_memory();

    let inserted = users.insert_mongo_user("Ana", "ana@x.com").await.unwrap();
    assert_eq!(inserted["acknowledged"], json!(true));

    let found = users.find_mongo_user("Ana").await.unwrap();
    assert_eq!(found.len(), 1);
    expect_user_present(&found, "ana@x.com").unwrap();

    let deleted = users.delete_mongo_user("Ana").await.unwrap();
    assert_eq!(deleted["deletedCount"], json!(1));

    let found = users.find_mongo_user("Ana").await.unwrap();
    expect_user_absent(&found).unwrap();

    // One connection per call, each released
    assert_eq!(store.opened.load(Ordering::SeqCst), 4);
    assert_eq!(store.closed.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_delete_missing_user_reports_zero() {
    let (users, _store) = users_over_memory();
    let deleted = users.delete_mongo_user("Nobody").await.unwrap();
    assert_eq!(deleted["deletedCount"], json!(0));
}

#[tokio::test]
async fn test_update_one_through_dispatcher() {
    let (users, _store) = users_over_memory();
    users.insert_mongo_user("Ana", "ana@x.com").await.unwrap();

    let result = users
        .invoker()
        .dispatch(
            MONGO_TASK,
            json!({
                "collection": "users",
                "operation": "updateOne",
                "query": {
                    "filter": { "name": "Ana" },
                    "update": { "$set": { "email": "ana@y.com" } }
                }
            }),
        )
        .await
        .unwrap();
    assert_eq!(result["matchedCount"], json!(1));

    let found = users.find_mongo_user("Ana").await.unwrap();
    expect_user_present(&found, "ana@y.com").unwrap();
}

#[tokio::test]
async fn test_unsupported_operation_opens_no_connection() {
    let (users, store) = users_over_memory();
    let err = users
        .invoker()
        .dispatch(
            MONGO_TASK,
            json!({ "collection": "users", "operation": "aggregate", "query": [] }),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "unsupported_operation");
    assert_eq!(store.opened.load(Ordering::SeqCst), 0);
}
