//! Task dispatcher
//!
//! Maps task names to handlers and forwards payloads unchanged. The dispatcher
//! itself performs no validation, retries or timeouts.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use taskbridge_common::{
    BridgeError, BridgeResult, DocumentRequest, RuntimeConfig, SqlRequest, MONGO_TASK,
    MYSQL_TASK, POSTGRES_TASK,
};

use crate::connection::{Adapter, Connector, RequestOf};
use crate::mongo::MongoConnector;
use crate::mysql::MySqlConnector;
use crate::postgres::PostgresConnector;

/// Decode a boundary payload into a backend request
pub trait FromPayload: Sized {
    fn from_payload(payload: Value) -> BridgeResult<Self>;
}

impl FromPayload for SqlRequest {
    fn from_payload(payload: Value) -> BridgeResult<Self> {
        SqlRequest::from_payload(payload)
    }
}

impl FromPayload for DocumentRequest {
    fn from_payload(payload: Value) -> BridgeResult<Self> {
        DocumentRequest::from_payload(payload)
    }
}

/// Something that can serve a named task
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, payload: Value) -> BridgeResult<Value>;
}

// The payload is decoded before connecting, so a rejected request never
// touches the network.
#[async_trait]
impl<C> TaskHandler for Adapter<C>
where
    C: Connector,
    RequestOf<C>: FromPayload,
{
    async fn handle(&self, payload: Value) -> BridgeResult<Value> {
        let request = <RequestOf<C> as FromPayload>::from_payload(payload)?;
        self.execute(request).await
    }
}

/// Handler backed by an async closure
pub struct TaskFn<F>(F);

/// Wrap an async closure as a [`TaskHandler`]
pub fn task_fn<F, Fut>(f: F) -> TaskFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = BridgeResult<Value>> + Send,
{
    TaskFn(f)
}

#[async_trait]
impl<F, Fut> TaskHandler for TaskFn<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = BridgeResult<Value>> + Send,
{
    async fn handle(&self, payload: Value) -> BridgeResult<Value> {
        (self.0)(payload).await
    }
}

/// Invokes named tasks, in-process or across a transport
#[async_trait]
pub trait TaskInvoker: Send + Sync {
    async fn invoke(&self, task: &str, payload: Value) -> BridgeResult<Value>;
}

/// Name to handler registry
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; a later registration under the same name wins
    pub fn register<H>(&mut self, name: impl Into<String>, handler: H) -> &mut Self
    where
        H: TaskHandler + 'static,
    {
        let name = name.into();
        if self.handlers.insert(name.clone(), Arc::new(handler)).is_some() {
            warn!("Task {} re-registered; previous handler replaced", name);
        } else {
            debug!("Registered task {}", name);
        }
        self
    }

    pub async fn dispatch(&self, name: &str, payload: Value) -> BridgeResult<Value> {
        let handler = self
            .handlers
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownTask(name.to_string()))?;
        debug!("Dispatching task {}", name);
        handler.handle(payload).await
    }

    /// Registered task names, sorted
    pub fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

#[async_trait]
impl TaskInvoker for Dispatcher {
    async fn invoke(&self, task: &str, payload: Value) -> BridgeResult<Value> {
        self.dispatch(task, payload).await
    }
}

/// Dispatcher with the three database tasks registered
pub fn default_dispatcher(config: Arc<RuntimeConfig>) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    dispatcher
        .register(MYSQL_TASK, Adapter::new(MySqlConnector::new(config.clone())))
        .register(POSTGRES_TASK, Adapter::new(PostgresConnector::new(config.clone())))
        .register(MONGO_TASK, Adapter::new(MongoConnector::new(config)));
    info!("Registered tasks: {}", dispatcher.task_names().join(", "));
    dispatcher
}
