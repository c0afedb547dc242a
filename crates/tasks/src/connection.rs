//! Per-call connection lifecycle
//!
//! Every bridge call opens exactly one connection, runs exactly one
//! operation and closes that connection before the result (or error) is
//! returned. Nothing is pooled or reused between calls.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use taskbridge_common::BridgeResult;

/// An open, exclusively owned backend connection
#[async_trait]
pub trait Connection: Send {
    /// Operation description this backend understands
    type Request: Send + 'static;

    /// Run one operation
    async fn execute(&mut self, request: Self::Request) -> BridgeResult<Value>;

    /// Release the connection
    async fn close(self) -> BridgeResult<()>;
}

/// Opens connections for one backend
#[async_trait]
pub trait Connector: Send + Sync {
    type Conn: Connection;

    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    async fn connect(&self) -> BridgeResult<Self::Conn>;
}

/// Request type accepted by a connector's connections
pub type RequestOf<C> = <<C as Connector>::Conn as Connection>::Request;

/// Connect, execute once, and always close.
///
/// An execution error takes precedence over a close error; a close error on
/// an otherwise successful call is returned to the caller.
pub async fn run_once<C: Connector>(connector: &C, request: RequestOf<C>) -> BridgeResult<Value> {
    let backend = connector.backend();
    let mut conn = connector.connect().await?;
    debug!("{}: connection opened", backend);

    let outcome = conn.execute(request).await;
    let released = conn.close().await;
    debug!("{}: connection closed", backend);

    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!("{}: close failed after error: {}", backend, close_err);
            Err(e)
        }
    }
}

/// A backend adapter: one connector plus the per-call lifecycle
pub struct Adapter<C> {
    connector: C,
}

impl<C: Connector> Adapter<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Execute a single request on a fresh connection
    pub async fn execute(&self, request: RequestOf<C>) -> BridgeResult<Value> {
        run_once(&self.connector, request).await
    }
}
