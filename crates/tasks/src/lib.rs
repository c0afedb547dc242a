//! Taskbridge Tasks
//!
//! Backend adapters and the dispatcher that serves them:
//!
//! - [`connection`]: the open, execute, close lifecycle every call goes through
//! - [`mysql`], [`postgres`], [`mongo`]: one adapter per backend
//! - [`dispatcher`]: task name registry and the [`TaskInvoker`] seam
//! - [`users`]: user commands composed from the database tasks

pub mod connection;
pub mod dispatcher;
pub mod mongo;
pub mod mysql;
pub mod postgres;
mod sql;
pub mod users;

pub use connection::{run_once, Adapter, Connection, Connector, RequestOf};
pub use dispatcher::{default_dispatcher, task_fn, Dispatcher, FromPayload, TaskHandler, TaskInvoker};
pub use mongo::{MongoConnector, MongoSettings};
pub use mysql::{MySqlConnector, MySqlSettings};
pub use postgres::{PostgresConnector, PostgresSettings};
pub use users::{expect_user_absent, expect_user_present, UserCommands};
