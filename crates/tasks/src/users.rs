//! User commands for test steps
//!
//! Thin compositions over the database tasks against a `users` table or
//! collection. They work with any [`TaskInvoker`], so the same steps run
//! in-process or over the HTTP boundary.

use serde_json::{json, Map, Value};

use taskbridge_common::{
    BridgeError, BridgeResult, DocumentOperation, DocumentRequest, SqlRequest, MONGO_TASK,
    MYSQL_TASK, POSTGRES_TASK,
};

use crate::dispatcher::TaskInvoker;

/// Table and collection name used by the user commands
pub const USERS: &str = "users";

pub struct UserCommands<I> {
    invoker: I,
}

impl<I: TaskInvoker> UserCommands<I> {
    pub fn new(invoker: I) -> Self {
        Self { invoker }
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    async fn mysql(&self, request: SqlRequest) -> BridgeResult<Value> {
        self.invoker.invoke(MYSQL_TASK, request.into_payload()).await
    }

    async fn postgres(&self, request: SqlRequest) -> BridgeResult<Value> {
        self.invoker.invoke(POSTGRES_TASK, request.into_payload()).await
    }

    async fn mongo(&self, operation: DocumentOperation) -> BridgeResult<Value> {
        let request = DocumentRequest::new(USERS, operation);
        self.invoker.invoke(MONGO_TASK, request.into_payload()).await
    }

    // MySQL

    pub async fn insert_mysql_user(&self, name: &str, email: &str) -> BridgeResult<Value> {
        self.mysql(SqlRequest::parameterized(
            "INSERT INTO users (NAME, EMAIL) VALUES (?, ?)",
            vec![json!(name), json!(email)],
        ))
        .await
    }

    pub async fn find_mysql_user(&self, name: &str) -> BridgeResult<Vec<Value>> {
        let rows = self
            .mysql(SqlRequest::parameterized(
                "SELECT * FROM users WHERE NAME = ?",
                vec![json!(name)],
            ))
            .await?;
        into_records(rows)
    }

    pub async fn delete_mysql_user(&self, name: &str) -> BridgeResult<Value> {
        self.mysql(SqlRequest::parameterized(
            "DELETE FROM users WHERE NAME = ?",
            vec![json!(name)],
        ))
        .await
    }

    // PostgreSQL

    pub async fn insert_postgres_user(&self, name: &str, email: &str) -> BridgeResult<Value> {
        self.postgres(SqlRequest::parameterized(
            "INSERT INTO users (name, email) VALUES ($1, $2)",
            vec![json!(name), json!(email)],
        ))
        .await
    }

    pub async fn find_postgres_user(&self, name: &str) -> BridgeResult<Vec<Value>> {
        let rows = self
            .postgres(SqlRequest::parameterized(
                "SELECT * FROM users WHERE name = $1",
                vec![json!(name)],
            ))
            .await?;
        into_records(rows)
    }

    pub async fn delete_postgres_user(&self, name: &str) -> BridgeResult<Value> {
        self.postgres(SqlRequest::parameterized(
            "DELETE FROM users WHERE name = $1",
            vec![json!(name)],
        ))
        .await
    }

    // MongoDB

    pub async fn insert_mongo_user(&self, name: &str, email: &str) -> BridgeResult<Value> {
        self.mongo(DocumentOperation::InsertOne {
            document: user_document(name, Some(email)),
        })
        .await
    }

    pub async fn find_mongo_user(&self, name: &str) -> BridgeResult<Vec<Value>> {
        let documents = self
            .mongo(DocumentOperation::Find {
                filter: user_document(name, None),
            })
            .await?;
        into_records(documents)
    }

    pub async fn delete_mongo_user(&self, name: &str) -> BridgeResult<Value> {
        self.mongo(DocumentOperation::DeleteOne {
            filter: user_document(name, None),
        })
        .await
    }
}

fn user_document(name: &str, email: Option<&str>) -> Map<String, Value> {
    let mut document = Map::new();
    document.insert("name".to_string(), json!(name));
    if let Some(email) = email {
        document.insert("email".to_string(), json!(email));
    }
    document
}

fn into_records(result: Value) -> BridgeResult<Vec<Value>> {
    match result {
        Value::Array(records) => Ok(records),
        other => Err(BridgeError::Backend(format!(
            "expected a list of records, got {}",
            other
        ))),
    }
}

/// Field lookup that ignores case, so `EMAIL` and `email` both match
fn field<'a>(record: &'a Value, key: &str) -> Option<&'a Value> {
    record
        .as_object()?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

/// Assert that exactly one record exists and carries the given email
pub fn expect_user_present(records: &[Value], email: &str) -> BridgeResult<()> {
    match records {
        [record] => match field(record, "email").and_then(Value::as_str) {
            Some(found) if found == email => Ok(()),
            Some(found) => Err(BridgeError::AssertionFailed(format!(
                "expected email {}, found {}",
                email, found
            ))),
            None => Err(BridgeError::AssertionFailed(format!(
                "record has no email field: {}",
                record
            ))),
        },
        _ => Err(BridgeError::AssertionFailed(format!(
            "expected exactly one user, found {}",
            records.len()
        ))),
    }
}

/// Assert that no record was found
pub fn expect_user_absent(records: &[Value]) -> BridgeResult<()> {
    if records.is_empty() {
        Ok(())
    } else {
        Err(BridgeError::AssertionFailed(format!(
            "expected no users, found {}",
            records.len()
        )))
    }
}
