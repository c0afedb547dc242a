//! Task boundary request types
//!
//! Relational requests arrive either as a bare query string or as
//! `{ "sql": ..., "params": [...] }`. Document requests arrive as
//! `{ "collection": ..., "operation": ..., "query": {...} }` and are validated
//! into a [`DocumentOperation`] before any backend is touched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BridgeError, BridgeResult};

/// Names of the registered bridge tasks
pub const MYSQL_TASK: &str = "queryMySQL";
pub const POSTGRES_TASK: &str = "queryPostgres";
pub const MONGO_TASK: &str = "queryMongo";

/// Request for a relational backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlRequest {
    /// Raw query text, executed as given.
    ///
    /// Values interpolated by the caller are not escaped; prefer
    /// [`SqlRequest::Parameterized`] for anything built from test input.
    Raw(String),

    /// Query with positional placeholders and bound values
    Parameterized {
        sql: String,
        #[serde(default)]
        params: Vec<Value>,
    },
}

impl SqlRequest {
    pub fn raw(sql: impl Into<String>) -> Self {
        SqlRequest::Raw(sql.into())
    }

    pub fn parameterized(sql: impl Into<String>, params: Vec<Value>) -> Self {
        SqlRequest::Parameterized {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        match self {
            SqlRequest::Raw(sql) => sql,
            SqlRequest::Parameterized { sql, .. } => sql,
        }
    }

    pub fn params(&self) -> &[Value] {
        match self {
            SqlRequest::Raw(_) => &[],
            SqlRequest::Parameterized { params, .. } => params,
        }
    }

    pub fn from_payload(payload: Value) -> BridgeResult<Self> {
        serde_json::from_value(payload).map_err(|_| {
            BridgeError::InvalidRequest(
                "expected a query string or an object with `sql` and `params`".to_string(),
            )
        })
    }

    pub fn into_payload(self) -> Value {
        match self {
            SqlRequest::Raw(sql) => Value::String(sql),
            SqlRequest::Parameterized { sql, params } => {
                serde_json::json!({ "sql": sql, "params": params })
            }
        }
    }
}

/// One document-store operation, carrying only the fields it needs
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOperation {
    Find { filter: Map<String, Value> },
    InsertOne { document: Map<String, Value> },
    UpdateOne {
        filter: Map<String, Value>,
        update: Map<String, Value>,
    },
    DeleteOne { filter: Map<String, Value> },
}

impl DocumentOperation {
    /// Wire name of the operation
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentOperation::Find { .. } => "find",
            DocumentOperation::InsertOne { .. } => "insertOne",
            DocumentOperation::UpdateOne { .. } => "updateOne",
            DocumentOperation::DeleteOne { .. } => "deleteOne",
        }
    }
}

/// Validated request for the document backend
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRequest {
    pub collection: String,
    pub operation: DocumentOperation,
}

/// Document request as it crosses the boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireDocumentRequest {
    pub collection: String,
    pub operation: String,
    #[serde(default)]
    pub query: Value,
}

impl DocumentRequest {
    pub fn new(collection: impl Into<String>, operation: DocumentOperation) -> Self {
        Self {
            collection: collection.into(),
            operation,
        }
    }

    pub fn from_payload(payload: Value) -> BridgeResult<Self> {
        let wire: WireDocumentRequest = serde_json::from_value(payload).map_err(|e| {
            BridgeError::InvalidRequest(format!("malformed document request: {}", e))
        })?;
        Self::try_from(wire)
    }

    pub fn into_payload(self) -> Value {
        serde_json::to_value(WireDocumentRequest::from(self)).unwrap_or(Value::Null)
    }
}

impl TryFrom<WireDocumentRequest> for DocumentRequest {
    type Error = BridgeError;

    fn try_from(wire: WireDocumentRequest) -> BridgeResult<Self> {
        let operation = match wire.operation.as_str() {
            "find" => DocumentOperation::Find {
                filter: object_or_empty(wire.query, "query")?,
            },
            "insertOne" => DocumentOperation::InsertOne {
                document: object_or_empty(wire.query, "query")?,
            },
            "updateOne" => {
                let mut query = object_or_empty(wire.query, "query")?;
                let filter = query.remove("filter").ok_or_else(|| {
                    BridgeError::InvalidRequest("updateOne requires `query.filter`".to_string())
                })?;
                let update = query.remove("update").ok_or_else(|| {
                    BridgeError::InvalidRequest("updateOne requires `query.update`".to_string())
                })?;
                DocumentOperation::UpdateOne {
                    filter: object_or_empty(filter, "query.filter")?,
                    update: object_or_empty(update, "query.update")?,
                }
            }
            "deleteOne" => DocumentOperation::DeleteOne {
                filter: object_or_empty(wire.query, "query")?,
            },
            other => return Err(BridgeError::UnsupportedOperation(other.to_string())),
        };

        Ok(Self {
            collection: wire.collection,
            operation,
        })
    }
}

impl From<DocumentRequest> for WireDocumentRequest {
    fn from(request: DocumentRequest) -> Self {
        let kind = request.operation.kind().to_string();
        let query = match request.operation {
            DocumentOperation::Find { filter } | DocumentOperation::DeleteOne { filter } => {
                Value::Object(filter)
            }
            DocumentOperation::InsertOne { document } => Value::Object(document),
            DocumentOperation::UpdateOne { filter, update } => serde_json::json!({
                "filter": filter,
                "update": update,
            }),
        };
        Self {
            collection: request.collection,
            operation: kind,
            query,
        }
    }
}

fn object_or_empty(value: Value, field: &str) -> BridgeResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(BridgeError::InvalidRequest(format!(
            "`{}` must be an object, got {}",
            field, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sql_request_accepts_bare_string() {
        let req = SqlRequest::from_payload(json!("SELECT * FROM users")).unwrap();
        assert_eq!(req, SqlRequest::raw("SELECT * FROM users"));
        assert!(req.params().is_empty());
    }

    #[test]
    fn test_sql_request_accepts_parameterized() {
        let req = SqlRequest::from_payload(json!({
            "sql": "SELECT * FROM users WHERE name = ?",
            "params": ["Ana"]
        }))
        .unwrap();
        assert_eq!(req.sql(), "SELECT * FROM users WHERE name = ?");
        assert_eq!(req.params(), &[json!("Ana")]);
    }

    #[test]
    fn test_sql_request_rejects_numbers() {
        let err = SqlRequest::from_payload(json!(42)).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidRequest(_)));
    }

    #[test]
    fn test_document_request_rejects_unknown_operation() {
        let err = DocumentRequest::from_payload(json!({
            "collection": "users",
            "operation": "aggregate",
            "query": {}
        }))
        .unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedOperation(ref op) if op == "aggregate"));
    }

    #[test]
    fn test_update_requires_filter_and_update() {
        let err = DocumentRequest::from_payload(json!({
            "collection": "users",
            "operation": "updateOne",
            "query": { "filter": { "name": "Ana" } }
        }))
        .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidRequest(ref m) if m.contains("query.update")));

        let ok = DocumentRequest::from_payload(json!({
            "collection": "users",
            "operation": "updateOne",
            "query": { "filter": { "name": "Ana" }, "update": { "$set": { "email": "a@x.com" } } }
        }))
        .unwrap();
        assert_eq!(ok.operation.kind(), "updateOne");
    }

    #[test]
    fn test_find_without_query_matches_everything() {
        let req = DocumentRequest::from_payload(json!({
            "collection": "users",
            "operation": "find"
        }))
        .unwrap();
        assert_eq!(req.operation, DocumentOperation::Find { filter: Map::new() });
    }

    #[test]
    fn test_payload_shape_matches_wire_format() {
        let mut filter = Map::new();
        filter.insert("name".to_string(), json!("Ana"));
        let payload = DocumentRequest::new("users", DocumentOperation::DeleteOne { filter }).into_payload();

        assert_eq!(
            payload,
            json!({ "collection": "users", "operation": "deleteOne", "query": { "name": "Ana" } })
        );
    }
}
