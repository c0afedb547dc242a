//! MySQL adapter
//!
//! Reads `MYSQL_HOST`, `MYSQL_USER`, `MYSQL_PASS`, `MYSQL_DB` and `MYSQL_PORT`
//! (default 3306) from the runtime configuration on every call.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sqlx::mysql::types::MySqlTime;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Connection as _, Decode, Executor, Row, Statement, Type, TypeInfo};
use std::sync::Arc;
use tracing::debug;

use taskbridge_common::{BridgeResult, RuntimeConfig, SqlRequest};

use crate::connection::{Connection, Connector};
use crate::sql::{connect_error, encode_bytes, port_var, required_var, sql_error, SqlParam};

pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Connection settings for MySQL
#[derive(Clone, PartialEq, Eq)]
pub struct MySqlSettings {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl std::fmt::Debug for MySqlSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl MySqlSettings {
    pub fn from_config(config: &RuntimeConfig) -> BridgeResult<Self> {
        Ok(Self {
            host: required_var(config, "MYSQL_HOST")?,
            port: port_var(config, "MYSQL_PORT", DEFAULT_MYSQL_PORT)?,
            user: config.non_empty_var("MYSQL_USER").map(str::to_string),
            password: config.non_empty_var("MYSQL_PASS").map(str::to_string),
            database: config.non_empty_var("MYSQL_DB").map(str::to_string),
        })
    }

    pub fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new().host(&self.host).port(self.port);
        if let Some(user) = &self.user {
            options = options.username(user);
        }
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        if let Some(database) = &self.database {
            options = options.database(database);
        }
        options
    }
}

/// Opens one MySQL connection per call
pub struct MySqlConnector {
    config: Arc<RuntimeConfig>,
}

impl MySqlConnector {
    pub fn new(config: Arc<RuntimeConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    type Conn = MySqlSession;

    fn backend(&self) -> &'static str {
        "mysql"
    }

    async fn connect(&self) -> BridgeResult<MySqlSession> {
        let settings = MySqlSettings::from_config(&self.config)?;
        debug!("Connecting to MySQL at {}:{}", settings.host, settings.port);
        let conn = MySqlConnection::connect_with(&settings.connect_options())
            .await
            .map_err(connect_error)?;
        Ok(MySqlSession { conn })
    }
}

/// An open MySQL connection
pub struct MySqlSession {
    conn: MySqlConnection,
}

#[async_trait]
impl Connection for MySqlSession {
    type Request = SqlRequest;

    async fn execute(&mut self, request: SqlRequest) -> BridgeResult<Value> {
        let statement = (&mut self.conn)
            .prepare(request.sql())
            .await
            .map_err(sql_error)?;

        let mut query = statement.query();
        for param in request.params() {
            query = bind_param(query, SqlParam::from_json(param)?);
        }

        if statement.columns().is_empty() {
            let done = query.execute(&mut self.conn).await.map_err(sql_error)?;
            Ok(json!({
                "affectedRows": done.rows_affected(),
                "insertId": done.last_insert_id(),
            }))
        } else {
            let rows = query.fetch_all(&mut self.conn).await.map_err(sql_error)?;
            let rows = rows.iter().map(row_to_json).collect::<BridgeResult<Vec<_>>>()?;
            Ok(Value::Array(rows))
        }
    }

    async fn close(self) -> BridgeResult<()> {
        self.conn.close().await.map_err(connect_error)
    }
}

fn bind_param<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    param: SqlParam,
) -> Query<'q, MySql, MySqlArguments> {
    match param {
        SqlParam::Null => query.bind(None::<String>),
        SqlParam::Bool(b) => query.bind(b),
        SqlParam::Int(i) => query.bind(i),
        SqlParam::Float(f) => query.bind(f),
        SqlParam::Text(s) => query.bind(s),
    }
}

fn decode<'r, T>(row: &'r MySqlRow, index: usize) -> BridgeResult<Option<T>>
where
    T: Decode<'r, MySql> + Type<MySql>,
{
    row.try_get::<Option<T>, _>(index).map_err(sql_error)
}

/// How a column is decoded, by MySQL type name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Unsigned,
    Signed,
    Float,
    Double,
    Year,
    Bit,
    DateTime,
    Timestamp,
    Date,
    Time,
    Json,
    Bytes,
    Text,
}

impl ColumnKind {
    fn of(type_name: &str) -> Self {
        match type_name {
            "BOOLEAN" => ColumnKind::Bool,
            name if name.ends_with("UNSIGNED") => ColumnKind::Unsigned,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => ColumnKind::Signed,
            "FLOAT" => ColumnKind::Float,
            "DOUBLE" => ColumnKind::Double,
            "YEAR" => ColumnKind::Year,
            "BIT" => ColumnKind::Bit,
            "DATETIME" => ColumnKind::DateTime,
            "TIMESTAMP" => ColumnKind::Timestamp,
            "DATE" => ColumnKind::Date,
            "TIME" => ColumnKind::Time,
            "JSON" => ColumnKind::Json,
            "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
                ColumnKind::Bytes
            }
            // CHAR, VARCHAR, TEXT, DECIMAL, ENUM and SET are length-prefixed
            // strings in the binary protocol
            _ => ColumnKind::Text,
        }
    }
}

fn row_to_json(row: &MySqlRow) -> BridgeResult<Value> {
    let mut object = Map::new();

    for column in row.columns() {
        let index = column.ordinal();

        let value = match ColumnKind::of(column.type_info().name()) {
            ColumnKind::Bool => decode::<bool>(row, index)?.map(Value::Bool),
            ColumnKind::Unsigned => decode::<u64>(row, index)?.map(|v| json!(v)),
            ColumnKind::Signed => decode::<i64>(row, index)?.map(|v| json!(v)),
            ColumnKind::Float => decode::<f32>(row, index)?.map(|v| json!(v)),
            ColumnKind::Double => decode::<f64>(row, index)?.map(|v| json!(v)),
            // Two little-endian bytes; read without the unsigned-flag check
            ColumnKind::Year => row
                .try_get_unchecked::<Option<u16>, _>(index)
                .map_err(sql_error)?
                .map(|v| json!(v)),
            ColumnKind::Bit => decode::<u64>(row, index)?.map(|v| json!(v)),
            ColumnKind::DateTime => decode::<chrono::NaiveDateTime>(row, index)?.map(|v| json!(v)),
            ColumnKind::Timestamp => {
                decode::<chrono::DateTime<chrono::Utc>>(row, index)?.map(|v| json!(v))
            }
            ColumnKind::Date => decode::<chrono::NaiveDate>(row, index)?.map(|v| json!(v)),
            // Signed and may exceed 24 hours, so not a NaiveTime
            ColumnKind::Time => decode::<MySqlTime>(row, index)?.map(|v| json!(v.to_string())),
            ColumnKind::Json => decode::<Value>(row, index)?,
            ColumnKind::Bytes => decode::<Vec<u8>>(row, index)?.map(encode_bytes),
            ColumnKind::Text => row
                .try_get_unchecked::<Option<String>, _>(index)
                .map_err(sql_error)?
                .map(Value::String),
        };

        object.insert(column.name().to_string(), value.unwrap_or(Value::Null));
    }

    Ok(Value::Object(object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use taskbridge_common::{BridgeError, FixtureData};
    use test_case::test_case;

    fn config(vars: &[(&str, &str)]) -> RuntimeConfig {
        let vars: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RuntimeConfig::assemble("qa", vars, FixtureData::new(json!({})))
    }

    #[test]
    fn test_settings_from_config() {
        let settings = MySqlSettings::from_config(&config(&[
            ("MYSQL_HOST", "db.qa"),
            ("MYSQL_USER", "tester"),
            ("MYSQL_PASS", "pw"),
            ("MYSQL_DB", "shop"),
        ]))
        .unwrap();

        assert_eq!(settings.host, "db.qa");
        assert_eq!(settings.port, DEFAULT_MYSQL_PORT);
        assert_eq!(settings.database.as_deref(), Some("shop"));
        assert!(!format!("{:?}", settings).contains("pw"));
    }

    #[test_case("BOOLEAN", ColumnKind::Bool ; "boolean")]
    #[test_case("INT UNSIGNED", ColumnKind::Unsigned ; "unsigned")]
    #[test_case("BIGINT", ColumnKind::Signed ; "bigint")]
    #[test_case("YEAR", ColumnKind::Year ; "year")]
    #[test_case("BIT", ColumnKind::Bit ; "bit")]
    #[test_case("TIME", ColumnKind::Time ; "time")]
    #[test_case("DATETIME", ColumnKind::DateTime ; "datetime")]
    #[test_case("VARBINARY", ColumnKind::Bytes ; "varbinary")]
    #[test_case("DECIMAL", ColumnKind::Text ; "decimal")]
    #[test_case("VARCHAR", ColumnKind::Text ; "varchar")]
    fn test_column_kind(type_name: &str, expected: ColumnKind) {
        assert_eq!(ColumnKind::of(type_name), expected);
    }

    #[test]
    fn test_missing_host_is_configuration_error() {
        let err = MySqlSettings::from_config(&config(&[])).unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(ref m) if m.contains("MYSQL_HOST")));
    }

    #[tokio::test]
    async fn test_connect_without_host_fails_before_network() {
        let connector = MySqlConnector::new(Arc::new(config(&[])));
        let err = connector.connect().await.err().unwrap();
        assert_eq!(err.kind(), "configuration");
    }
}
