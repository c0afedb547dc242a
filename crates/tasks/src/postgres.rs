//! PostgreSQL adapter
//!
//! Reads `POSTGRES_HOST`, `POSTGRES_USER`, `POSTGRES_PASS`, `POSTGRES_DB` and
//! `POSTGRES_PORT` (default 5432) from the runtime configuration.
//!
//! Connections always use TLS. Outside production environments the server
//! certificate is accepted without verification, unless
//! `POSTGRES_ACCEPT_INVALID_CERTS=false` opts back into full verification.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sqlx::postgres::{
    PgArguments, PgConnectOptions, PgConnection, PgRow, PgSslMode, PgTypeInfo, Postgres,
};
use sqlx::postgres::types::Oid;
use sqlx::query::Query;
use sqlx::{Column, Connection as _, Decode, Executor, Row, Statement, Type, TypeInfo};
use std::sync::Arc;
use tracing::debug;

use taskbridge_common::{BridgeError, BridgeResult, RuntimeConfig, SqlRequest};

use crate::connection::{Connection, Connector};
use crate::sql::{connect_error, encode_bytes, port_var, required_var, sql_error, SqlParam};

pub const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Opt-out switch for relaxed certificate validation
pub const ACCEPT_INVALID_CERTS_VAR: &str = "POSTGRES_ACCEPT_INVALID_CERTS";

/// Connection settings for PostgreSQL
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    /// Accept the server certificate without validation
    pub relaxed_tls: bool,
}

impl std::fmt::Debug for PostgresSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("relaxed_tls", &self.relaxed_tls)
            .finish_non_exhaustive()
    }
}

impl PostgresSettings {
    pub fn from_config(config: &RuntimeConfig) -> BridgeResult<Self> {
        Ok(Self {
            host: required_var(config, "POSTGRES_HOST")?,
            port: port_var(config, "POSTGRES_PORT", DEFAULT_POSTGRES_PORT)?,
            user: config.non_empty_var("POSTGRES_USER").map(str::to_string),
            password: config.non_empty_var("POSTGRES_PASS").map(str::to_string),
            database: config.non_empty_var("POSTGRES_DB").map(str::to_string),
            relaxed_tls: relaxed_tls_allowed(config),
        })
    }

    pub fn ssl_mode(&self) -> PgSslMode {
        if self.relaxed_tls {
            PgSslMode::Require
        } else {
            PgSslMode::VerifyFull
        }
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new_without_pgpass()
            .host(&self.host)
            .port(self.port)
            .ssl_mode(self.ssl_mode());
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

/// Relaxed TLS is only ever allowed for non-production environments
fn relaxed_tls_allowed(config: &RuntimeConfig) -> bool {
    let opted_out = config
        .non_empty_var(ACCEPT_INVALID_CERTS_VAR)
        .map(|v| v.eq_ignore_ascii_case("false"))
        .unwrap_or(false);
    !config.is_production() && !opted_out
}

/// Opens one PostgreSQL connection per call
pub struct PostgresConnector {
    config: Arc<RuntimeConfig>,
}

impl PostgresConnector {
    pub fn new(config: Arc<RuntimeConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    type Conn = PostgresSession;

    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn connect(&self) -> BridgeResult<PostgresSession> {
        let settings = PostgresSettings::from_config(&self.config)?;
        if settings.relaxed_tls {
            debug!(
                "Connecting to PostgreSQL at {}:{} without certificate verification ({})",
                settings.host,
                settings.port,
                self.config.environment()
            );
        } else {
            debug!("Connecting to PostgreSQL at {}:{}", settings.host, settings.port);
        }
        let conn = PgConnection::connect_with(&settings.connect_options())
            .await
            .map_err(connect_error)?;
        Ok(PostgresSession { conn })
    }
}

/// An open PostgreSQL connection
pub struct PostgresSession {
    conn: PgConnection,
}

#[async_trait]
impl Connection for PostgresSession {
    type Request = SqlRequest;

    async fn execute(&mut self, request: SqlRequest) -> BridgeResult<Value> {
        let params = request
            .params()
            .iter()
            .map(SqlParam::from_json)
            .collect::<BridgeResult<Vec<_>>>()?;

        // Declare parameter types up front so the cached statement agrees
        // with the values bound below.
        let types: Vec<PgTypeInfo> = params.iter().map(param_type).collect();
        let statement = (&mut self.conn)
            .prepare_with(request.sql(), &types)
            .await
            .map_err(sql_error)?;

        let mut query = statement.query();
        for param in params {
            query = bind_param(query, param);
        }

        if statement.columns().is_empty() {
            let done = query.execute(&mut self.conn).await.map_err(sql_error)?;
            Ok(json!({ "rowCount": done.rows_affected() }))
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

fn param_type(param: &SqlParam) -> PgTypeInfo {
    match param {
        // Unspecified: the server infers the type of a bare NULL
        SqlParam::Null => PgTypeInfo::with_oid(Oid(0)),
        SqlParam::Text(_) => <String as Type<Postgres>>::type_info(),
        SqlParam::Bool(_) => <bool as Type<Postgres>>::type_info(),
        SqlParam::Int(_) => <i64 as Type<Postgres>>::type_info(),
        SqlParam::Float(_) => <f64 as Type<Postgres>>::type_info(),
    }
}

fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: SqlParam,
) -> Query<'q, Postgres, PgArguments> {
    match param {
        SqlParam::Null => query.bind(None::<String>),
        SqlParam::Bool(b) => query.bind(b),
        SqlParam::Int(i) => query.bind(i),
        SqlParam::Float(f) => query.bind(f),
        SqlParam::Text(s) => query.bind(s),
    }
}

fn decode<'r, T>(row: &'r PgRow, index: usize) -> BridgeResult<Option<T>>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index).map_err(sql_error)
}

fn row_to_json(row: &PgRow) -> BridgeResult<Value> {
    let mut object = Map::new();

    for column in row.columns() {
        let index = column.ordinal();
        let type_name = column.type_info().name();

        let value = match type_name {
            "BOOL" => decode::<bool>(row, index)?.map(Value::Bool),
            "INT2" => decode::<i16>(row, index)?.map(|v| json!(v)),
            "INT4" => decode::<i32>(row, index)?.map(|v| json!(v)),
            "INT8" => decode::<i64>(row, index)?.map(|v| json!(v)),
            "FLOAT4" => decode::<f32>(row, index)?.map(|v| json!(v)),
            "FLOAT8" => decode::<f64>(row, index)?.map(|v| json!(v)),
            "UUID" => decode::<uuid::Uuid>(row, index)?.map(|v| json!(v)),
            "JSON" | "JSONB" => decode::<Value>(row, index)?,
            "TIMESTAMP" => decode::<chrono::NaiveDateTime>(row, index)?.map(|v| json!(v)),
            "TIMESTAMPTZ" => decode::<chrono::DateTime<chrono::Utc>>(row, index)?.map(|v| json!(v)),
            "DATE" => decode::<chrono::NaiveDate>(row, index)?.map(|v| json!(v)),
            "TIME" => decode::<chrono::NaiveTime>(row, index)?.map(|v| json!(v)),
            "BYTEA" => decode::<Vec<u8>>(row, index)?.map(encode_bytes),
            other => match row.try_get::<Option<String>, _>(index) {
                Ok(v) => v.map(Value::String),
                Err(_) => {
                    return Err(BridgeError::Backend(format!(
                        "column \"{}\" has unsupported type {}; cast it to text in the query",
                        column.name(),
                        other
                    )));
                }
            },
        };

        object.insert(column.name().to_string(), value.unwrap_or(Value::Null));
    }

    Ok(Value::Object(object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use taskbridge_common::FixtureData;

    fn config(env: &str, vars: &[(&str, &str)]) -> RuntimeConfig {
        let vars: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RuntimeConfig::assemble(env, vars, FixtureData::new(json!({})))
    }

    #[test]
    fn test_relaxed_tls_outside_production() {
        let settings =
            PostgresSettings::from_config(&config("qa", &[("POSTGRES_HOST", "pg.qa")])).unwrap();
        assert!(settings.relaxed_tls);
        assert!(matches!(settings.ssl_mode(), PgSslMode::Require));
        assert_eq!(settings.port, DEFAULT_POSTGRES_PORT);
    }

    #[test]
    fn test_production_always_verifies() {
        let settings = PostgresSettings::from_config(&config(
            "prod",
            &[("POSTGRES_HOST", "pg.prod"), (ACCEPT_INVALID_CERTS_VAR, "true")],
        ))
        .unwrap();
        assert!(!settings.relaxed_tls);
        assert!(matches!(settings.ssl_mode(), PgSslMode::VerifyFull));
    }

    #[test]
    fn test_opt_out_of_relaxed_tls() {
        let settings = PostgresSettings::from_config(&config(
            "stage",
            &[("POSTGRES_HOST", "pg.stage"), (ACCEPT_INVALID_CERTS_VAR, "FALSE")],
        ))
        .unwrap();
        assert!(!settings.relaxed_tls);
    }

    #[test]
    fn test_custom_port() {
        let settings = PostgresSettings::from_config(&config(
            "qa",
            &[("POSTGRES_HOST", "pg.qa"), ("POSTGRES_PORT", "6543")],
        ))
        .unwrap();
        assert_eq!(settings.port, 6543);
    }
}
