//! Helpers shared by the relational adapters

use base64::Engine;
use serde_json::Value;

use taskbridge_common::{BridgeError, BridgeResult, RuntimeConfig};

/// A JSON parameter narrowed to a bindable scalar
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlParam {
    pub(crate) fn from_json(value: &Value) -> BridgeResult<Self> {
        match value {
            Value::Null => Ok(SqlParam::Null),
            Value::Bool(b) => Ok(SqlParam::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(SqlParam::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(SqlParam::Float(f))
                } else {
                    Err(BridgeError::InvalidRequest(format!("unsupported number parameter: {}", n)))
                }
            }
            Value::String(s) => Ok(SqlParam::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Err(BridgeError::InvalidRequest(
                "query parameters must be scalars".to_string(),
            )),
        }
    }
}

/// Map a driver error raised while executing a statement
pub(crate) fn sql_error(e: sqlx::Error) -> BridgeError {
    match e {
        sqlx::Error::Database(db) => BridgeError::Backend(db.message().to_string()),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => BridgeError::Connection(e.to_string()),
        sqlx::Error::Configuration(_) => BridgeError::Configuration(e.to_string()),
        other => BridgeError::Backend(other.to_string()),
    }
}

/// Map a driver error raised while opening a connection
pub(crate) fn connect_error(e: sqlx::Error) -> BridgeError {
    match e {
        sqlx::Error::Database(db) => BridgeError::Connection(db.message().to_string()),
        other => BridgeError::Connection(other.to_string()),
    }
}

/// Required variable from the runtime configuration
pub(crate) fn required_var(config: &RuntimeConfig, key: &str) -> BridgeResult<String> {
    config
        .non_empty_var(key)
        .map(str::to_string)
        .ok_or_else(|| BridgeError::Configuration(format!("{} is not set", key)))
}

/// Port variable with a backend default
pub(crate) fn port_var(config: &RuntimeConfig, key: &str, default: u16) -> BridgeResult<u16> {
    match config.non_empty_var(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| BridgeError::Configuration(format!("{} is not a valid port: {}", key, raw))),
    }
}

pub(crate) fn encode_bytes(bytes: Vec<u8>) -> Value {
    Value::String(format!(
        "base64:{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use taskbridge_common::FixtureData;
    use test_case::test_case;

    fn config(vars: &[(&str, &str)]) -> RuntimeConfig {
        let vars: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RuntimeConfig::assemble("qa", vars, FixtureData::new(json!({})))
    }

    #[test_case(json!(null), SqlParam::Null ; "null")]
    #[test_case(json!(true), SqlParam::Bool(true) ; "bool")]
    #[test_case(json!(7), SqlParam::Int(7) ; "int")]
    #[test_case(json!(1.5), SqlParam::Float(1.5) ; "float")]
    #[test_case(json!("Ana"), SqlParam::Text("Ana".to_string()) ; "text")]
    fn test_scalar_params(value: Value, expected: SqlParam) {
        assert_eq!(SqlParam::from_json(&value).unwrap(), expected);
    }

    #[test]
    fn test_nested_params_rejected() {
        assert!(SqlParam::from_json(&json!({"a": 1})).is_err());
        assert!(SqlParam::from_json(&json!([1])).is_err());
    }

    #[test]
    fn test_port_defaults_and_validation() {
        assert_eq!(port_var(&config(&[]), "MYSQL_PORT", 3306).unwrap(), 3306);
        assert_eq!(port_var(&config(&[("MYSQL_PORT", "3307")]), "MYSQL_PORT", 3306).unwrap(), 3307);
        assert!(port_var(&config(&[("MYSQL_PORT", "abc")]), "MYSQL_PORT", 3306).is_err());
    }

    #[test]
    fn test_required_var_names_missing_key() {
        let err = required_var(&config(&[]), "MYSQL_HOST").unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: MYSQL_HOST is not set");
    }
}
