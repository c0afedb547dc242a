//! One-shot task invocation
//!
//! Dispatches in-process by default, or through a running boundary server
//! with `--remote`.

use anyhow::Context;
use clap::Args;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use taskbridge_tasks::{default_dispatcher, TaskInvoker};
use taskbridge_web::BoundaryClient;

use crate::output::{print_value, OutputFormat};

use super::load_config;

#[derive(Args, Debug)]
pub struct TaskArgs {
    /// Task name (queryMySQL, queryPostgres, queryMongo)
    pub name: String,

    /// JSON request payload
    pub payload: String,

    /// Environment to resolve credentials for
    #[arg(long = "env", env = "TASKBRIDGE_ENV")]
    pub environment: Option<String>,

    /// Boundary server URL; dispatch locally when absent
    #[arg(long, env = "TASKBRIDGE_REMOTE")]
    pub remote: Option<String>,
}

/// Parse the payload argument as JSON
pub fn parse_payload(raw: &str) -> anyhow::Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("payload is not valid JSON: {}", raw))
}

pub async fn execute(args: TaskArgs, root: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let payload = parse_payload(&args.payload)?;

    let invoker: Box<dyn TaskInvoker> = match &args.remote {
        Some(url) => {
            debug!("Invoking {} via {}", args.name, url);
            Box::new(BoundaryClient::new(url.as_str())?)
        }
        None => {
            let config = load_config(root, args.environment.as_deref())?;
            Box::new(default_dispatcher(config))
        }
    };

    let result = invoker.invoke(&args.name, payload).await?;
    print_value(&result, format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_query_payload() {
        assert_eq!(parse_payload(r#""SELECT 1""#).unwrap(), json!("SELECT 1"));
    }

    #[test]
    fn test_invalid_payload() {
        let err = parse_payload("SELECT 1").unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }
}
