//! Serve the task boundary over HTTP

use clap::Args;
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

use taskbridge_tasks::default_dispatcher;
use taskbridge_web::BoundaryServer;

use super::load_config;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Environment to resolve credentials and fixtures for
    #[arg(long = "env", env = "TASKBRIDGE_ENV")]
    pub environment: Option<String>,

    /// Bind address
    #[arg(long, env = "TASKBRIDGE_ADDR", default_value = "127.0.0.1:7878")]
    pub addr: SocketAddr,
}

pub async fn execute(args: ServeArgs, root: &Path) -> anyhow::Result<()> {
    let config = load_config(root, args.environment.as_deref())?;
    info!("Resolved environment {}", config.environment());

    let dispatcher = default_dispatcher(config.clone());
    BoundaryServer::new(dispatcher, config).serve(args.addr).await
}
