//! Print the resolved configuration with secrets redacted

use clap::Args;
use std::path::Path;

use crate::output::{print_value, OutputFormat};

use super::load_config;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Environment name (default QA)
    pub environment: Option<String>,
}

pub async fn execute(args: ResolveArgs, root: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(root, args.environment.as_deref())?;
    print_value(&config.summary(), format);
    Ok(())
}
