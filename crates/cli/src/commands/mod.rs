//! CLI Commands

pub mod resolve;
pub mod run;
pub mod serve;
pub mod task;

use std::path::Path;
use std::sync::Arc;

use taskbridge_common::{EnvironmentResolver, ResolverLayout, RuntimeConfig};

/// Resolve the runtime configuration for `environment` under `root`
pub fn load_config(root: &Path, environment: Option<&str>) -> anyhow::Result<Arc<RuntimeConfig>> {
    let resolver = EnvironmentResolver::new(ResolverLayout::rooted(root));
    Ok(Arc::new(resolver.resolve(environment)?))
}
