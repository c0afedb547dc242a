//! Taskbridge Common Library
//!
//! Shared types for the task bridge: the error taxonomy, the environment
//! resolver that builds the run's [`RuntimeConfig`], and the request shapes
//! that cross the task boundary.

pub mod env;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use env::{
    canonical_environment, EnvironmentResolver, FixtureData, FlagValue, LoginCredentials,
    ResolverLayout, RuntimeConfig,
};
pub use error::{BridgeError, BridgeResult, ErrorBody};
pub use types::{
    DocumentOperation, DocumentRequest, SqlRequest, WireDocumentRequest, MONGO_TASK, MYSQL_TASK,
    POSTGRES_TASK,
};

/// Taskbridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
