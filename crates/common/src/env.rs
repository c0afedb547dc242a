//! Environment resolution
//!
//! Builds the [`RuntimeConfig`] for a run from three sources:
//! - a snapshot of the process environment
//! - an optional `<ENV>.env` variable file (process values win on conflict)
//! - a mandatory `<ENV>/test-data.json` fixture file
//!
//! The process environment is only ever read. The resulting configuration is
//! immutable and is handed to every component that needs credentials.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{BridgeError, BridgeResult};

/// Environment used when none is requested
pub const DEFAULT_ENVIRONMENT: &str = "QA";

/// Execution context used when `AMB` is unset
pub const DEFAULT_AMB: &str = "LOCAL";

/// Fixture file name inside each environment directory
pub const FIXTURE_FILE_NAME: &str = "test-data.json";

/// JSON pointer to the expected post-login page title
pub const EXPECTED_TITLE_POINTER: &str = "/pagina/tituloEsperado";

/// Environment names that never get relaxed TLS
pub const PRODUCTION_ENVIRONMENTS: &[&str] = &["PROD", "PRODUCTION", "PRD"];

/// Canonical (uppercase) environment name, falling back to [`DEFAULT_ENVIRONMENT`]
pub fn canonical_environment(requested: Option<&str>) -> String {
    match requested.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_uppercase(),
        _ => DEFAULT_ENVIRONMENT.to_string(),
    }
}

/// Where variable and fixture files live
#[derive(Debug, Clone)]
pub struct ResolverLayout {
    /// Project root the other directories are relative to
    pub root: PathBuf,

    /// Directory holding `<ENV>.env` files
    pub env_dir: PathBuf,

    /// Directory holding `<ENV>/test-data.json` files
    pub fixtures_dir: PathBuf,
}

impl Default for ResolverLayout {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            env_dir: PathBuf::from("cypress/config"),
            fixtures_dir: PathBuf::from("cypress/fixtures"),
        }
    }
}

impl ResolverLayout {
    /// Conventional layout under a given project root
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Path of the variable file for a canonical environment name
    pub fn env_file(&self, environment: &str) -> PathBuf {
        self.root
            .join(&self.env_dir)
            .join(format!("{}.env", environment))
    }

    /// Path of the fixture file for a canonical environment name
    pub fn fixture_file(&self, environment: &str) -> PathBuf {
        self.root
            .join(&self.fixtures_dir)
            .join(environment)
            .join(FIXTURE_FILE_NAME)
    }
}

/// Resolves a requested environment into a [`RuntimeConfig`]
#[derive(Debug, Clone)]
pub struct EnvironmentResolver {
    layout: ResolverLayout,
    process_vars: BTreeMap<String, String>,
}

impl EnvironmentResolver {
    /// Resolver over a snapshot of the current process environment
    pub fn new(layout: ResolverLayout) -> Self {
        let process_vars: Vec<(String, String)> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self::with_process_vars(layout, process_vars)
    }

    /// Resolver over an explicit variable set instead of the process environment
    pub fn with_process_vars(
        layout: ResolverLayout,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            layout,
            process_vars: vars.into_iter().collect(),
        }
    }

    pub fn layout(&self) -> &ResolverLayout {
        &self.layout
    }

    /// Build the runtime configuration for `requested`
    ///
    /// A missing variable file only warns; a missing fixture file is fatal.
    /// Unknown environment names are not rejected up front, the fixture
    /// lookup is what gates them.
    pub fn resolve(&self, requested: Option<&str>) -> BridgeResult<RuntimeConfig> {
        let environment = canonical_environment(requested);
        let env_path = self.layout.env_file(&environment);
        let fixture_path = self.layout.fixture_file(&environment);

        let mut vars = self.process_vars.clone();
        if env_path.exists() {
            let loaded = load_env_file(&env_path, &mut vars)?;
            debug!("Loaded {} variable(s) from {}", loaded, env_path.display());
        } else {
            warn!("Environment file not found: {}", env_path.display());
        }

        let fixtures = FixtureData::load(&fixture_path)?;

        info!("Resolved environment {}", environment);
        Ok(RuntimeConfig::assemble(environment, vars, fixtures))
    }
}

/// Overlay `KEY=value` pairs onto `vars` without replacing existing keys.
/// Lines that do not parse are skipped with a warning. Returns how many keys
/// were added.
fn load_env_file(path: &Path, vars: &mut BTreeMap<String, String>) -> BridgeResult<usize> {
    let mut added = 0;
    for item in dotenvy::from_path_iter(path)? {
        let (key, value) = match item {
            Ok(pair) => pair,
            Err(dotenvy::Error::LineParse(line, index)) => {
                warn!(
                    "Skipping unparsable line in {}: {:?} (at {})",
                    path.display(),
                    line,
                    index
                );
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if !vars.contains_key(&key) {
            vars.insert(key, value);
            added += 1;
        }
    }
    Ok(added)
}

/// Environment-scoped test data
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FixtureData(Value);

impl FixtureData {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Load fixture data, failing if the file is absent or not valid JSON
    pub fn load(path: &Path) -> BridgeResult<Self> {
        if !path.exists() {
            return Err(BridgeError::Configuration(format!(
                "fixture data not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let value = serde_json::from_str(&content).map_err(|e| {
            BridgeError::Configuration(format!("invalid fixture data in {}: {}", path.display(), e))
        })?;
        Ok(Self(value))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Look up a value by JSON pointer (`/a/b`)
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        self.0.pointer(pointer)
    }

    /// Expected page title after a successful login
    pub fn expected_title(&self) -> BridgeResult<&str> {
        self.pointer(EXPECTED_TITLE_POINTER)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                BridgeError::Configuration(format!(
                    "fixture data has no string at {}",
                    EXPECTED_TITLE_POINTER
                ))
            })
    }
}

/// Feature flag value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Text(String),
}

impl FlagValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(b) => Some(*b),
            FlagValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlagValue::Text(s) => Some(s),
            FlagValue::Bool(_) => None,
        }
    }
}

/// Web login credentials
#[derive(Clone, Default, PartialEq, Eq)]
pub struct LoginCredentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Immutable configuration for one run
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    environment: String,
    base_url: Option<String>,
    credentials: LoginCredentials,
    flags: BTreeMap<String, FlagValue>,
    vars: BTreeMap<String, String>,
    fixtures: FixtureData,
}

impl RuntimeConfig {
    /// Assemble a configuration from a flat variable namespace and fixtures,
    /// normalizing the well-known keys.
    pub fn assemble(
        environment: impl AsRef<str>,
        vars: BTreeMap<String, String>,
        fixtures: FixtureData,
    ) -> Self {
        let is_true = |key: &str| vars.get(key).map(|v| v == "true").unwrap_or(false);
        // Empty values count as unset here; `var()` still returns them raw
        let non_empty = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();

        let mut flags = BTreeMap::new();
        flags.insert("allure".to_string(), FlagValue::Bool(is_true("ALLURE")));
        flags.insert("video".to_string(), FlagValue::Bool(is_true("VIDEO")));
        flags.insert(
            "amb".to_string(),
            FlagValue::Text(non_empty("AMB").unwrap_or_else(|| DEFAULT_AMB.to_string())),
        );

        Self {
            environment: canonical_environment(Some(environment.as_ref())),
            base_url: non_empty("BASE_URL"),
            credentials: LoginCredentials {
                username: non_empty("USERNAME_WEB"),
                password: non_empty("PASSWORD_WEB"),
            },
            flags,
            vars,
            fixtures,
        }
    }

    /// Canonical environment name (e.g. `DEV`)
    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn credentials(&self) -> &LoginCredentials {
        &self.credentials
    }

    pub fn flags(&self) -> &BTreeMap<String, FlagValue> {
        &self.flags
    }

    /// Whether a boolean flag is set
    pub fn flag_enabled(&self, name: &str) -> bool {
        self.flags
            .get(name)
            .and_then(FlagValue::as_bool)
            .unwrap_or(false)
    }

    /// Execution context (`AMB`), defaulting to `LOCAL`
    pub fn amb(&self) -> &str {
        self.flags
            .get("amb")
            .and_then(FlagValue::as_str)
            .unwrap_or(DEFAULT_AMB)
    }

    /// Raw variable lookup
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Variable lookup treating empty values as unset
    pub fn non_empty_var(&self, key: &str) -> Option<&str> {
        self.var(key).filter(|v| !v.is_empty())
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    pub fn fixtures(&self) -> &FixtureData {
        &self.fixtures
    }

    /// Whether this run targets a production environment
    pub fn is_production(&self) -> bool {
        PRODUCTION_ENVIRONMENTS.contains(&self.environment.as_str())
    }

    /// Redacted view for operators; never includes passwords or raw variables
    pub fn summary(&self) -> Value {
        json!({
            "environment": self.environment,
            "baseUrl": self.base_url,
            "username": self.credentials.username,
            "password": self.credentials.password.as_ref().map(|_| "***"),
            "flags": self.flags,
            "variables": self.vars.len(),
            "fixtures": self.fixtures,
        })
    }
}
