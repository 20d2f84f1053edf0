//! Layered configuration.
//!
//! Each layer overrides the one before it: built-in defaults, an optional
//! TOML file, `<PREFIX>_*` environment variables, then [`Overrides`] from the
//! command line. The JWT secret is only accepted from the last two layers.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Configuration shared with every request context.
pub type SharedConfig = Arc<Config>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: Server,
    pub limits: Limits,
    pub database: Database,
    pub auth: Auth,
    pub docs: Docs,
}

/// Listening address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Per-connection and per-request limits enforced by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Largest accepted request body; larger ones get 413.
    pub max_body_bytes: usize,
    /// Concurrent connections served before new ones get 503.
    pub max_connections: usize,
    /// Time allowed for a client to finish sending request headers.
    pub header_timeout_ms: u64,
}

impl Limits {
    pub fn header_timeout(&self) -> Duration {
        Duration::from_millis(self.header_timeout_ms)
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_body_bytes: 1_048_576,
            max_connections: 128,
            header_timeout_ms: 2_000,
        }
    }
}

/// House-rules database location: a file path, `:memory:` or `libsql://...`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    pub url: String,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: "house_rules.db".to_string(),
        }
    }
}

/// Bearer-token settings used by the access-control step.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Auth {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub token_expiry_days: u32,
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_expiry_days: 30,
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secret = if self.jwt_secret.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("Auth")
            .field("jwt_secret", &secret)
            .field("token_expiry_days", &self.token_expiry_days)
            .finish()
    }
}

/// Where the generated OpenAPI document is served.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Docs {
    pub path: String,
}

impl Default for Docs {
    fn default() -> Self {
        Self {
            path: "/openapi.json".to_string(),
        }
    }
}

impl Config {
    /// Check the settings the server cannot start without.
    ///
    /// # Errors
    /// Returns [`Error::Config`] naming the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(Error::Config("a JWT secret must be provided".into()));
        }
        if !self.docs.path.starts_with('/') {
            return Err(Error::Config(format!(
                "docs.path must start with '/': {:?}",
                self.docs.path
            )));
        }
        if self.limits.max_connections == 0 {
            return Err(Error::Config("limits.max_connections must be positive".into()));
        }
        Ok(())
    }
}

/// Values taken from the command line; `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub docs_path: Option<String>,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = self.database_url {
            config.database.url = url;
        }
        if let Some(secret) = self.jwt_secret {
            config.auth.jwt_secret = secret;
        }
        if let Some(path) = self.docs_path {
            config.docs.path = path;
        }
    }
}

/// Loads a [`Config`] from its layers.
#[derive(Debug, Clone)]
pub struct Loader {
    prefix: String,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new("TAXIWAY")
    }
}

impl Loader {
    /// A loader reading `<prefix>_HOST`, `<prefix>_JWT_SECRET` and so on.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load and validate the configuration.
    ///
    /// # Errors
    /// Returns [`Error::Config`] when the file cannot be read or parsed, an
    /// environment variable does not parse, or the result fails
    /// [`Config::validate`].
    pub fn load(&self, file: Option<&Path>, overrides: Overrides) -> Result<Config> {
        let mut config = match file {
            Some(path) => read(path)?,
            None => Config::default(),
        };
        self.apply_env(&mut config)?;
        overrides.apply(&mut config);

        if config.auth.jwt_secret.is_empty() {
            return Err(Error::Config(format!(
                "{}_JWT_SECRET must be set via environment variable or --jwt-secret",
                self.prefix
            )));
        }
        config.validate()?;
        debug!(?config, "Configuration loaded");
        Ok(config)
    }

    fn var(&self, name: &str) -> Option<String> {
        std::env::var(format!("{}_{name}", self.prefix)).ok()
    }

    fn parsed<T: FromStr>(&self, name: &str) -> Result<Option<T>> {
        self.var(name)
            .map(|raw| {
                raw.parse().map_err(|_| {
                    Error::Config(format!("{}_{name} has an invalid value: {raw:?}", self.prefix))
                })
            })
            .transpose()
    }

    fn apply_env(&self, config: &mut Config) -> Result<()> {
        if let Some(host) = self.var("HOST") {
            config.server.host = host;
        }
        if let Some(port) = self.parsed("PORT")? {
            config.server.port = port;
        }
        if let Some(bytes) = self.parsed("MAX_BODY_BYTES")? {
            config.limits.max_body_bytes = bytes;
        }
        if let Some(connections) = self.parsed("MAX_CONNECTIONS")? {
            config.limits.max_connections = connections;
        }
        if let Some(url) = self.var("DATABASE_URL").or_else(|| std::env::var("DATABASE_URL").ok()) {
            config.database.url = url;
        }
        if let Some(secret) = self.var("JWT_SECRET") {
            config.auth.jwt_secret = secret;
        }
        if let Some(path) = self.var("DOCS_PATH") {
            config.docs.path = path;
        }
        Ok(())
    }
}

fn read(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
    let mut config: Config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))?;

    if !config.auth.jwt_secret.is_empty() {
        warn!(path = %path.display(), "Ignoring jwt_secret found in config file");
        config.auth.jwt_secret.clear();
    }
    Ok(config)
}
