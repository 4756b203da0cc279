use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store: StoreSettings,
    /// `username:password` for Basic auth on `/metrics`; the endpoint is
    /// disabled when unset.
    pub metrics_auth: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("Invalid store backend: {}", other)),
        }
    }
}

#[derive(Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub uri: String,
    pub database: String,
    /// Base64-encoded JSON `{"username", "password", "source"}`.
    pub credentials_base64: Option<String>,
    pub operation_timeout: Duration,
}

impl std::fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSettings")
            .field("backend", &self.backend)
            .field("uri", &self.uri)
            .field("database", &self.database)
            .field(
                "credentials_base64",
                &self.credentials_base64.as_ref().map(|_| "<redacted>"),
            )
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Mongo,
            uri: "mongodb://localhost:27017".to_string(),
            database: "quiz".to_string(),
            credentials_base64: None,
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml first, then APP_* environment overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Self::from_settings(&settings)
    }

    /// Resolves every value from `settings`, then the plain environment, then
    /// defaults.
    pub fn from_settings(settings: &config::Config) -> Result<Self, config::ConfigError> {
        let defaults = StoreSettings::default();

        let port = lookup(settings, "server.port", "PORT")
            .map(|value| parse_value::<u16>("server.port", &value))
            .transpose()?
            .unwrap_or(DEFAULT_PORT);

        let backend = lookup(settings, "store.backend", "STORE_BACKEND")
            .map(|value| value.parse::<StoreBackend>().map_err(config::ConfigError::Message))
            .transpose()?
            .unwrap_or(defaults.backend);

        let uri = lookup(settings, "store.uri", "STORE_URI").unwrap_or(defaults.uri);

        let database =
            lookup(settings, "store.database", "STORE_DATABASE").unwrap_or(defaults.database);

        let credentials_base64 = lookup(
            settings,
            "store.credentials_base64",
            "STORE_CREDENTIALS_BASE64",
        )
        .filter(|value| !value.trim().is_empty());

        let operation_timeout = lookup(
            settings,
            "store.operation_timeout_ms",
            "STORE_OPERATION_TIMEOUT_MS",
        )
        .map(|value| parse_value::<u64>("store.operation_timeout_ms", &value))
        .transpose()?
        .map(Duration::from_millis)
        .unwrap_or(defaults.operation_timeout);

        let metrics_auth =
            lookup(settings, "metrics.auth", "METRICS_AUTH").filter(|value| !value.is_empty());

        Ok(Config {
            port,
            store: StoreSettings {
                backend,
                uri,
                database,
                credentials_base64,
                operation_timeout,
            },
            metrics_auth,
        })
    }
}

fn lookup(settings: &config::Config, key: &str, env_key: &str) -> Option<String> {
    settings
        .get_string(key)
        .or_else(|_| env::var(env_key))
        .ok()
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, config::ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| config::ConfigError::Message(format!("Invalid value for {}: {}", key, value)))
}
