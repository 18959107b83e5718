//! Configuration file parsing for the sweep service.
//!
//! Loads settings from TOML files including bind address, trigger route,
//! shared secret, janitor settings and store instances. A handful of
//! environment variables override the file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sweepline_janitor::{JanitorConfig, JanitorError};
use sweepline_store::Credentials;
use thiserror::Error;

/// Label given to the store built from `FIREBASE_DB_URL`
pub const DEFAULT_INSTANCE_LABEL: &str = "default";

/// Service-account key file used when no other path is configured
pub const DEFAULT_CREDENTIALS_FILE: &str = "/etc/secrets/firebase-key.json";

const ROUTE_METACHARACTERS: [char; 4] = [':', '*', '{', '}'];

/// Service configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// Field present but unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Janitor settings rejected
    #[error(transparent)]
    Janitor(#[from] JanitorError),
}

/// Service configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Bind port (default: 3000)
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    /// Route that triggers a sweep (default: "/cleanup")
    #[serde(default = "default_trigger_path")]
    pub trigger_path: String,

    /// When set, the trigger route becomes `/cron/{cron_path}`
    #[serde(default)]
    pub cron_path: Option<String>,

    /// Shared secret required on trigger requests
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Abandon a triggered sweep after this many seconds
    #[serde(default)]
    pub sweep_timeout_secs: Option<u64>,

    /// Service account shared by instances without their own credentials
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Roots, retention and schedule
    #[serde(default)]
    pub janitor: JanitorConfig,

    /// Store instances to sweep
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

/// Store instance configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    /// Instance label (e.g., "firebase1")
    pub label: String,

    /// Database URL (e.g., "https://demo.firebasedatabase.app")
    pub database_url: String,

    /// Legacy database secret; takes precedence over any service account
    #[serde(default)]
    pub database_secret: Option<String>,

    /// Service-account key file for this instance only
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,

    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

/// Shared service-account credentials
///
/// The key file wins when it exists; the inline JSON is the fallback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsConfig {
    /// Service-account key file (default: [`DEFAULT_CREDENTIALS_FILE`])
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Service-account key as inline JSON
    #[serde(default)]
    pub service_account_json: Option<String>,
}

impl InstanceConfig {
    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_bind_port() -> u16 {
    3000
}

fn default_trigger_path() -> String {
    "/cleanup".to_string()
}

fn default_store_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    /// Reference deployment roots; instances still have to come from the environment
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
            trigger_path: default_trigger_path(),
            cron_path: None,
            auth_token: None,
            sweep_timeout_secs: None,
            credentials: CredentialsConfig::default(),
            janitor: JanitorConfig::reference_deployment(),
            instances: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from `path` (or defaults) and apply environment overrides
    ///
    /// The result is not validated yet, so that command-line flags can still
    /// be applied.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides read through `lookup`
    ///
    /// | Variable | Setting |
    /// |----------|---------|
    /// | `RETENTION_HOURS` | `janitor.retention_hours` |
    /// | `REFERENCE_TZ` | `janitor.timezone` |
    /// | `CRON_PATH` | `cron_path` |
    /// | `SWEEP_AUTH_TOKEN` | `auth_token` |
    /// | `PORT` | `bind_port` |
    /// | `FIREBASE_CRED_FILE`, else `GOOGLE_APPLICATION_CREDENTIALS` | `credentials.file` |
    /// | `FIREBASE_SERVICE_ACCOUNT_JSON` | `credentials.service_account_json` |
    /// | `FIREBASE_DB_URL`, `FIREBASE_DB_SECRET` | single `default` instance, when no instances are configured |
    ///
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(value) = var("RETENTION_HOURS") {
            self.janitor.retention_hours = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("RETENTION_HOURS is not a number: {}", value)))?;
        }

        if let Some(value) = var("REFERENCE_TZ") {
            self.janitor.timezone = value.trim().to_string();
        }

        if let Some(value) = var("CRON_PATH") {
            self.cron_path = Some(value);
        }

        if let Some(value) = var("SWEEP_AUTH_TOKEN") {
            self.auth_token = Some(value);
        }

        if let Some(value) = var("PORT") {
            self.bind_port = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT is not a port number: {}", value)))?;
        }

        if let Some(path) = var("FIREBASE_CRED_FILE").or_else(|| var("GOOGLE_APPLICATION_CREDENTIALS")) {
            self.credentials.file = Some(PathBuf::from(path));
        }

        if let Some(json) = var("FIREBASE_SERVICE_ACCOUNT_JSON") {
            self.credentials.service_account_json = Some(json);
        }

        if self.instances.is_empty() {
            if let Some(url) = var("FIREBASE_DB_URL") {
                self.instances.push(InstanceConfig {
                    label: DEFAULT_INSTANCE_LABEL.to_string(),
                    database_url: url,
                    database_secret: var("FIREBASE_DB_SECRET"),
                    credentials_file: None,
                    timeout_secs: default_store_timeout(),
                });
            }
        }

        Ok(())
    }

    /// Check the configuration before the service starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.janitor.validate()?;

        if self.instances.is_empty() {
            return Err(ConfigError::MissingField(
                "instances (or FIREBASE_DB_URL)".to_string(),
            ));
        }

        let mut labels = std::collections::HashSet::new();
        for instance in &self.instances {
            if instance.label.is_empty() {
                return Err(ConfigError::MissingField("instances.label".to_string()));
            }
            if instance.database_url.is_empty() {
                return Err(ConfigError::MissingField(format!(
                    "instances.database_url for '{}'",
                    instance.label
                )));
            }
            if instance.timeout_secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "timeout_secs for '{}' must be greater than zero",
                    instance.label
                )));
            }
            if !labels.insert(instance.label.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "instance '{}' configured twice",
                    instance.label
                )));
            }
        }

        let route = self.trigger_route();
        if !route.starts_with('/') || route == "/" || route == "/healthz" || route.contains("//") {
            return Err(ConfigError::Invalid(format!("unusable trigger route '{}'", route)));
        }
        // The router would read these as captures or wildcards
        if route.contains(ROUTE_METACHARACTERS) {
            return Err(ConfigError::Invalid(format!(
                "trigger route '{}' must not contain any of {:?}",
                route, ROUTE_METACHARACTERS
            )));
        }

        if self.auth_token.as_deref() == Some("") {
            return Err(ConfigError::Invalid("auth_token must not be empty".to_string()));
        }

        if self.sweep_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "sweep_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Credentials for `instance`
    ///
    /// In order: the instance's database secret, the instance's key file,
    /// the shared key file (or [`DEFAULT_CREDENTIALS_FILE`]) when it exists,
    /// then the shared inline JSON. Finding none is an error, so a service
    /// without credentials never starts.
    pub fn instance_credentials(&self, instance: &InstanceConfig) -> Result<Credentials, ConfigError> {
        self.resolve_credentials(instance, |path| path.is_file())
    }

    fn resolve_credentials<F>(&self, instance: &InstanceConfig, exists: F) -> Result<Credentials, ConfigError>
    where
        F: Fn(&Path) -> bool,
    {
        if let Some(secret) = instance.database_secret.as_deref().filter(|s| !s.is_empty()) {
            return Ok(Credentials::DatabaseSecret(secret.to_string()));
        }

        if let Some(path) = &instance.credentials_file {
            if !exists(path) {
                return Err(ConfigError::Invalid(format!(
                    "credentials_file for '{}' not found: {}",
                    instance.label,
                    path.display()
                )));
            }
            return Ok(Credentials::ServiceAccountFile(path.clone()));
        }

        let shared_file = self
            .credentials
            .file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_FILE));
        if exists(&shared_file) {
            return Ok(Credentials::ServiceAccountFile(shared_file));
        }

        if let Some(json) = &self.credentials.service_account_json {
            if !serde_json::from_str::<serde_json::Value>(json).is_ok_and(|v| v.is_object()) {
                return Err(ConfigError::Invalid(
                    "FIREBASE_SERVICE_ACCOUNT_JSON is not a JSON object".to_string(),
                ));
            }
            return Ok(Credentials::ServiceAccountJson(json.clone()));
        }

        Err(ConfigError::MissingField(format!(
            "credentials for '{}': set FIREBASE_CRED_FILE (or GOOGLE_APPLICATION_CREDENTIALS) \
             to a service-account key file, FIREBASE_SERVICE_ACCOUNT_JSON, or a database_secret",
            instance.label
        )))
    }

    /// Route the trigger is served on
    pub fn trigger_route(&self) -> String {
        match &self.cron_path {
            Some(cron) => format!("/cron/{}", cron.trim_matches('/')),
            None => self.trigger_path.clone(),
        }
    }

    /// Bound on a triggered sweep, if any
    pub fn sweep_timeout(&self) -> Option<Duration> {
        self.sweep_timeout_secs.map(Duration::from_secs)
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}
