//! Configuration management
//!
//! This module handles loading and parsing configuration for the devcamp API.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Session and reset token lifetimes
    #[serde(default)]
    pub auth: AuthConfig,
    /// List endpoint paging limits
    #[serde(default)]
    pub pagination: PaginationConfig,
    /// Upload configuration
    #[serde(default)]
    pub upload: UploadConfig,
    /// Outgoing mail
    #[serde(default)]
    pub mail: MailConfig,
    /// Address lookup
    #[serde(default)]
    pub geocoder: GeocoderConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Externally visible base URL, used in password reset links
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            public_url: default_public_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_public_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path or URL (`:memory:` for an in-memory store)
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum pooled connections for file-backed databases
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "data/devcamp.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session lifetime in days
    #[serde(default = "default_session_expiration_days")]
    pub session_expiration_days: i64,
    /// Password reset token lifetime in minutes
    #[serde(default = "default_reset_token_minutes")]
    pub reset_token_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_expiration_days: default_session_expiration_days(),
            reset_token_minutes: default_reset_token_minutes(),
        }
    }
}

fn default_session_expiration_days() -> i64 {
    30
}

fn default_reset_token_minutes() -> i64 {
    10
}

/// Paging limits for list endpoints
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page size when `limit` is absent or invalid
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    /// Largest accepted `limit`
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_limit() -> u32 {
    25
}

fn default_max_limit() -> u32 {
    100
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Upload directory path
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Maximum file size in bytes (default: 1MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("public/uploads")
}

fn default_max_file_size() -> u64 {
    1_000_000
}

impl UploadConfig {
    /// Photos must be images of any subtype
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        mime_type.starts_with("image/")
    }
}

/// SMTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// SMTP relay host; empty disables sending
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_email: default_from_email(),
            from_name: default_from_name(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_email() -> String {
    "noreply@devcamp.local".to_string()
}

fn default_from_name() -> String {
    "DevCamp".to_string()
}

/// Geocoder backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeocoderProvider {
    /// OpenStreetMap Nominatim compatible HTTP API (default)
    #[default]
    Nominatim,
    /// Fixed table of places from configuration
    Static,
}

/// A configured place for the static geocoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticPlace {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub formatted_address: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zipcode: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Geocoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default)]
    pub provider: GeocoderProvider,
    /// Base URL of the Nominatim API
    #[serde(default = "default_geocoder_url")]
    pub base_url: String,
    /// User-Agent sent to the provider (Nominatim requires one)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Places known to the static provider, keyed by address or zipcode
    #[serde(default)]
    pub places: HashMap<String, StaticPlace>,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            provider: GeocoderProvider::default(),
            base_url: default_geocoder_url(),
            user_agent: default_user_agent(),
            places: HashMap::new(),
        }
    }
}

fn default_geocoder_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    format!("devcamp/{}", env!("CARGO_PKG_VERSION"))
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - DEVCAMP_SERVER_HOST
    /// - DEVCAMP_SERVER_PORT
    /// - DEVCAMP_SERVER_CORS_ORIGIN
    /// - DEVCAMP_SERVER_PUBLIC_URL
    /// - DEVCAMP_DATABASE_URL
    /// - DEVCAMP_UPLOAD_PATH
    /// - DEVCAMP_SMTP_HOST
    /// - DEVCAMP_SMTP_PORT
    /// - DEVCAMP_SMTP_USERNAME
    /// - DEVCAMP_SMTP_PASSWORD
    /// - DEVCAMP_GEOCODER_PROVIDER
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pagination.default_limit == 0 || self.pagination.max_limit == 0 {
            return Err(ConfigError::ValidationError(
                "pagination limits must be positive".to_string(),
            ));
        }
        if self.pagination.default_limit > self.pagination.max_limit {
            return Err(ConfigError::ValidationError(format!(
                "pagination.default_limit ({}) exceeds pagination.max_limit ({})",
                self.pagination.default_limit, self.pagination.max_limit
            )));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("DEVCAMP_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("DEVCAMP_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("DEVCAMP_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }
        if let Ok(public_url) = std::env::var("DEVCAMP_SERVER_PUBLIC_URL") {
            self.server.public_url = public_url;
        }

        if let Ok(url) = std::env::var("DEVCAMP_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(path) = std::env::var("DEVCAMP_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }

        if let Ok(host) = std::env::var("DEVCAMP_SMTP_HOST") {
            self.mail.smtp_host = host;
        }
        if let Ok(port) = std::env::var("DEVCAMP_SMTP_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.mail.smtp_port = port;
            }
        }
        if let Ok(username) = std::env::var("DEVCAMP_SMTP_USERNAME") {
            self.mail.smtp_username = username;
        }
        if let Ok(password) = std::env::var("DEVCAMP_SMTP_PASSWORD") {
            self.mail.smtp_password = password;
        }

        if let Ok(provider) = std::env::var("DEVCAMP_GEOCODER_PROVIDER") {
            match provider.to_lowercase().as_str() {
                "nominatim" => self.geocoder.provider = GeocoderProvider::Nominatim,
                "static" => self.geocoder.provider = GeocoderProvider::Static,
                _ => {} // Ignore invalid values
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches DEVCAMP_* variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
