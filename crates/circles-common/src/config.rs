//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config.toml > defaults
//!
//! The loaded [`AppConfig`] is returned by value and handed to whatever needs it;
//! there is no process-wide config slot.

use serde::Deserialize;

/// Load the application configuration.
///
/// `file` overrides the default `config` file stem (e.g. `/etc/circles/config.toml`).
pub fn load(file: Option<&str>) -> Result<AppConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let cfg = config::Config::builder()
        // Defaults
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("server.local_address", "localhost:8080")?
        .set_default("server.json_logs", false)?
        .set_default("database.url", "sqlite://circles.db?mode=rwc")?
        .set_default("database.max_connections", 20)?
        .set_default("database.min_connections", 1)?
        .set_default("auth.access_token_ttl_secs", 900)? // 15 min
        .set_default("federation.connect_timeout_secs", 10)?
        .set_default("federation.request_timeout_secs", 10)?
        .set_default("federation.local_timeout_secs", 10)?
        .set_default("federation.max_concurrent_deliveries", 8)?
        .set_default("federation.allow_plain_http", false)?
        .set_default("notifications.admin_recipient", "admin")?
        // Optional config file
        .add_source(config::File::with_name(file.unwrap_or("config")).required(file.is_some()))
        // Environment variables (CIRCLES__SERVER__PORT, CIRCLES__DATABASE__URL, etc.)
        .add_source(
            config::Environment::with_prefix("CIRCLES")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    cfg.try_deserialize()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub federation: FederationConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Address remote nodes use to reach this node (e.g. "cloud.example.com").
    /// Also the target of the local delivery call and the value stamped as a
    /// frame's cloud id once it has been fanned out.
    pub local_address: String,
    /// Emit logs as JSON lines instead of the human-readable format.
    pub json_logs: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Postgres or SQLite connection URL
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT signing secret (HS256), should be 256+ bits of entropy
    pub jwt_secret: String,
    /// Access token TTL in seconds
    pub access_token_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FederationConfig {
    pub connect_timeout_secs: u64,
    /// Overall timeout for one payload delivery to a linked node.
    pub request_timeout_secs: u64,
    /// Timeout for the same-node local delivery call.
    pub local_timeout_secs: u64,
    /// Upper bound on concurrent per-link deliveries within one forward.
    pub max_concurrent_deliveries: usize,
    /// Use `http://` for link addresses that carry no scheme.
    pub allow_plain_http: bool,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 10,
            local_timeout_secs: 10,
            max_concurrent_deliveries: 8,
            allow_plain_http: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Recipient that is notified of every share, whatever the circle.
    pub admin_recipient: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { admin_recipient: "admin".into() }
    }
}
