//! Server configuration loading from file and environment variables.

use avrd_orchestrator::OrchestratorConfig;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Network settings for the status endpoint.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Docker gateway settings.
    #[serde(default)]
    pub docker: DockerConfig,

    /// Asterisk config-file and ARI settings.
    #[serde(default)]
    pub asterisk: AsteriskConfig,

    /// Orchestrator settings (images, port ranges, webhook, AMI).
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Network configuration for the HTTP status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "avrd_orchestrator=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Docker gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DockerConfig {
    /// Path to the Docker socket.
    #[serde(default = "default_docker_socket")]
    pub socket_path: String,

    /// API timeout in seconds.
    #[serde(default = "default_docker_timeout_secs")]
    pub timeout_secs: u64,

    /// Network agent containers are attached to.
    #[serde(default = "default_network")]
    pub network: String,

    /// Optional tenant label for multi-tenant deployments.
    #[serde(default)]
    pub tenant: Option<String>,
}

impl DockerConfig {
    pub fn runtime_config(&self) -> avrd_runtime::RuntimeConfig {
        avrd_runtime::RuntimeConfig {
            socket_path: self.socket_path.clone(),
            timeout_secs: self.timeout_secs,
            network: self.network.clone(),
            tenant: self.tenant.clone(),
        }
    }
}

/// Asterisk configuration: managed file locations plus the ARI channel.
#[derive(Debug, Clone, Deserialize)]
pub struct AsteriskConfig {
    /// Directory holding `extensions.conf` and `pjsip.conf`.
    #[serde(default = "default_asterisk_dir")]
    pub config_dir: String,

    /// ARI base URL.
    #[serde(default = "default_ari_url")]
    pub ari_url: String,

    /// ARI username.
    #[serde(default = "default_ari_username")]
    pub ari_username: String,

    /// ARI password.
    #[serde(default)]
    pub ari_password: String,

    /// ARI request timeout in seconds.
    #[serde(default = "default_ari_timeout_secs")]
    pub ari_timeout_secs: u64,
}

impl AsteriskConfig {
    pub fn paths(&self) -> avrd_pbx::PbxPaths {
        avrd_pbx::PbxPaths::under(&self.config_dir)
    }

    pub fn ari_config(&self) -> avrd_pbx::AriConfig {
        avrd_pbx::AriConfig {
            base_url: self.ari_url.clone(),
            username: self.ari_username.clone(),
            password: self.ari_password.clone(),
            timeout_secs: self.ari_timeout_secs,
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "avrd.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_docker_socket() -> String {
    "/var/run/docker.sock".to_string()
}

fn default_docker_timeout_secs() -> u64 {
    120
}

fn default_network() -> String {
    "avr".to_string()
}

fn default_asterisk_dir() -> String {
    "/app/asterisk".to_string()
}

fn default_ari_url() -> String {
    "http://avr-asterisk:8088/ari".to_string()
}

fn default_ari_username() -> String {
    "avr".to_string()
}

fn default_ari_timeout_secs() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_docker_socket(),
            timeout_secs: default_docker_timeout_secs(),
            network: default_network(),
            tenant: None,
        }
    }
}

impl Default for AsteriskConfig {
    fn default() -> Self {
        Self {
            config_dir: default_asterisk_dir(),
            ari_url: default_ari_url(),
            ari_username: default_ari_username(),
            ari_password: String::new(),
            ari_timeout_secs: default_ari_timeout_secs(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `AVRD_HOST` / `AVRD_PORT` override the bind address
/// - `AVRD_DB_PATH` overrides `database.path`
/// - `AVRD_LOG_LEVEL` / `AVRD_LOG_JSON` override logging
/// - `AVRD_DOCKER_SOCKET` overrides `docker.socket_path`
/// - `AVRD_TENANT` overrides `docker.tenant`
/// - `AVRD_ASTERISK_CONFIG_DIR` overrides `asterisk.config_dir`
/// - `AVRD_ARI_URL` / `AVRD_ARI_USERNAME` / `AVRD_ARI_PASSWORD` override ARI
/// - `AVRD_AMI_URL` overrides `orchestrator.ami_url`
/// - `AVRD_CORE_IMAGE` overrides `orchestrator.core_image`
/// - `AVRD_TOOLS_DIR` overrides `orchestrator.tools_dir`
/// - `AVRD_WEBHOOK_URL` / `AVRD_WEBHOOK_SECRET` override the webhook
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    if let Ok(host) = std::env::var("AVRD_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("AVRD_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(db_path) = std::env::var("AVRD_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("AVRD_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("AVRD_LOG_JSON") {
        config.logging.json = json == "true";
    }
    if let Ok(socket) = std::env::var("AVRD_DOCKER_SOCKET") {
        config.docker.socket_path = socket;
    }
    if let Ok(tenant) = std::env::var("AVRD_TENANT") {
        config.docker.tenant = Some(tenant);
    }
    if let Ok(dir) = std::env::var("AVRD_ASTERISK_CONFIG_DIR") {
        config.asterisk.config_dir = dir;
    }
    if let Ok(url) = std::env::var("AVRD_ARI_URL") {
        config.asterisk.ari_url = url;
    }
    if let Ok(username) = std::env::var("AVRD_ARI_USERNAME") {
        config.asterisk.ari_username = username;
    }
    if let Ok(password) = std::env::var("AVRD_ARI_PASSWORD") {
        config.asterisk.ari_password = password;
    }
    if let Ok(url) = std::env::var("AVRD_AMI_URL") {
        config.orchestrator.ami_url = url;
    }
    if let Ok(image) = std::env::var("AVRD_CORE_IMAGE") {
        config.orchestrator.core_image = image;
    }
    if let Ok(dir) = std::env::var("AVRD_TOOLS_DIR") {
        config.orchestrator.tools_dir = Some(dir);
    }
    if let Ok(url) = std::env::var("AVRD_WEBHOOK_URL") {
        config.orchestrator.webhook_url = Some(url);
    }
    if let Ok(secret) = std::env::var("AVRD_WEBHOOK_SECRET") {
        config.orchestrator.webhook_secret = Some(secret);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(Some("/definitely/not/here.toml")).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.docker.network, "avr");
        assert_eq!(config.orchestrator.provider_ports.min, 6000);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nport = 8080\n\n[docker]\ntenant = \"acme\"\n\n[orchestrator]\ncore_image = \"avr/core:pinned\"\n"
        )
        .unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.docker.tenant.as_deref(), Some("acme"));
        assert_eq!(config.orchestrator.core_image, "avr/core:pinned");
        // Untouched sections keep their defaults.
        assert_eq!(config.asterisk.ari_username, "avr");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = oops").unwrap();
        assert!(matches!(
            load_config(file.path().to_str()),
            Err(ConfigError::Parse(_))
        ));
    }
}
