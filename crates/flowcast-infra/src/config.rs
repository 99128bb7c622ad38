//! Server configuration loader for Flowcast.
//!
//! Reads a TOML file (`flowcast.toml` by default) and deserializes it into
//! [`ServerConfig`]. Falls back to sensible defaults when the file is missing
//! or malformed; validation happens after CLI overrides are applied.

use std::path::Path;

use flowcast_types::config::ServerConfig;
use flowcast_types::error::ConfigError;

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "flowcast.toml";

/// Load server configuration from `path`.
///
/// - If the file does not exist, returns [`ServerConfig::default()`].
/// - If the file exists but cannot be read or parsed, logs a warning and
///   returns the default.
/// - Otherwise returns the parsed config.
pub async fn load_config(path: &Path) -> ServerConfig {
    match read_config(path).await {
        Ok(Some(config)) => config,
        Ok(None) => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            ServerConfig::default()
        }
        Err(err) => {
            tracing::warn!("{err} ({}), using defaults", path.display());
            ServerConfig::default()
        }
    }
}

/// Read and parse the config at `path`. `Ok(None)` means the file is absent.
pub async fn read_config(path: &Path) -> Result<Option<ServerConfig>, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(ConfigError::Read(err.to_string())),
    };
    parse_config(&content).map(Some)
}

/// Parse a TOML document into a [`ServerConfig`] without validating it.
pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Render a config back to TOML (used by `flowcast config`).
pub fn render_config(config: &ServerConfig) -> Result<String, ConfigError> {
    toml::to_string_pretty(config).map_err(|e| ConfigError::Parse(e.to_string()))
}
