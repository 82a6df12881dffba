//! Configuration loading

use crate::{Config, ConfigFormat};
use regex::Regex;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use switchyard_core::{Error, Result};

/// Environment variable replacing the whole listen address
pub const LISTEN_ENV: &str = "SWITCHYARD_LISTEN";

/// Environment variable replacing only the listen port
pub const PORT_ENV: &str = "PORT";

/// Load configuration from a file
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();

    let content = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {e}", path.display()))
    })?;

    let format = ConfigFormat::from_path(path)?;

    load_from_str(&content, format)
}

/// Expand environment variables in configuration string
/// Supports syntax: ${VAR} and ${VAR:-default}
fn expand_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}")
        .map_err(|e| Error::Config(format!("Invalid regex: {e}")))?;

    let mut result = String::with_capacity(content.len());
    let mut last_match = 0;

    for cap in re.captures_iter(content) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let var_name = var_name.as_str();
        let default_value = cap.get(3).map(|m| m.as_str());

        let value = match (env::var(var_name), default_value) {
            (Ok(val), _) => val,
            (Err(_), Some(default)) => default.to_string(),
            (Err(_), None) => {
                return Err(Error::Config(format!(
                    "Environment variable '{var_name}' not set and no default provided"
                )));
            }
        };

        result.push_str(&content[last_match..full_match.start()]);
        result.push_str(&value);
        last_match = full_match.end();
    }

    result.push_str(&content[last_match..]);

    Ok(result)
}

/// Load configuration from a string
pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<Config> {
    let expanded_content = expand_env_vars(content)?;

    let config = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse YAML: {e}")))?,
        ConfigFormat::Toml => toml::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {e}")))?,
        ConfigFormat::Json => serde_json::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse JSON: {e}")))?,
    };

    Ok(config)
}

/// Apply `SWITCHYARD_LISTEN` and `PORT` overrides
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Ok(listen) = env::var(LISTEN_ENV) {
        config.server.listen = listen
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("{LISTEN_ENV} is not a socket address: {e}")))?;
        tracing::debug!(listen = %config.server.listen, "Listen address overridden from environment");
    }

    if let Ok(port) = env::var(PORT_ENV) {
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|e| Error::Config(format!("{PORT_ENV} is not a valid port: {e}")))?;
        config.server.listen.set_port(port);
        tracing::debug!(port, "Listen port overridden from environment");
    }

    Ok(())
}

/// Load, optionally override from the environment, and validate
pub fn load_config<P: AsRef<Path>>(path: P, env_overrides: bool) -> Result<Config> {
    let mut config = load_from_file(path)?;

    if env_overrides {
        apply_env_overrides(&mut config)?;
    }

    crate::validator::validate_config(&config)?;

    Ok(config)
}
