use crate::models::AppConfig;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Failed to read config: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Failed to parse YAML config: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate configuration from YAML text
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig =
        serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;

    config.validate().map_err(ConfigError::Invalid)?;

    Ok(config)
}

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Arc<AppConfig>, ConfigError> {
    let path = path.as_ref();
    info!("Loading configuration from: {}", path.display());

    let contents = fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("'{}': {}", path.display(), e)))?;

    let config = parse_config(&contents)?;

    info!(
        "Configuration loaded: application '{}', component '{}', {} audit delivery",
        config.application_name,
        config.component_name,
        config.audit.delivery.as_str()
    );

    Ok(Arc::new(config))
}

/// Load configuration with fallback options.
///
/// Reads `CONFIG_PATH` when set, otherwise the usual file names in the working
/// directory, otherwise the built-in defaults.
pub fn load_config_with_fallback() -> Result<Arc<AppConfig>, ConfigError> {
    let explicit = std::env::var("CONFIG_PATH").ok();
    load_config_from(explicit.as_deref())
}

/// Resolve configuration from an explicit path or the default locations.
///
/// A file that exists but cannot be loaded is an error; only the absence of
/// every candidate falls back to the defaults.
pub fn load_config_from(explicit: Option<&str>) -> Result<Arc<AppConfig>, ConfigError> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    for path in ["config.yaml", "config.yml"] {
        if Path::new(path).exists() {
            return load_config(path);
        }
    }

    info!("No configuration file found, using built-in defaults");
    Ok(Arc::new(AppConfig::default()))
}
