pub mod appconfig;
pub mod appconfig_locator;

use std::path::PathBuf;

use thiserror::Error;

pub const APP_NAME: &str = "askcode";
pub const ENV_CONFIG: &str = "ASKCODE_CONFIG";
pub const ENV_API_KEY: &str = "ASKCODE_API_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file '{0}' not found")]
    NotFound(PathBuf),

    #[error("Could not read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Config file is invalid TOML: {0}")]
    InvalidToml(#[from] toml::de::Error),

    #[error("Config file is invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
