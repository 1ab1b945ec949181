use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::config::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/coding/paas/v4/chat/completions";
pub const DEFAULT_MODEL: &str = "glm-4.7-flashx";
pub const DEFAULT_TEMPERATURE: f32 = 0.0;
pub const DEFAULT_STREAM: bool = true;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings for a single run, fixed once built.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub stream: bool,
    pub timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            stream: DEFAULT_STREAM,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl fmt::Display for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "base_url: {}", self.base_url)?;
        match &self.api_key {
            Some(key) if !key.is_empty() => writeln!(f, "api_key: xxxxx...redacted")?,
            _ => writeln!(f, "api_key: -")?,
        }
        writeln!(f, "model: {}", self.model)?;
        writeln!(f, "temperature: {}", self.temperature)?;
        writeln!(f, "stream: {}", self.stream)?;
        write!(f, "timeout_secs: {}", self.timeout_secs)
    }
}

/// Contents of a config file. Every key is optional and only replaces the
/// matching default. camelCase keys are accepted so JSON files written for
/// other tools keep working. Unknown keys such as `provider` are ignored.
#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct ConfigFile {
    #[serde(alias = "baseUrl")]
    pub base_url: Option<String>,

    #[serde(alias = "apiKey")]
    pub api_key: Option<String>,

    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub stream: Option<bool>,

    #[serde(alias = "timeoutSecs", alias = "timeout")]
    pub timeout_secs: Option<u64>,
}

impl TryFrom<&str> for ConfigFile {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Ok(toml::from_str(value)?)
    }
}

impl ConfigFile {
    pub fn from_json(value: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(value)?)
    }

    /// Reads `path`, choosing the format from its extension: `.json` is JSON, anything else TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            ConfigFile::from_json(&content)
        } else {
            ConfigFile::try_from(content.as_str())
        }
    }
}

/// Values given on the command line. They win over everything else.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub stream: Option<bool>,
}

impl AppConfig {
    pub fn merge(self, file: ConfigFile) -> Self {
        AppConfig {
            base_url: file.base_url.unwrap_or(self.base_url),
            api_key: file.api_key.or(self.api_key),
            model: file.model.unwrap_or(self.model),
            temperature: file.temperature.unwrap_or(self.temperature),
            stream: file.stream.unwrap_or(self.stream),
            timeout_secs: file.timeout_secs.unwrap_or(self.timeout_secs),
        }
    }

    /// Fills in the API key only when nothing else provided one.
    pub fn with_fallback_api_key(self, api_key: Option<String>) -> Self {
        AppConfig {
            api_key: self.api_key.or(api_key),
            ..self
        }
    }

    pub fn with_overrides(self, overrides: &ConfigOverrides) -> Self {
        AppConfig {
            base_url: overrides.base_url.clone().unwrap_or(self.base_url),
            api_key: overrides.api_key.clone().or(self.api_key),
            model: overrides.model.clone().unwrap_or(self.model),
            temperature: overrides.temperature.unwrap_or(self.temperature),
            stream: overrides.stream.unwrap_or(self.stream),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.temperature, 0.0);
        assert!(config.stream);
        assert!(config.api_key.is_none());
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_toml_file_merges_over_defaults() {
        let file = ConfigFile::try_from(r#"
            model = "gpt-4o-mini"
            temperature = 0.4
            api_key = "secret"
        "#).unwrap();

        let config = AppConfig::default().merge(file);

        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.temperature, 0.4);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_json_file_with_camel_case_keys() {
        let file = ConfigFile::from_json(r#"{
            "provider": "openai",
            "baseUrl": "http://localhost:11434/v1/chat/completions",
            "apiKey": "k",
            "model": "llama3",
            "unknown": 1
        }"#).unwrap();

        assert_eq!(file.base_url.as_deref(), Some("http://localhost:11434/v1/chat/completions"));
        assert_eq!(file.api_key.as_deref(), Some("k"));
        assert_eq!(file.model.as_deref(), Some("llama3"));
        assert_eq!(file.temperature, None);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            ConfigFile::try_from("model = "),
            Err(ConfigError::InvalidToml(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");

        assert!(matches!(ConfigFile::load(&path), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("config.json");
        let mut json_file = fs::File::create(&json_path).unwrap();
        write!(json_file, r#"{{"model": "from-json", "temperature": 1.0}}"#).unwrap();

        let toml_path = dir.path().join("config.toml");
        let mut toml_file = fs::File::create(&toml_path).unwrap();
        write!(toml_file, "model = \"from-toml\"\nstream = false\n").unwrap();

        let json = ConfigFile::load(&json_path).unwrap();
        assert_eq!(json.model.as_deref(), Some("from-json"));
        assert_eq!(json.temperature, Some(1.0));

        let toml = ConfigFile::load(&toml_path).unwrap();
        assert_eq!(toml.model.as_deref(), Some("from-toml"));
        assert_eq!(toml.stream, Some(false));
    }

    #[test]
    fn test_overrides_win() {
        let file = ConfigFile {
            model: Some("file-model".to_string()),
            api_key: Some("file-key".to_string()),
            ..ConfigFile::default()
        };

        let overrides = ConfigOverrides {
            model: Some("cli-model".to_string()),
            stream: Some(false),
            ..ConfigOverrides::default()
        };

        let config = AppConfig::default()
            .merge(file)
            .with_fallback_api_key(Some("env-key".to_string()))
            .with_overrides(&overrides);

        assert_eq!(config.model, "cli-model");
        assert_eq!(config.api_key.as_deref(), Some("file-key"));
        assert!(!config.stream);
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn test_fallback_api_key_used_when_missing() {
        let config = AppConfig::default().with_fallback_api_key(Some("env-key".to_string()));

        assert_eq!(config.api_key.as_deref(), Some("env-key"));
    }

    #[test]
    fn test_display_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("super-secret".to_string()),
            ..AppConfig::default()
        };

        let shown = config.to_string();
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("redacted"));
    }
}
