use std::env;
use std::fs;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Runtime configuration for the negotiation engine. Loaded from an
/// optional TOML file, then environment variables, then programmatic
/// overrides, in increasing precedence.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
    pub negotiation: NegotiationConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Operational knobs for the negotiation pipeline. Defaults match the
/// production policy; tests override them freely.
#[derive(Clone, Debug)]
pub struct NegotiationConfig {
    pub coupon_ttl_hours: i64,
    pub code_retry_limit: u32,
    pub responder_timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://haggle.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com".to_string(),
                model: "gemini-1.5-flash".to_string(),
                timeout_secs: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            negotiation: NegotiationConfig {
                coupon_ttl_hours: 48,
                code_retry_limit: 10,
                responder_timeout_secs: 10,
            },
        }
    }
}

/// On-disk shape; every field is optional so partial files work.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    database: Option<FileDatabase>,
    llm: Option<FileLlm>,
    logging: Option<FileLogging>,
    negotiation: Option<FileNegotiation>,
}

#[derive(Debug, Default, Deserialize)]
struct FileDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLlm {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct FileNegotiation {
    coupon_ttl_hours: Option<i64>,
    code_retry_limit: Option<u32>,
    responder_timeout_secs: Option<u64>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = resolve_config_path(&options) {
            match fs::read_to_string(&path) {
                Ok(raw) => {
                    let file: FileConfig = toml::from_str(&raw)
                        .map_err(|source| ConfigError::ParseFile { path: path.clone(), source })?;
                    config.apply_file(file);
                }
                Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                    if options.require_file {
                        return Err(ConfigError::MissingConfigFile(path));
                    }
                }
                Err(source) => return Err(ConfigError::ReadFile { path, source }),
            }
        }

        config.apply_env()?;
        config.apply_overrides(&options.overrides)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(database) = file.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }
        if let Some(llm) = file.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(api_key.into());
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }
        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
        if let Some(negotiation) = file.negotiation {
            if let Some(hours) = negotiation.coupon_ttl_hours {
                self.negotiation.coupon_ttl_hours = hours;
            }
            if let Some(limit) = negotiation.code_retry_limit {
                self.negotiation.code_retry_limit = limit;
            }
            if let Some(secs) = negotiation.responder_timeout_secs {
                self.negotiation.responder_timeout_secs = secs;
            }
        }
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = env::var("HAGGLE_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(level) = env::var("HAGGLE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("HAGGLE_LOG_FORMAT") {
            self.logging.format = format.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "HAGGLE_LOG_FORMAT".to_string(),
                value: format,
            })?;
        }
        if let Ok(api_key) = env::var("HAGGLE_LLM_API_KEY") {
            self.llm.api_key = Some(api_key.into());
        }
        if let Ok(base_url) = env::var("HAGGLE_LLM_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Ok(model) = env::var("HAGGLE_LLM_MODEL") {
            self.llm.model = model;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: &ConfigOverrides) -> Result<(), ConfigError> {
        if let Some(url) = &overrides.database_url {
            self.database.url = url.clone();
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
        if let Some(api_key) = &overrides.llm_api_key {
            self.llm.api_key = Some(api_key.clone().into());
        }
        if let Some(base_url) = &overrides.llm_base_url {
            self.llm.base_url = base_url.clone();
        }
        if let Some(model) = &overrides.llm_model {
            self.llm.model = model.clone();
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.negotiation.coupon_ttl_hours <= 0 {
            return Err(ConfigError::Validation(
                "negotiation.coupon_ttl_hours must be positive".to_string(),
            ));
        }
        if self.negotiation.code_retry_limit == 0 {
            return Err(ConfigError::Validation(
                "negotiation.code_retry_limit must be at least 1".to_string(),
            ));
        }
        if self.negotiation.responder_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "negotiation.responder_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn resolve_config_path(options: &LoadOptions) -> Option<PathBuf> {
    if let Some(path) = &options.config_path {
        return Some(path.clone());
    }
    if let Ok(path) = env::var("HAGGLE_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let default = PathBuf::from("haggle.toml");
    default.exists().then_some(default)
}
