use crate::llm::config::DEFAULT_TIMEOUT_SECONDS;
use crate::llm::{ConfigSource, ProviderConfig, ProviderId};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Prefix for environment overrides, e.g. `VIDEO_SCRIPT_GEN_OPENAI_API_KEY`
pub const ENV_PREFIX: &str = "VIDEO_SCRIPT_GEN_";

/// Keep only environment pairs that are valid UTF-8.
fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
}

/// Configuration for the video script generator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Application settings, including every `<provider>_*` key
    #[serde(default)]
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Provider used for every call (`openai`, `gemini`, `ollama`, ...)
    #[serde(default = "default_llm_provider")]
    pub llm_provider: String,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub llm_timeout_seconds: u64,

    /// Flat provider keys such as `openai_api_key` or `ernie_secret_key`
    #[serde(flatten)]
    pub settings: BTreeMap<String, toml::Value>,
}

fn default_llm_provider() -> String {
    ProviderId::OpenAI.to_string()
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm_provider: default_llm_provider(),
            llm_timeout_seconds: default_timeout_seconds(),
            settings: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match key {
            "llm_provider" => self.llm_provider = value,
            "llm_timeout_seconds" => match value.trim().parse() {
                Ok(seconds) => self.llm_timeout_seconds = seconds,
                Err(_) => tracing::warn!("Ignoring invalid llm_timeout_seconds: {}", value),
            },
            _ => {
                self.settings
                    .insert(key.to_string(), toml::Value::String(value));
            }
        }
    }
}

impl ConfigSource for AppConfig {
    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "llm_provider" => Some(self.llm_provider.clone()),
            "llm_timeout_seconds" => Some(self.llm_timeout_seconds.to_string()),
            _ => match self.settings.get(key)? {
                toml::Value::String(s) => Some(s.clone()),
                toml::Value::Integer(i) => Some(i.to_string()),
                toml::Value::Float(f) => Some(f.to_string()),
                toml::Value::Boolean(b) => Some(b.to_string()),
                _ => None,
            },
        }
    }
}

impl ConfigSource for Config {
    fn lookup(&self, key: &str) -> Option<String> {
        self.app.lookup(key)
    }
}

impl Config {
    /// Load configuration from the first readable config file, then apply
    /// environment overrides
    pub fn load() -> Result<Self> {
        for path in Self::search_paths() {
            if let Ok(config_str) = std::fs::read_to_string(&path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(mut config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path.display());
                        config.apply_env(utf8_vars(std::env::vars_os()));
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Cannot parse config file {}", path.display()))?;
        config.apply_env(utf8_vars(std::env::vars_os()));
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Default configuration overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(utf8_vars(std::env::vars_os()));
        Ok(config)
    }

    /// Apply `VIDEO_SCRIPT_GEN_<KEY>=value` pairs as `[app]` overrides
    pub fn apply_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            if let Some(key) = name.strip_prefix(ENV_PREFIX) {
                if !key.is_empty() {
                    self.app.set(&key.to_ascii_lowercase(), value);
                }
            }
        }
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("config.toml"),
            PathBuf::from("config/video-script-gen.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("video-script-gen").join("config.toml"));
        }
        paths.push(PathBuf::from("/etc/video-script-gen/config.toml"));
        paths
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Resolve the provider configuration for the selected provider
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        Ok(ProviderConfig::resolve(self)?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.app.llm_timeout_seconds == 0 {
            return Err(anyhow!("llm_timeout_seconds must be greater than 0"));
        }

        self.app.llm_provider.parse::<ProviderId>()?;

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        let provider = self.app.llm_provider.as_str();
        let has = |field: &str| self.lookup(&format!("{}_{}", provider, field)).is_some();
        format!(
            "Video Script Generator Configuration:\n\
            - LLM Provider: {}\n\
            - Timeout: {}s\n\
            - API Key Set: {}\n\
            - Model: {}\n\
            - Base URL: {}",
            provider,
            self.app.llm_timeout_seconds,
            has("api_key"),
            self.lookup(&format!("{}_model_name", provider))
                .unwrap_or_else(|| "<default>".to_string()),
            self.lookup(&format!("{}_base_url", provider))
                .unwrap_or_else(|| "<default>".to_string()),
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_provider(mut self, provider: ProviderId) -> Self {
        self.config.app.llm_provider = provider.to_string();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.config.app.llm_timeout_seconds = seconds;
        self
    }

    pub fn with_setting(mut self, key: &str, value: impl Into<String>) -> Self {
        self.config.app.set(key, value);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
