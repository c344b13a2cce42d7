use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the configured API key.
pub const API_KEY_ENV: &str = "MEMORYLANE_API_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl CoreConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("config.toml");
        let mut cfg = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str::<CoreConfig>(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?
        } else {
            tracing::info!(
                "No config file found at {}. Using CoreConfig::default().",
                path.display()
            );
            CoreConfig::default()
        };
        cfg.resolve_paths(root);
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                cfg.generation.api_key = key;
            }
        }
        Ok(cfg)
    }

    fn resolve_paths(&mut self, root: &Path) {
        self.storage.record_db = absolutize(root, &self.storage.record_db);
        self.storage.image_cache = absolutize(root, &self.storage.image_cache);
        self.storage.logbook = absolutize(root, &self.storage.logbook);
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            system: SystemConfig::default(),
            storage: StorageConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "SystemConfig::default_name")]
    pub name: String,
    #[serde(default = "SystemConfig::default_version")]
    pub version: String,
}

impl SystemConfig {
    fn default_name() -> String {
        "memorylane".to_string()
    }

    fn default_version() -> String {
        "0.1.0".to_string()
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            version: Self::default_version(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding the small JSON collections.
    #[serde(default = "StorageConfig::default_record_db")]
    pub record_db: PathBuf,
    /// Directory holding cached image payloads, one file per id.
    #[serde(default = "StorageConfig::default_image_cache")]
    pub image_cache: PathBuf,
    /// JSONL event log appended by the command facade.
    #[serde(default = "StorageConfig::default_logbook")]
    pub logbook: PathBuf,
    /// Byte budget for the record shelves. Mirrors the few-MB quota of the
    /// key-value store the collections were designed for.
    #[serde(default = "StorageConfig::default_quota_bytes")]
    pub quota_bytes: usize,
}

impl StorageConfig {
    fn default_record_db() -> PathBuf {
        PathBuf::from("cache/records.db")
    }

    fn default_image_cache() -> PathBuf {
        PathBuf::from("images")
    }

    fn default_logbook() -> PathBuf {
        PathBuf::from("logbook.jsonl")
    }

    fn default_quota_bytes() -> usize {
        5 * 1024 * 1024
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            record_db: Self::default_record_db(),
            image_cache: Self::default_image_cache(),
            logbook: Self::default_logbook(),
            quota_bytes: Self::default_quota_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "GenerationConfig::default_text_url")]
    pub text_url: String,
    #[serde(default = "GenerationConfig::default_image_url")]
    pub image_url: String,
    /// Static credential attached to every request as a query parameter.
    /// Overridable via the `MEMORYLANE_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "GenerationConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra attempts after a transport failure. HTTP-level errors are not
    /// retried; the service already saw the request.
    #[serde(default = "GenerationConfig::default_max_retries")]
    pub max_retries: u32,
}

impl GenerationConfig {
    fn default_text_url() -> String {
        "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
            .to_string()
    }

    fn default_image_url() -> String {
        "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-image:generateContent"
            .to_string()
    }

    fn default_timeout_secs() -> u64 {
        30
    }

    fn default_max_retries() -> u32 {
        1
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            text_url: Self::default_text_url(),
            image_url: Self::default_image_url(),
            api_key: String::new(),
            timeout_secs: Self::default_timeout_secs(),
            max_retries: Self::default_max_retries(),
        }
    }
}

fn absolutize(root: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        root.join(value)
    }
}
