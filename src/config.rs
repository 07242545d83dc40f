use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::util::shingle::DEFAULT_WINDOW_SIZES;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory under which each request stages its uploads.
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("uploads"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    pub window_sizes: Vec<usize>,
    pub extraction_concurrency: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            window_sizes: DEFAULT_WINDOW_SIZES.to_vec(),
            extraction_concurrency: 4,
        }
    }
}

impl SimilarityConfig {
    /// Checks the window sizes and drops repeats, keeping the first occurrence
    /// so shingle output order stays stable.
    fn normalize(&mut self) -> anyhow::Result<()> {
        if self.window_sizes.is_empty() {
            return Err(anyhow!("similarity.window_sizes must not be empty"));
        }
        if self.window_sizes.contains(&0) {
            return Err(anyhow!("similarity.window_sizes must all be at least 1"));
        }

        let mut seen = Vec::with_capacity(self.window_sizes.len());
        for size in self.window_sizes.drain(..) {
            if !seen.contains(&size) {
                seen.push(size);
            }
        }
        self.window_sizes = seen;

        if self.extraction_concurrency == 0 {
            self.extraction_concurrency = 1;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: String,
    pub level: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: "logs/plagcheck.log".to_string(),
            level: Some("info".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub similarity: SimilarityConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let explicit_path = std::env::var("CONFIG_FILE").ok();
        let config = if let Some(path) = explicit_path {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(anyhow!("config file {:?} not found", path));
            }
            Self::load_from_file(&path)?
        } else {
            let path = locate_default_config();
            if let Some(path) = path {
                Self::load_from_file(&path)?
            } else {
                AppConfig::default()
            }
        };

        Self::apply_env_overrides(config)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        Self::from_yaml(&contents).with_context(|| format!("failed to parse config file {:?}", path))
    }

    fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        let config: AppConfig = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    fn apply_env_overrides(mut config: AppConfig) -> anyhow::Result<AppConfig> {
        if let Ok(bind) = std::env::var("SERVER_BIND") {
            config.server.bind = bind;
        }

        if let Some(limit) = parse_optional_env("MAX_UPLOAD_BYTES")? {
            config.server.max_upload_bytes = limit;
        }

        if let Ok(root) = std::env::var("STORAGE_ROOT") {
            config.storage.root = PathBuf::from(root);
        }

        if let Ok(raw) = std::env::var("SHINGLE_WINDOW_SIZES") {
            config.similarity.window_sizes = parse_window_sizes(&raw)
                .context("SHINGLE_WINDOW_SIZES must be a comma-separated list of integers")?;
        }

        if let Some(concurrency) = parse_optional_env("EXTRACTION_CONCURRENCY")? {
            config.similarity.extraction_concurrency = concurrency;
        }

        if let Ok(log_file) = std::env::var("LOG_FILE_PATH") {
            config.logging.file = log_file;
        }

        if let Ok(log_level) = std::env::var("LOG_LEVEL") {
            config.logging.level = Some(log_level);
        }

        config.similarity.normalize()?;

        Ok(config)
    }
}

fn parse_window_sizes(raw: &str) -> anyhow::Result<Vec<usize>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<usize>()
                .with_context(|| format!("invalid window size {part:?}"))
        })
        .collect()
}

fn parse_optional_env<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => Ok(Some(
            v.parse::<T>()
                .with_context(|| format!("{key} must be a valid value"))?,
        )),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn locate_default_config() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("config/config.yaml"),
        PathBuf::from("../config/config.yaml"),
    ];

    for path in candidates {
        if path.exists() {
            return Some(path);
        }
    }

    None
}
