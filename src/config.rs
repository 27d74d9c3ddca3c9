use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

const EMBEDDED_DEFAULTS: &str = include_str!("../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub site: SiteConfig,
    pub weather: WeatherConfig,
    pub model: ModelSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
}
impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub volume_path: PathBuf,
    pub model_dir: PathBuf,
}
impl StorageConfig {
    pub fn log_dir(&self) -> PathBuf {
        self.volume_path.join("logs")
    }

    /// Model directory; a path pointing at a file is reduced to its parent.
    pub fn model_dir(&self) -> PathBuf {
        if self.model_dir.is_file() {
            self.model_dir
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        } else {
            self.model_dir.clone()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub console_level: String,
    pub file_level: String,
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub timezone: String,
}
impl SiteConfig {
    pub fn tz(&self) -> Result<Tz> {
        parse_tz(&self.timezone)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    pub forecast_url: String,
    pub historical_url: String,
    pub query_timezone: String,
    pub http_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub max_retries: u32,
    pub retry_min_backoff_ms: u64,
    pub retry_max_backoff_ms: u64,
}

/// Model section of the config file. Unset fields fall back to the
/// per-family defaults when `ml::ModelConfig::resolve` freezes them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelSettings {
    pub family: String,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub loss_scale_factor: Option<f64>,
    pub val_size: Option<usize>,
    pub separate_val_set: Option<bool>,
    pub target_col: Option<String>,
    pub features: Option<Vec<String>>,
    pub normalize: Option<bool>,
    pub deterministic: Option<bool>,
    pub seed: Option<u64>,
    pub device: Option<String>,
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub learning_rate: Option<f64>,
    pub dropout_rate: Option<f64>,
    pub hidden_layers: Option<Vec<usize>>,
}

impl Config {
    /// Embedded defaults, then `config/default.toml`, then `SOLAR__*` env vars.
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::string(EMBEDDED_DEFAULTS))
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("SOLAR__").split("__"));
        let cfg: Config = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// The embedded defaults alone, validated.
    pub fn embedded() -> Result<Self> {
        Self::from_toml_str("")
    }

    pub fn from_toml_str(overrides: &str) -> Result<Self> {
        let cfg: Config = Figment::new()
            .merge(Toml::string(EMBEDDED_DEFAULTS))
            .merge(Toml::string(overrides))
            .extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.site.tz()?;
        parse_tz(&self.weather.query_timezone)?;
        if self.model.lower_bound > self.model.upper_bound {
            anyhow::bail!(
                "model.lower_bound ({}) must not exceed model.upper_bound ({})",
                self.model.lower_bound,
                self.model.upper_bound
            );
        }
        if self.weather.retry_min_backoff_ms > self.weather.retry_max_backoff_ms {
            anyhow::bail!("weather.retry_min_backoff_ms exceeds weather.retry_max_backoff_ms");
        }
        #[cfg(feature = "ml")]
        crate::ml::ModelConfig::resolve(&self.model)?;
        Ok(())
    }
}

pub fn parse_tz(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("invalid timezone '{name}': {e}"))
}
