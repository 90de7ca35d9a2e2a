use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::Result;

pub const ENV_PREFIX: &str = "LAMBDAHTTP";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub request: RequestConfig,
    pub response: ResponseConfig,
    pub log: LogConfig,
}

/// Where the request builder looks for URL parts that the proxy event
/// only carries as headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub host_header: String,
    pub scheme_header: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Synthesize Content-Type from the body when the handler set none.
    pub sniff_content_type: bool,
    /// Synthesize Date when the handler set none.
    pub stamp_date: bool,
    /// Emit non-UTF-8 bodies base64 encoded instead of lossily converted.
    pub base64_binary_bodies: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            host_header: "Host".to_string(),
            scheme_header: "X-Forwarded-Proto".to_string(),
        }
    }
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            sniff_content_type: true,
            stamp_date: true,
            base64_binary_bodies: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(Some(path.as_ref()))
    }

    /// Builds the configuration from an optional file overlaid with
    /// `LAMBDAHTTP_*` environment variables (`__` separates sections).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        } else if let Some(default_path) = Self::default_path().filter(|p| p.exists()) {
            builder = builder.add_source(config::File::from(default_path).required(false));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("lambdahttp").join("config.toml"))
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
