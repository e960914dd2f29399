//! Daemon configuration, loaded from a TOML file.
//!
//! Absent fields take the documented defaults; present-but-invalid values
//! fail validation with every problem reported at once. `base_url` is the
//! phone-reachable origin that gets baked into QR codes, so it is validated
//! strictly: a bare http(s) origin, nothing else.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub tokens: TokensConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// host:port the daemon binds.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Phone-reachable LAN origin, e.g. "http://192.168.1.10".
    #[serde(default)]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_max_total_size_mb")]
    pub max_total_size_mb: u64,
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,
    #[serde(default = "default_transcode_concurrency")]
    pub transcode_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokensConfig {
    #[serde(default = "default_download_ttl_seconds")]
    pub download_ttl_seconds: u64,
    #[serde(default = "default_bridge_ttl_seconds")]
    pub bridge_ttl_seconds: u64,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_owned()
}
fn default_max_file_size_mb() -> u64 {
    100
}
fn default_max_files() -> usize {
    10_000
}
fn default_max_total_size_mb() -> u64 {
    300
}
fn default_upload_concurrency() -> usize {
    16
}
fn default_transcode_concurrency() -> usize {
    2
}
fn default_download_ttl_seconds() -> u64 {
    60
}
fn default_bridge_ttl_seconds() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            base_url: String::new(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size_mb(),
            max_files: default_max_files(),
            max_total_size_mb: default_max_total_size_mb(),
            upload_concurrency: default_upload_concurrency(),
            transcode_concurrency: default_transcode_concurrency(),
        }
    }
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            download_ttl_seconds: default_download_ttl_seconds(),
            bridge_ttl_seconds: default_bridge_ttl_seconds(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errs = Vec::new();

        if self.server.listen.trim().is_empty() {
            errs.push("server.listen is required".to_owned());
        } else if self.server.listen.parse::<SocketAddr>().is_err() {
            errs.push("server.listen must be host:port".to_owned());
        }

        if self.server.base_url.trim().is_empty() {
            errs.push(
                "server.base_url is required (phone-reachable LAN origin, e.g. http://192.168.1.10)"
                    .to_owned(),
            );
        } else if let Err(e) = parse_base_url(&self.server.base_url) {
            errs.push(format!("server.base_url invalid: {e}"));
        }

        if self.limits.max_file_size_mb == 0 {
            errs.push("limits.max_file_size_mb must be > 0".to_owned());
        }
        if self.limits.max_file_size_mb > 100 {
            errs.push("limits.max_file_size_mb must be <= 100".to_owned());
        }
        if self.limits.max_files == 0 {
            errs.push("limits.max_files must be > 0".to_owned());
        }
        if self.limits.max_total_size_mb == 0 {
            errs.push("limits.max_total_size_mb must be > 0".to_owned());
        }
        if self.limits.upload_concurrency == 0 {
            errs.push("limits.upload_concurrency must be > 0".to_owned());
        }
        if self.limits.transcode_concurrency == 0 {
            errs.push("limits.transcode_concurrency must be > 0".to_owned());
        }

        if self.tokens.download_ttl_seconds == 0 {
            errs.push("tokens.download_ttl_seconds must be > 0".to_owned());
        }
        if self.tokens.bridge_ttl_seconds == 0 {
            errs.push("tokens.bridge_ttl_seconds must be > 0".to_owned());
        }

        if errs.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errs))
        }
    }

    /// Origin (scheme://host[:port]) used for absolute URLs inside QR
    /// codes. When `base_url` names no port, the listen port is appended
    /// unless it is 80.
    pub fn external_origin(&self) -> Result<String, ConfigError> {
        let url = parse_base_url(&self.server.base_url)
            .map_err(|e| ConfigError::Invalid(vec![format!("server.base_url invalid: {e}")]))?;

        let scheme = url.scheme();
        let host = url
            .host_str()
            .map(str::to_owned)
            .unwrap_or_default();

        if let Some(port) = url.port() {
            return Ok(format!("{scheme}://{host}:{port}"));
        }

        let listen: SocketAddr = self
            .server
            .listen
            .parse()
            .map_err(|_| ConfigError::Invalid(vec!["server.listen must be host:port".to_owned()]))?;
        if listen.port() == 80 {
            Ok(format!("{scheme}://{host}"))
        } else {
            Ok(format!("{scheme}://{host}:{}", listen.port()))
        }
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.limits.max_file_size_mb * 1024 * 1024
    }

    pub fn max_total_bytes(&self) -> u64 {
        self.limits.max_total_size_mb * 1024 * 1024
    }

    pub fn download_ttl(&self) -> Duration {
        Duration::from_secs(self.tokens.download_ttl_seconds)
    }

    pub fn bridge_ttl(&self) -> Duration {
        Duration::from_secs(self.tokens.bridge_ttl_seconds)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err("scheme must be http or https".to_owned());
    }
    if url.host_str().is_none() {
        return Err("host is required".to_owned());
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err("userinfo is not allowed".to_owned());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("query/fragment is not allowed".to_owned());
    }
    if !matches!(url.path(), "" | "/") {
        return Err("path is not allowed; base_url should be an origin like http://192.168.1.10"
            .to_owned());
    }
    Ok(url)
}
