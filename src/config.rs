use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::DashError;
use crate::ncbi::NcbiSettings;

pub const DEFAULT_CONFIG_FILE: &str = "viromedash.json";
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8050;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub bind: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub static_dir: Option<String>,
    #[serde(default)]
    pub ncbi: Option<NcbiEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct NcbiEntry {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub addr: SocketAddr,
    pub data_dir: Utf8PathBuf,
    pub static_dir: Utf8PathBuf,
    pub ncbi: NcbiSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `viromedash.json` in the working directory when it
    /// exists. Without either the defaults apply.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, DashError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| DashError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| DashError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, DashError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let bind = config.bind.as_deref().unwrap_or(DEFAULT_BIND);
        let ip: IpAddr = bind
            .parse()
            .map_err(|_| DashError::ConfigInvalid(format!("bind address {bind}")))?;
        let addr = SocketAddr::new(ip, config.port.unwrap_or(DEFAULT_PORT));

        let ncbi = resolve_ncbi(config.ncbi.unwrap_or_default())?;

        Ok(ResolvedConfig {
            schema_version,
            addr,
            data_dir: Utf8PathBuf::from(config.data_dir.unwrap_or_else(|| "data".to_string())),
            static_dir: Utf8PathBuf::from(
                config.static_dir.unwrap_or_else(|| "static".to_string()),
            ),
            ncbi,
        })
    }
}

fn resolve_ncbi(entry: NcbiEntry) -> Result<NcbiSettings, DashError> {
    let defaults = NcbiSettings::default();
    let batch_size = entry.batch_size.unwrap_or(defaults.batch_size);
    if !(1..=10_000).contains(&batch_size) {
        return Err(DashError::ConfigInvalid(format!(
            "ncbi.batch_size must be between 1 and 10000, got {batch_size}"
        )));
    }
    let timeout_secs = entry.timeout_secs.unwrap_or(defaults.timeout.as_secs());
    if timeout_secs == 0 {
        return Err(DashError::ConfigInvalid(
            "ncbi.timeout_secs must be positive".to_string(),
        ));
    }
    Ok(NcbiSettings {
        email: entry.email.filter(|value| !value.trim().is_empty()),
        tool: entry.tool.unwrap_or(defaults.tool),
        api_key: entry.api_key.filter(|value| !value.trim().is_empty()),
        batch_size,
        timeout: Duration::from_secs(timeout_secs),
        max_retries: entry.max_retries.unwrap_or(defaults.max_retries),
    })
}
