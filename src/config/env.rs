use std::{net::SocketAddr, time::Duration};

use thiserror::Error;

use crate::pipeline::Whitelist;

pub const DEFAULT_MAX_BODY_BYTES: usize = 200 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub ingest_url: String,
    pub max_body_bytes: usize,
    pub session: SessionConfig,
    pub whitelist: Whitelist,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub worklist: Vec<String>,
    pub arrival_timeout: Duration,
    pub settle_delay: Duration,
    pub portal_delay: Duration,
    pub endpoint_pool_size: u32,
    pub start_endpoint: u32,
    pub portal_url: String,
    pub portal_marker: String,
    pub login_marker: String,
    pub endpoint_base_template: String,
    pub target_site_markers: Vec<String>,
    pub liveness_url_markers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub store_filename: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file: bool,
    pub ansi: bool,
    pub rotation: LogRotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

impl std::str::FromStr for LogRotation {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => Ok(LogRotation::Hourly),
            "daily" => Ok(LogRotation::Daily),
            "never" => Ok(LogRotation::Never),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("START_ENDPOINT {start} is outside the endpoint pool 1..={pool}")]
    StartEndpointOutOfRange { start: u32, pool: u32 },
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            worklist: Vec::new(),
            arrival_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(1),
            portal_delay: Duration::from_secs(2),
            endpoint_pool_size: 5,
            start_endpoint: 1,
            portal_url: "https://noxtools.com/secure/page/semrush".to_string(),
            portal_marker: "/secure/page/semrush".to_string(),
            login_marker: "/secure/login".to_string(),
            endpoint_base_template: "https://semrush{id}.semrush.pw".to_string(),
            target_site_markers: vec!["semrush.pw".to_string(), "semrush.com".to_string()],
            liveness_url_markers: vec![
                "webapi2".to_string(),
                "backlinks".to_string(),
                "api/rpc".to_string(),
            ],
        }
    }
}
