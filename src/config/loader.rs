use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use super::env::{
    AppConfig, ConfigError, DirectoryConfig, LogRotation, LoggingConfig, SessionConfig,
    DEFAULT_MAX_BODY_BYTES,
};
use crate::pipeline::Whitelist;

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let bind_addr: SocketAddr = parse_typed("BIND_ADDR")?
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000)));
        let ingest_url =
            env::var("INGEST_URL").unwrap_or_else(|_| format!("http://{bind_addr}/capture"));
        let max_body_bytes: usize =
            parse_typed("MAX_BODY_BYTES")?.unwrap_or(DEFAULT_MAX_BODY_BYTES);
        if max_body_bytes == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_BODY_BYTES",
                value: "0".to_string(),
            });
        }

        let defaults = SessionConfig::default();
        let session = SessionConfig {
            worklist: parse_list("WORKLIST", ',').unwrap_or_default(),
            arrival_timeout: parse_millis("ARRIVAL_TIMEOUT_MS")?
                .unwrap_or(defaults.arrival_timeout),
            settle_delay: parse_millis("SETTLE_DELAY_MS")?.unwrap_or(defaults.settle_delay),
            portal_delay: parse_millis("PORTAL_DELAY_MS")?.unwrap_or(defaults.portal_delay),
            endpoint_pool_size: parse_typed("ENDPOINT_POOL_SIZE")?
                .unwrap_or(defaults.endpoint_pool_size),
            start_endpoint: parse_typed("START_ENDPOINT")?.unwrap_or(defaults.start_endpoint),
            portal_url: env::var("PORTAL_URL").unwrap_or(defaults.portal_url),
            portal_marker: env::var("PORTAL_MARKER").unwrap_or(defaults.portal_marker),
            login_marker: env::var("LOGIN_MARKER").unwrap_or(defaults.login_marker),
            endpoint_base_template: env::var("ENDPOINT_BASE_TEMPLATE")
                .unwrap_or(defaults.endpoint_base_template),
            target_site_markers: parse_list("TARGET_SITE_MARKERS", ',')
                .unwrap_or(defaults.target_site_markers),
            liveness_url_markers: parse_list("LIVENESS_URL_MARKERS", ',')
                .unwrap_or(defaults.liveness_url_markers),
        };

        if session.endpoint_pool_size == 0 {
            return Err(ConfigError::Invalid {
                key: "ENDPOINT_POOL_SIZE",
                value: "0".to_string(),
            });
        }
        if !(1..=session.endpoint_pool_size).contains(&session.start_endpoint) {
            return Err(ConfigError::StartEndpointOutOfRange {
                start: session.start_endpoint,
                pool: session.endpoint_pool_size,
            });
        }

        let base = Whitelist::default();
        let whitelist = Whitelist {
            url_markers: parse_list("WHITELIST_URL_MARKERS", ',').unwrap_or(base.url_markers),
            rpc_methods: parse_list("WHITELIST_RPC_METHODS", ',').unwrap_or(base.rpc_methods),
            trend_methods: parse_list("TREND_METHODS", ',').unwrap_or(base.trend_methods),
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            store_filename: env::var("STORE_FILENAME")
                .unwrap_or_else(|_| "rpc_data.json".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            file: parse_typed("LOG_TO_FILE")?.unwrap_or(true),
            ansi: parse_typed("LOG_ANSI")?.unwrap_or(true),
            rotation: parse_typed("LOG_ROTATION")?.unwrap_or(LogRotation::Daily),
        };

        Ok(Self {
            bind_addr,
            ingest_url,
            max_body_bytes,
            session,
            whitelist,
            directories,
            logging,
        })
    }
}

fn parse_list(key: &str, separator: char) -> Option<Vec<String>> {
    env::var(key).ok().map(|value| {
        value
            .split(separator)
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
    })
}

fn parse_typed<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
        _ => Ok(None),
    }
}

fn parse_millis(key: &'static str) -> Result<Option<Duration>, ConfigError> {
    Ok(parse_typed::<u64>(key)?.map(Duration::from_millis))
}
