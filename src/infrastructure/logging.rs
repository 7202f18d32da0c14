use std::{io, path::Path};

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::env::{LogRotation, LoggingConfig};

static INIT: OnceCell<()> = OnceCell::new();
static GUARD: OnceCell<WorkerGuard> = OnceCell::new();

const LOG_FILE_PREFIX: &str = "capture.log";
// HTTP plumbing stays at warn unless RUST_LOG overrides it.
const QUIET_TARGETS: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "h2=warn"];

pub fn init_tracing(config: &LoggingConfig, logs_dir: &Path) -> Result<()> {
    INIT.get_or_try_init::<_, anyhow::Error>(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_directives(&config.level)))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let console_layer = fmt::layer()
            .with_writer(io::stdout)
            .with_target(true)
            .with_ansi(config.ansi);

        let file_layer = config.file.then(|| {
            let appender = match config.rotation {
                LogRotation::Hourly => rolling::hourly(logs_dir, LOG_FILE_PREFIX),
                LogRotation::Daily => rolling::daily(logs_dir, LOG_FILE_PREFIX),
                LogRotation::Never => rolling::never(logs_dir, LOG_FILE_PREFIX),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = GUARD.set(guard);
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
        });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        tracing::info!(
            target: "lifecycle",
            logs = %logs_dir.display(),
            file = config.file,
            "tracing initialized"
        );
        Ok(())
    })?;
    Ok(())
}

fn default_directives(level: &str) -> String {
    let mut directives = vec![level.to_string()];
    directives.extend(QUIET_TARGETS.iter().map(|d| d.to_string()));
    directives.join(",")
}
