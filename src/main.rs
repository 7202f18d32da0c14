mod app;
mod config;
mod db;
mod domain;
mod infrastructure;
mod pipeline;
mod server;
mod session;
mod tasks;

use anyhow::Result;
use infrastructure::{
    directories, logging,
    shutdown::{install_signal_handlers, Shutdown},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config.logging, &paths.logs_dir)?;

    let (shutdown, _) = Shutdown::new();
    install_signal_handlers(shutdown.clone());

    let app = app::CaptureApp::initialize(config, paths, shutdown.clone()).await?;
    app.run().await
}
