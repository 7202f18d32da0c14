use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::Router;
use reqwest::Client;
use tokio::{net::TcpListener, task::JoinHandle, time::timeout};

use crate::{
    config::AppConfig,
    db::exchanges::ExchangeRepository,
    infrastructure::{
        directories::ResolvedPaths,
        shutdown::{Shutdown, ShutdownReason},
    },
    server::{self, AppState},
    session::{SessionEvent, SessionMachine},
    tasks::{
        driver::SessionDriver,
        forwarder::{spawn_failure_log, CaptureForwarder},
        queue::CommandQueue,
    },
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct CaptureApp {
    paths: ResolvedPaths,
    listener: TcpListener,
    router: Router,
    driver_handle: Option<JoinHandle<()>>,
    failure_log: JoinHandle<()>,
    shutdown: Shutdown,
}

impl CaptureApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let whitelist = Arc::new(config.whitelist.clone());
        let (store, report) = ExchangeRepository::open(paths.store_path.clone(), &whitelist)
            .with_context(|| format!("failed to open store {}", paths.store_path.display()))?;
        tracing::info!(
            target: "store",
            subjects = store.snapshot().len(),
            kept = report.kept,
            removed = report.removed,
            "store ready"
        );

        let http_client = Client::builder()
            .user_agent(format!("capture-relay/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        let (forwarder, failures) = CaptureForwarder::new(http_client, config.ingest_url.clone());
        let failure_log = spawn_failure_log(failures);

        let commands = Arc::new(CommandQueue::new());
        let (session, driver_handle) = if config.session.worklist.is_empty() {
            tracing::warn!(
                target: "session",
                "WORKLIST is empty; running ingestion only"
            );
            (None, None)
        } else {
            let machine = SessionMachine::new(&config.session);
            let (driver, handle) = SessionDriver::new(machine, commands.clone());
            let join = driver.spawn(shutdown.subscribe());
            handle.send(SessionEvent::Start)?;
            tracing::info!(
                target: "session",
                subjects = config.session.worklist.len(),
                endpoint = config.session.start_endpoint,
                pool = config.session.endpoint_pool_size,
                "session driver started"
            );
            (Some(handle), Some(join))
        };

        let router = server::router(
            AppState {
                whitelist,
                store: Arc::new(store),
                commands,
                session,
                forwarder,
            },
            config.max_body_bytes,
        );

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", config.bind_addr))?;

        Ok(Self {
            paths,
            listener,
            router,
            driver_handle,
            failure_log,
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        let CaptureApp {
            paths,
            listener,
            router,
            driver_handle,
            failure_log,
            shutdown,
        } = self;

        let addr = listener.local_addr()?;
        tracing::info!(
            target: "lifecycle",
            %addr,
            store = %paths.store_path.display(),
            "capture relay listening"
        );

        let mut server_shutdown = shutdown.subscribe();
        let serve = axum::serve(listener, router)
            .with_graceful_shutdown(async move { server_shutdown.notified().await });
        let mut server_task = tokio::spawn(async move { serve.await });

        let mut shutdown_listener = shutdown.subscribe();
        let mut server_completed = false;
        tokio::select! {
            _ = shutdown_listener.notified() => {
                tracing::info!(
                    target: "lifecycle",
                    reason = %shutdown_listener.reason().unwrap_or(ShutdownReason::Interrupt),
                    "shutdown requested"
                );
            }
            res = &mut server_task => {
                server_completed = true;
                match res {
                    Ok(Ok(())) => tracing::info!(target: "lifecycle", "server stopped"),
                    Ok(Err(err)) => {
                        tracing::error!(target: "lifecycle", error = %err, "server failed")
                    }
                    Err(err) => {
                        tracing::error!(target: "lifecycle", error = %err, "server task panicked")
                    }
                }
            }
        }

        shutdown.trigger_with(ShutdownReason::ServerExited);

        if !server_completed {
            match timeout(SHUTDOWN_TIMEOUT, &mut server_task).await {
                Ok(_) => {}
                Err(_) => {
                    tracing::warn!(
                        target: "lifecycle",
                        "server did not drain within {:?}; aborting",
                        SHUTDOWN_TIMEOUT
                    );
                    server_task.abort();
                }
            }
        }

        if let Some(mut driver_handle) = driver_handle {
            if timeout(SHUTDOWN_TIMEOUT, &mut driver_handle).await.is_err() {
                tracing::warn!(
                    target: "session",
                    "session driver did not stop within {:?}; aborting",
                    SHUTDOWN_TIMEOUT
                );
                driver_handle.abort();
            }
        }

        failure_log.abort();
        tracing::info!(target: "lifecycle", "capture relay stopped");
        Ok(())
    }
}
