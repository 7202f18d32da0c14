use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::domain::CapturePayload;

#[derive(Debug, Clone)]
pub struct ForwardFailure {
    pub url: String,
    pub reason: String,
}

#[derive(Clone)]
pub struct CaptureForwarder {
    http: Client,
    ingest_url: String,
    failures: mpsc::UnboundedSender<ForwardFailure>,
}

impl CaptureForwarder {
    pub fn new(
        http: Client,
        ingest_url: String,
    ) -> (Self, mpsc::UnboundedReceiver<ForwardFailure>) {
        let (failures, receiver) = mpsc::unbounded_channel();
        (
            Self {
                http,
                ingest_url,
                failures,
            },
            receiver,
        )
    }

    pub fn forward(&self, payload: CapturePayload) -> JoinHandle<()> {
        let forwarder = self.clone();
        tokio::spawn(async move {
            match forwarder.deliver(&payload).await {
                Ok(()) => {
                    tracing::debug!(target: "forward", url = %payload.url, "capture forwarded");
                }
                Err(err) => {
                    tracing::warn!(
                        target: "forward",
                        url = %payload.url,
                        error = %err,
                        "failed to forward capture"
                    );
                    let _ = forwarder.failures.send(ForwardFailure {
                        url: payload.url,
                        reason: format!("{err:#}"),
                    });
                }
            }
        })
    }

    async fn deliver(&self, payload: &CapturePayload) -> Result<()> {
        self.http
            .post(&self.ingest_url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.ingest_url))?
            .error_for_status()?;
        Ok(())
    }
}

pub fn spawn_failure_log(mut failures: mpsc::UnboundedReceiver<ForwardFailure>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut total: u64 = 0;
        while let Some(failure) = failures.recv().await {
            total += 1;
            tracing::error!(
                target: "forward",
                url = %failure.url,
                reason = %failure.reason,
                total,
                "capture lost"
            );
        }
    })
}
