use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use super::{json_error, ApiError, AppState};
use crate::{
    db::StoreError,
    domain::{CapturePayload, StoreSnapshot, StoredExchange},
    pipeline::{classify_event, resolve_subject},
};

const REJECTION_REASON: &str = "Did not match whitelist";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum IngestOutcome {
    Skipped {
        success: bool,
        skipped: bool,
        reason: String,
    },
    Stored {
        success: bool,
        domain: String,
    },
}

impl IngestOutcome {
    fn skipped() -> Self {
        IngestOutcome::Skipped {
            success: false,
            skipped: true,
            reason: REJECTION_REASON.to_string(),
        }
    }

    fn stored(domain: String) -> Self {
        IngestOutcome::Stored {
            success: true,
            domain,
        }
    }
}

pub fn ingest(state: &AppState, payload: CapturePayload) -> Result<IngestOutcome, StoreError> {
    let event = payload.event();
    let Some(accepted) = classify_event(&state.whitelist, &event).accepted() else {
        tracing::debug!(target: "ingest", url = %payload.url, "rejected by whitelist");
        return Ok(IngestOutcome::skipped());
    };

    let subject = resolve_subject(payload.domain.as_deref(), &payload.url, &accepted.request);
    let reason = accepted.reason.to_string();
    let exchange = StoredExchange::from_accepted(payload.url, accepted, payload.timestamp);
    state.store.record(&subject, exchange)?;

    tracing::info!(target: "ingest", subject = %subject, reason = %reason, "capture accepted");
    Ok(IngestOutcome::stored(subject))
}

// Store work runs on the blocking pool; a full rewrite scales with store size.
async fn on_blocking_pool<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            tracing::error!(target: "store", error = %err, "store operation failed");
            Err(json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
        }
        Err(err) => {
            tracing::error!(target: "store", error = %err, "store task did not complete");
            Err(json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
        }
    }
}

pub(super) async fn post_capture(
    State(state): State<AppState>,
    payload: Result<Json<CapturePayload>, JsonRejection>,
) -> Result<Json<IngestOutcome>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        tracing::error!(target: "ingest", error = %rejection.body_text(), "malformed capture");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, rejection.body_text())
    })?;

    on_blocking_pool(move || ingest(&state, payload)).await.map(Json)
}

pub(super) async fn get_captures(
    State(state): State<AppState>,
) -> Result<Json<StoreSnapshot>, ApiError> {
    on_blocking_pool(move || Ok(state.store.snapshot())).await.map(Json)
}

pub(super) async fn clear_captures(
    State(state): State<AppState>,
) -> Result<&'static str, ApiError> {
    on_blocking_pool(move || state.store.clear()).await?;
    tracing::info!(target: "store", "data cleared");
    Ok("Data Cleared")
}
