use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{json_error, ApiError, AppState};
use crate::{
    domain::{capture::now_iso8601, CapturePayload, PageCommand},
    session::{SessionEvent, SessionStatus},
    tasks::driver::RelayError,
};

#[derive(Debug, Deserialize)]
pub(super) struct PageLoaded {
    url: String,
}

#[derive(Debug, Serialize)]
pub(super) struct Ack {
    ok: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RelayStatus {
    session: Option<SessionStatus>,
    pending_commands: usize,
}

fn deliver(state: &AppState, event: SessionEvent) -> Result<(), RelayError> {
    state
        .session
        .as_ref()
        .ok_or(RelayError::SessionDisabled)?
        .send(event)
}

fn deliver_or_unavailable(
    state: &AppState,
    event: SessionEvent,
) -> Result<(StatusCode, Json<Ack>), ApiError> {
    deliver(state, event).map_err(|err| {
        tracing::warn!(target: "relay", error = %err, "dropping page event");
        json_error(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
    })?;
    Ok((StatusCode::ACCEPTED, Json(Ack { ok: true })))
}

pub(super) async fn page_loaded(
    State(state): State<AppState>,
    body: Result<Json<PageLoaded>, JsonRejection>,
) -> Result<(StatusCode, Json<Ack>), ApiError> {
    let Json(PageLoaded { url }) =
        body.map_err(|rejection| json_error(StatusCode::BAD_REQUEST, rejection.body_text()))?;
    tracing::info!(target: "relay", url = %url, "page loaded");
    deliver_or_unavailable(&state, SessionEvent::PageLoaded { url })
}

pub(super) async fn login_confirmed(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Ack>), ApiError> {
    deliver_or_unavailable(&state, SessionEvent::LoginConfirmed)
}

pub(super) async fn relay_capture(
    State(state): State<AppState>,
    body: Result<Json<CapturePayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Ack>), ApiError> {
    let Json(mut payload) =
        body.map_err(|rejection| json_error(StatusCode::BAD_REQUEST, rejection.body_text()))?;

    if state.session.is_some() {
        let event = SessionEvent::CaptureArrived {
            subject: payload.domain.clone(),
            url: payload.url.clone(),
        };
        if let Err(err) = deliver(&state, event) {
            tracing::warn!(target: "relay", error = %err, "capture not seen by session");
        }
    }

    tracing::debug!(
        target: "relay",
        url = %payload.url,
        domain = payload.domain.as_deref().unwrap_or("-"),
        "capture relayed"
    );
    payload.timestamp.get_or_insert_with(now_iso8601);
    state.forwarder.forward(payload);
    Ok((StatusCode::ACCEPTED, Json(Ack { ok: true })))
}

pub(super) async fn take_commands(State(state): State<AppState>) -> Json<Vec<PageCommand>> {
    Json(state.commands.drain())
}

pub(super) async fn status(State(state): State<AppState>) -> Json<RelayStatus> {
    Json(RelayStatus {
        session: state.session.as_ref().map(|s| s.status()),
        pending_commands: state.commands.snapshot().pending,
    })
}
