use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One network exchange observed inside a browsed page.
///
/// Bodies are kept as whatever the hook delivered: structured JSON, a raw
/// string, or `null`.
#[derive(Debug, Clone)]
pub struct CaptureEvent {
    pub url: String,
    pub request_body: Value,
    pub response_body: Value,
    pub observed_at: DateTime<Utc>,
}

impl CaptureEvent {
    pub fn new(url: impl Into<String>, request_body: Value, response_body: Value) -> Self {
        Self {
            url: url.into(),
            request_body,
            response_body,
            observed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub url: String,
    #[serde(default)]
    pub request_body: Value,
    #[serde(default)]
    pub response_body: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl CapturePayload {
    pub fn event(&self) -> CaptureEvent {
        CaptureEvent::new(
            self.url.clone(),
            self.request_body.clone(),
            self.response_body.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchReason {
    Url(String),
    RpcBatch,
    Rpc(String),
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchReason::Url(marker) => write!(f, "URL:{marker}"),
            MatchReason::RpcBatch => f.write_str("RPC_BATCH"),
            MatchReason::Rpc(method) => write!(f, "RPC:{method}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
    pub request: Value,
    pub response: Value,
    pub reason: MatchReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationResult {
    Rejected,
    Accepted(Accepted),
}

impl ClassificationResult {
    pub fn accepted(self) -> Option<Accepted> {
        match self {
            ClassificationResult::Accepted(accepted) => Some(accepted),
            ClassificationResult::Rejected => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredExchange {
    pub id: String,
    #[serde(rename = "match", alias = "matchReason")]
    pub match_reason: String,
    pub url: String,
    #[serde(default)]
    pub request_body: Value,
    #[serde(default)]
    pub response_body: Value,
    pub timestamp: String,
}

impl StoredExchange {
    pub fn from_accepted(url: String, accepted: Accepted, timestamp: Option<String>) -> Self {
        Self {
            id: next_exchange_id(),
            match_reason: accepted.reason.to_string(),
            url,
            request_body: accepted.request,
            response_body: accepted.response,
            timestamp: timestamp.unwrap_or_else(now_iso8601),
        }
    }
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_exchange_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{millis}{}", to_base36(seq ^ (u64::from(std::process::id()) << 32)))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
