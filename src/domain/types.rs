use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use super::capture::StoredExchange;

pub type StoreSnapshot = BTreeMap<String, Vec<StoredExchange>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Overview,
    Backlinks,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Overview => f.write_str("overview"),
            Phase::Backlinks => f.write_str("backlinks"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeCursor {
    pub index: usize,
    pub phase: Phase,
    pub endpoint: u32,
    pub session_active: bool,
}

impl ScrapeCursor {
    pub fn new(start_endpoint: u32) -> Self {
        Self {
            index: 0,
            phase: Phase::Overview,
            endpoint: start_endpoint,
            session_active: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub pending: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PageCommand {
    Navigate { url: String },
    ActivateEndpoint { id: u32 },
}
