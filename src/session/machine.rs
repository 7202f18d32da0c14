use std::time::Duration;

use serde::Serialize;

use super::targets::{PageKind, SiteMap};
use crate::{
    config::SessionConfig,
    domain::{Phase, ScrapeCursor},
    pipeline::UNKNOWN_SUBJECT,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Start,
    PageLoaded { url: String },
    LoginConfirmed,
    CaptureArrived { subject: Option<String>, url: String },
    PortalReady,
    SettleElapsed,
    TimerFired { generation: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Navigate { url: String },
    ActivateEndpoint { id: u32 },
    /// Cancel any pending arrival timer, then arm a new one.
    ArmTimer { generation: u64, after: Duration },
    CancelTimer,
    Schedule { after: Duration, event: SessionEvent },
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    NeedsAuth,
    Navigating { target: String },
    AwaitingData { phase: Phase },
    Done,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::NeedsAuth => "needs_auth",
            SessionState::Navigating { .. } => "navigating",
            SessionState::AwaitingData { .. } => "awaiting_data",
            SessionState::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub state: &'static str,
    pub cursor: ScrapeCursor,
    pub worklist_len: usize,
    pub data_received: bool,
    pub recoveries: u64,
}

/// Navigation and recovery state machine for one scrape session.
///
/// `handle` is the only entry point; it never blocks and never performs I/O.
pub struct SessionMachine {
    worklist: Vec<String>,
    sites: SiteMap,
    endpoint_pool_size: u32,
    arrival_timeout: Duration,
    settle_delay: Duration,
    portal_delay: Duration,
    liveness_url_markers: Vec<String>,
    cursor: ScrapeCursor,
    state: SessionState,
    data_received: bool,
    timer_generation: u64,
    recoveries: u64,
}

impl SessionMachine {
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_cursor(config, ScrapeCursor::new(config.start_endpoint))
    }

    pub fn with_cursor(config: &SessionConfig, cursor: ScrapeCursor) -> Self {
        Self {
            worklist: config.worklist.clone(),
            sites: SiteMap::from_config(config),
            endpoint_pool_size: config.endpoint_pool_size.max(1),
            arrival_timeout: config.arrival_timeout,
            settle_delay: config.settle_delay,
            portal_delay: config.portal_delay,
            liveness_url_markers: config.liveness_url_markers.clone(),
            cursor,
            state: SessionState::Idle,
            data_received: false,
            timer_generation: 0,
            recoveries: 0,
        }
    }

    pub fn cursor(&self) -> &ScrapeCursor {
        &self.cursor
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state.name(),
            cursor: self.cursor.clone(),
            worklist_len: self.worklist.len(),
            data_received: self.data_received,
            recoveries: self.recoveries,
        }
    }

    pub fn handle(&mut self, event: SessionEvent) -> Vec<Command> {
        if self.state == SessionState::Done {
            return Vec::new();
        }

        match event {
            SessionEvent::Start => self.step(),
            SessionEvent::PageLoaded { url } => self.on_page_loaded(&url),
            SessionEvent::LoginConfirmed => {
                tracing::info!(target: "session", "login confirmed; heading to portal");
                vec![Command::Navigate {
                    url: self.sites.portal_url.clone(),
                }]
            }
            SessionEvent::CaptureArrived { subject, url } => {
                self.on_capture(subject.as_deref(), &url);
                Vec::new()
            }
            SessionEvent::PortalReady => self.on_portal_ready(),
            SessionEvent::SettleElapsed => {
                if self.cursor.session_active {
                    self.step()
                } else {
                    Vec::new()
                }
            }
            SessionEvent::TimerFired { generation } => self.on_timer(generation),
        }
    }

    fn step(&mut self) -> Vec<Command> {
        if !self.cursor.session_active {
            tracing::info!(
                target: "session",
                endpoint = self.cursor.endpoint,
                "session inactive; navigating to portal"
            );
            self.state = SessionState::NeedsAuth;
            return vec![Command::Navigate {
                url: self.sites.portal_url.clone(),
            }];
        }
        self.dispatch()
    }

    fn dispatch(&mut self) -> Vec<Command> {
        let Some(subject) = self.worklist.get(self.cursor.index) else {
            tracing::info!(
                target: "session",
                processed = self.worklist.len(),
                "all subjects processed"
            );
            self.state = SessionState::Done;
            return vec![Command::CancelTimer, Command::Finished];
        };

        let url = self
            .sites
            .report_url(subject, self.cursor.phase, self.cursor.endpoint);
        tracing::info!(
            target: "session",
            subject = %subject,
            position = self.cursor.index + 1,
            total = self.worklist.len(),
            phase = %self.cursor.phase,
            endpoint = self.cursor.endpoint,
            url = %url,
            "dispatching report page"
        );
        self.state = SessionState::Navigating {
            target: url.clone(),
        };
        vec![Command::Navigate { url }]
    }

    fn on_page_loaded(&mut self, url: &str) -> Vec<Command> {
        match self.sites.classify(url) {
            PageKind::Portal => {
                if self.cursor.session_active {
                    tracing::warn!(
                        target: "session",
                        "landed on portal with an active session; resetting"
                    );
                    self.cursor.session_active = false;
                }
                self.state = SessionState::NeedsAuth;
                vec![Command::Schedule {
                    after: self.portal_delay,
                    event: SessionEvent::PortalReady,
                }]
            }
            PageKind::Login => {
                tracing::info!(target: "session", "login page loaded; waiting for page layer");
                Vec::new()
            }
            PageKind::TargetSite => self.on_target_site(url),
            PageKind::Other => Vec::new(),
        }
    }

    fn on_target_site(&mut self, url: &str) -> Vec<Command> {
        let expected_host = self.sites.endpoint_host(self.cursor.endpoint);
        if !url.contains(&expected_host) {
            tracing::warn!(
                target: "session",
                url = %url,
                expected = %expected_host,
                "target site loaded on an unexpected host"
            );
        }

        if !self.cursor.session_active {
            tracing::info!(
                target: "session",
                endpoint = self.cursor.endpoint,
                "first arrival after portal; session active"
            );
            self.cursor.session_active = true;
            return vec![Command::Schedule {
                after: self.settle_delay,
                event: SessionEvent::SettleElapsed,
            }];
        }

        let phase = self.cursor.phase;
        if !self.sites.is_report_page(url, phase) {
            tracing::debug!(
                target: "session",
                url = %url,
                phase = %phase,
                "page does not match current phase; waiting for navigation"
            );
            return Vec::new();
        }

        self.state = SessionState::AwaitingData { phase };
        self.data_received = false;
        self.timer_generation += 1;
        tracing::info!(
            target: "timer",
            phase = %phase,
            generation = self.timer_generation,
            timeout_secs = self.arrival_timeout.as_secs_f64(),
            "report page loaded; waiting for data"
        );
        vec![Command::ArmTimer {
            generation: self.timer_generation,
            after: self.arrival_timeout,
        }]
    }

    fn on_portal_ready(&mut self) -> Vec<Command> {
        if self.state != SessionState::NeedsAuth {
            return Vec::new();
        }
        tracing::info!(
            target: "session",
            endpoint = self.cursor.endpoint,
            "requesting endpoint activation"
        );
        vec![Command::ActivateEndpoint {
            id: self.cursor.endpoint,
        }]
    }

    fn on_capture(&mut self, subject: Option<&str>, url: &str) {
        if !matches!(self.state, SessionState::AwaitingData { .. }) {
            return;
        }
        if self.is_live_capture(subject, url) {
            self.data_received = true;
        }
    }

    fn is_live_capture(&self, subject: Option<&str>, url: &str) -> bool {
        let unknown = subject.map_or(true, |s| s.is_empty() || s == UNKNOWN_SUBJECT);
        !unknown
            || self
                .liveness_url_markers
                .iter()
                .any(|marker| url.contains(marker.as_str()))
    }

    fn on_timer(&mut self, generation: u64) -> Vec<Command> {
        if generation != self.timer_generation {
            tracing::debug!(target: "timer", generation, "ignoring stale timer");
            return Vec::new();
        }

        if self.data_received {
            tracing::info!(target: "timer", generation, "data received; advancing");
            self.advance()
        } else {
            tracing::warn!(target: "timer", generation, "no data before timeout; recovering");
            self.recover()
        }
    }

    fn advance(&mut self) -> Vec<Command> {
        match self.cursor.phase {
            Phase::Overview => {
                self.cursor.phase = Phase::Backlinks;
            }
            Phase::Backlinks => {
                self.cursor.index += 1;
                self.cursor.phase = Phase::Overview;
            }
        }
        self.step()
    }

    fn recover(&mut self) -> Vec<Command> {
        let previous = self.cursor.endpoint;
        self.cursor.endpoint = (previous % self.endpoint_pool_size) + 1;
        self.cursor.session_active = false;
        self.recoveries += 1;
        tracing::warn!(
            target: "session",
            from = previous,
            to = self.cursor.endpoint,
            recoveries = self.recoveries,
            "rotating endpoint; re-authentication required"
        );
        self.step()
    }
}
