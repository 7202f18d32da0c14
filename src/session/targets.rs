use crate::{config::SessionConfig, domain::Phase};

const OVERVIEW_PAGE: &str = "/analytics/overview/";
const BACKLINKS_PAGE: &str = "/analytics/backlinks/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Portal,
    Login,
    TargetSite,
    Other,
}

#[derive(Debug, Clone)]
pub struct SiteMap {
    pub portal_url: String,
    portal_marker: String,
    login_marker: String,
    endpoint_base_template: String,
    target_site_markers: Vec<String>,
}

impl SiteMap {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            portal_url: config.portal_url.clone(),
            portal_marker: config.portal_marker.clone(),
            login_marker: config.login_marker.clone(),
            endpoint_base_template: config.endpoint_base_template.clone(),
            target_site_markers: config.target_site_markers.clone(),
        }
    }

    pub fn classify(&self, url: &str) -> PageKind {
        if url.contains(&self.portal_marker) {
            PageKind::Portal
        } else if url.contains(&self.login_marker) {
            PageKind::Login
        } else if self.target_site_markers.iter().any(|m| url.contains(m.as_str())) {
            PageKind::TargetSite
        } else {
            PageKind::Other
        }
    }

    pub fn endpoint_base(&self, endpoint: u32) -> String {
        self.endpoint_base_template
            .replace("{id}", &endpoint.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn endpoint_host(&self, endpoint: u32) -> String {
        let base = self.endpoint_base(endpoint);
        base.split_once("://")
            .map(|(_, host)| host.to_string())
            .unwrap_or(base)
    }

    pub fn report_url(&self, subject: &str, phase: Phase, endpoint: u32) -> String {
        let base = self.endpoint_base(endpoint);
        let subject = normalize_subject(subject);
        match phase {
            Phase::Overview => {
                format!("{base}{OVERVIEW_PAGE}?searchType=domain&q={subject}")
            }
            Phase::Backlinks => format!(
                "{base}/analytics/backlinks/refdomains/?q={subject}&searchType=domain&ba_as=%5B10%2C100%5D"
            ),
        }
    }

    pub fn is_report_page(&self, url: &str, phase: Phase) -> bool {
        match phase {
            Phase::Overview => url.contains(OVERVIEW_PAGE),
            Phase::Backlinks => url.contains(BACKLINKS_PAGE),
        }
    }
}

/// Strips a leading scheme and one trailing slash.
pub fn normalize_subject(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    without_scheme.strip_suffix('/').unwrap_or(without_scheme)
}
