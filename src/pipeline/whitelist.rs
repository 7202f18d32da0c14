/// Gate tables for the classification pipeline.
///
/// Gate A admits any exchange whose URL contains one of `url_markers`.
/// Gate B admits RPC calls whose `method` is listed in `rpc_methods`.
/// Responses to `trend_methods` are trend-cleaned before storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Whitelist {
    pub url_markers: Vec<String>,
    pub rpc_methods: Vec<String>,
    pub trend_methods: Vec<String>,
}

impl Default for Whitelist {
    fn default() -> Self {
        Self {
            url_markers: to_strings(&[
                "/backlinks/webapi2/overview/init",
                "/backlinks/webapi2/overview/counters",
                "type=backlinks_refdomains",
                "action=report",
            ]),
            rpc_methods: to_strings(&[
                "backlinks.Summary",
                "organic.CompetitorsOverview",
                "backlinks.Overview",
                "organic.OverviewTrend",
            ]),
            trend_methods: to_strings(&["organic.OverviewTrend"]),
        }
    }
}

impl Whitelist {
    /// First configured marker contained in `url`, in table order.
    pub fn url_marker(&self, url: &str) -> Option<&str> {
        if url.is_empty() {
            return None;
        }
        self.url_markers
            .iter()
            .map(String::as_str)
            .find(|marker| url.contains(marker))
    }

    pub fn allows_method(&self, method: &str) -> bool {
        self.rpc_methods.iter().any(|m| m == method)
    }

    pub fn is_trend_method(&self, method: &str) -> bool {
        self.trend_methods.iter().any(|m| m == method)
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_marker_uses_table_order() {
        let whitelist = Whitelist::default();
        let url = "https://x/backlinks/webapi2/overview/init?action=report";
        assert_eq!(
            whitelist.url_marker(url),
            Some("/backlinks/webapi2/overview/init")
        );
        assert_eq!(whitelist.url_marker("https://x/y?action=invite-button"), None);
        assert_eq!(whitelist.url_marker(""), None);
    }

    #[test]
    fn method_lookup_is_exact() {
        let whitelist = Whitelist::default();
        assert!(whitelist.allows_method("backlinks.Summary"));
        assert!(!whitelist.allows_method("backlinks.summary"));
        assert!(!whitelist.allows_method("currency.Rates"));
        assert!(whitelist.is_trend_method("organic.OverviewTrend"));
        assert!(!whitelist.is_trend_method("backlinks.Summary"));
    }

    #[test]
    fn tables_can_be_replaced() {
        let whitelist = Whitelist {
            url_markers: vec!["/only".into()],
            rpc_methods: vec!["a.B".into()],
            trend_methods: Vec::new(),
        };
        assert_eq!(whitelist.url_marker("https://x/only/this"), Some("/only"));
        assert!(whitelist.url_marker("https://x/?action=report").is_none());
        assert!(whitelist.allows_method("a.B"));
    }
}
