use std::path::PathBuf;

use parking_lot::Mutex;
use serde_json::Value;

use super::{read_raw, write_snapshot, RawSnapshot, StoreError};
use crate::{
    domain::{StoreSnapshot, StoredExchange},
    pipeline::{classify, Whitelist},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub kept: usize,
    pub removed: usize,
}

/// Every mutation rewrites the file while holding the lock; callers on the
/// async runtime go through the blocking pool.
pub struct ExchangeRepository {
    path: PathBuf,
    data: Mutex<StoreSnapshot>,
}

impl ExchangeRepository {
    /// Loads the file and drops every entry the current whitelist rejects.
    ///
    /// An unreadable file is logged and treated as empty; it is left on disk
    /// until the next write replaces it.
    pub fn open(path: PathBuf, whitelist: &Whitelist) -> Result<(Self, ReloadReport), StoreError> {
        tracing::info!(
            target: "store",
            path = %path.display(),
            "loading and re-filtering stored exchanges"
        );

        let raw = match read_raw(&path) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!(
                    target: "store",
                    error = %err,
                    "failed to load store; starting empty"
                );
                RawSnapshot::new()
            }
        };

        let (data, report) = refilter(raw, whitelist);
        tracing::info!(
            target: "store",
            kept = report.kept,
            removed = report.removed,
            "store re-filter complete"
        );

        let repo = Self {
            path,
            data: Mutex::new(data),
        };
        if report.removed > 0 {
            write_snapshot(&repo.path, &repo.data.lock())?;
        }
        Ok((repo, report))
    }

    pub fn record(&self, subject: &str, exchange: StoredExchange) -> Result<(), StoreError> {
        let mut data = self.data.lock();
        data.entry(subject.to_string()).or_default().push(exchange);
        write_snapshot(&self.path, &data)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.data.lock().clone()
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        let mut data = self.data.lock();
        data.clear();
        write_snapshot(&self.path, &data)
    }

    pub fn len(&self) -> usize {
        self.data.lock().values().map(Vec::len).sum()
    }

    #[cfg(test)]
    pub(crate) fn lock(&self) -> parking_lot::MutexGuard<'_, StoreSnapshot> {
        self.data.lock()
    }
}

fn refilter(raw: RawSnapshot, whitelist: &Whitelist) -> (StoreSnapshot, ReloadReport) {
    let mut report = ReloadReport::default();
    let mut data = StoreSnapshot::new();

    for (subject, entries) in raw {
        let mut kept = Vec::with_capacity(entries.len());
        for entry in entries {
            match revalidate(entry, whitelist) {
                Some(exchange) => kept.push(exchange),
                None => report.removed += 1,
            }
        }
        if !kept.is_empty() {
            report.kept += kept.len();
            data.insert(subject, kept);
        }
    }
    (data, report)
}

fn revalidate(entry: Value, whitelist: &Whitelist) -> Option<StoredExchange> {
    let mut exchange: StoredExchange = serde_json::from_value(entry).ok()?;
    let accepted = classify(
        whitelist,
        &exchange.url,
        &exchange.request_body,
        &exchange.response_body,
    )
    .accepted()?;
    exchange.request_body = accepted.request;
    exchange.response_body = accepted.response;
    exchange.match_reason = accepted.reason.to_string();
    Some(exchange)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::CaptureEvent, pipeline::classify_event};
    use serde_json::json;
    use std::fs;

    fn exchange(url: &str, request: Value, response: Value) -> Value {
        json!({
            "id": "1700000000000abc",
            "match": "stale",
            "url": url,
            "requestBody": request,
            "responseBody": response,
            "timestamp": "2024-01-01T00:00:00.000Z"
        })
    }

    #[test]
    fn reload_drops_entries_the_whitelist_no_longer_accepts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rpc_data.json");
        let raw = json!({
            "example.com": [
                exchange(
                    "https://x/rpc",
                    json!([{"method": "backlinks.Summary", "id": "1"}]),
                    json!([{"id": "1"}])
                ),
                exchange("https://x/y?action=invite-button", Value::Null, Value::Null)
            ],
            "junk.example": [
                exchange("https://x/rpc", json!({"method": "currency.Rates"}), Value::Null),
                json!({"not": "an exchange"})
            ]
        });
        fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

        let (repo, report) =
            ExchangeRepository::open(path.clone(), &Whitelist::default()).unwrap();
        assert_eq!(report, ReloadReport { kept: 1, removed: 3 });

        let snapshot = repo.snapshot();
        assert_eq!(snapshot.len(), 1);
        let kept = &snapshot["example.com"][0];
        assert_eq!(kept.match_reason, "RPC_BATCH");
        assert_eq!(kept.id, "1700000000000abc");

        let on_disk = read_raw(&path).unwrap();
        assert!(!on_disk.contains_key("junk.example"));
        assert_eq!(on_disk["example.com"].len(), 1);
    }

    #[test]
    fn reload_is_a_fixed_point_for_pipeline_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rpc_data.json");
        let whitelist = Whitelist::default();

        let (repo, _) = ExchangeRepository::open(path.clone(), &whitelist).unwrap();
        let events = [
            CaptureEvent::new(
                "https://x/rpc",
                json!(r#"[{"method":"organic.OverviewTrend","id":"t"},{"method":"x.Y","id":"u"}]"#),
                json!([{"id": "t", "result": [{"traffic": 0}, {"traffic": 3}]}, {"id": "u"}]),
            ),
            CaptureEvent::new("https://x/?action=report", json!("raw"), Value::Null),
            CaptureEvent::new(
                "https://x/rpc",
                json!({"method": "backlinks.Overview", "params": {"searchItem": "a.example"}}),
                json!({"result": {}}),
            ),
        ];
        for event in &events {
            let accepted = classify_event(&whitelist, event).accepted().unwrap();
            let stored = StoredExchange::from_accepted(event.url.clone(), accepted, None);
            repo.record("a.example", stored).unwrap();
        }
        let before = repo.snapshot();
        drop(repo);

        let (reloaded, report) = ExchangeRepository::open(path, &whitelist).unwrap();
        assert_eq!(report, ReloadReport { kept: 3, removed: 0 });
        assert_eq!(reloaded.snapshot(), before);
    }

    #[test]
    fn corrupt_file_starts_empty_and_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rpc_data.json");
        fs::write(&path, "garbage").unwrap();

        let (repo, report) =
            ExchangeRepository::open(path.clone(), &Whitelist::default()).unwrap();
        assert_eq!(report, ReloadReport::default());
        assert_eq!(repo.len(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "garbage");
    }

    #[test]
    fn record_and_clear_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rpc_data.json");
        let (repo, _) = ExchangeRepository::open(path.clone(), &Whitelist::default()).unwrap();

        let accepted = classify(
            &Whitelist::default(),
            "https://x/?action=report",
            &Value::Null,
            &Value::Null,
        )
        .accepted()
        .unwrap();
        let url = "https://x/?action=report";
        for _ in 0..2 {
            let stored = StoredExchange::from_accepted(url.into(), accepted.clone(), None);
            repo.record("b.example", stored).unwrap();
        }
        assert_eq!(read_raw(&path).unwrap()["b.example"].len(), 2);

        repo.clear().unwrap();
        assert!(repo.snapshot().is_empty());
        assert!(read_raw(&path).unwrap().is_empty());
    }
}
