use std::{
    collections::BTreeMap,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::domain::StoreSnapshot;

pub mod exchanges;

/// Raw on-disk layout: subject to a list of not-yet-validated entries.
pub type RawSnapshot = BTreeMap<String, Vec<Value>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed store file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to replace {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

pub fn read_raw(path: &Path) -> Result<RawSnapshot, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(RawSnapshot::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&text).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Replaces the store file wholesale through a temp file in the same directory.
pub fn write_snapshot(path: &Path, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let body = serde_json::to_vec_pretty(snapshot).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(&body).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|source| StoreError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StoredExchange;
    use serde_json::json;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let raw = read_raw(&dir.path().join("absent.json")).unwrap();
        assert!(raw.is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(read_raw(&path), Err(StoreError::Json { .. })));
    }

    #[test]
    fn written_snapshot_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut snapshot = StoreSnapshot::new();
        snapshot.insert(
            "example.com".into(),
            vec![StoredExchange {
                id: "1".into(),
                match_reason: "RPC_BATCH".into(),
                url: "https://x/rpc".into(),
                request_body: json!([]),
                response_body: json!([]),
                timestamp: "2024-01-01T00:00:00.000Z".into(),
            }],
        );
        write_snapshot(&path, &snapshot).unwrap();

        let raw = read_raw(&path).unwrap();
        assert_eq!(raw["example.com"][0]["match"], "RPC_BATCH");
        assert_eq!(raw["example.com"][0]["requestBody"], json!([]));
    }
}
