use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use tempfile::NamedTempFile;

use crate::config::DirectoryConfig;

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub logs_dir: PathBuf,
    pub store_path: PathBuf,
}

pub fn ensure_directories(cfg: &DirectoryConfig) -> Result<ResolvedPaths> {
    let logs_dir = ensure_dir(&cfg.logs_dir)?;
    let data_dir = ensure_dir(&cfg.data_dir)?;

    // The store is replaced through a temp file beside it, so that is what gets checked.
    NamedTempFile::new_in(&data_dir)
        .with_context(|| format!("data directory {} is not writable", data_dir.display()))?;

    let store_path = data_dir.join(&cfg.store_filename);
    if store_path.is_dir() {
        bail!("store path {} is a directory", store_path.display());
    }
    Ok(ResolvedPaths {
        logs_dir,
        store_path,
    })
}

fn ensure_dir(path: &str) -> Result<PathBuf> {
    let dir = Path::new(path);
    fs::create_dir_all(dir).with_context(|| format!("failed to create directory {path}"))?;
    Ok(dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()))
}
