//! JSON file persistence for snapshot sets and page captures.
//!
//! Snapshot history is append-only under timestamped names; nothing prunes
//! it. A fixed "latest" alias is overwritten each run so the most recent set
//! is readable without scanning the directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Timestamped snapshot files plus a fixed latest alias.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    prefix: String,
    latest_name: String,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: &str, latest_name: &str) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.to_string(),
            latest_name: latest_name.to_string(),
        }
    }

    /// `{prefix}-{ISO8601 with ':' and '.' replaced by '-'}.json`. The
    /// substitution keeps the name filesystem-safe while staying
    /// lexicographically time-ordered, which `load_previous` relies on.
    fn timestamped_name(&self, at: DateTime<Utc>) -> String {
        let stamp = at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        format!("{}-{stamp}.json", self.prefix)
    }

    /// Writes the timestamped file and overwrites the latest alias with the
    /// same body. Returns the timestamped path.
    pub fn save<T: Serialize>(&self, data: &T, at: DateTime<Utc>) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let body = serde_json::to_vec_pretty(data)?;

        let path = self.dir.join(self.timestamped_name(at));
        fs::write(&path, &body)?;
        fs::write(self.dir.join(&self.latest_name), &body)?;
        Ok(path)
    }

    /// Loads the latest alias. A missing file is a normal first run; a
    /// malformed file degrades to "no previous data" rather than failing
    /// the comparison step.
    pub fn load_latest<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.read_degrading(&self.dir.join(&self.latest_name))
    }

    /// The baseline for an on-demand comparison: second entry of the
    /// reverse-sorted timestamped listing. Fragile under concurrent writes
    /// or file deletion, preserved as-is for compatibility.
    pub fn load_previous<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let names = self.list()?;
        let Some(name) = names.get(1) else {
            return Ok(None);
        };
        self.read_degrading(&self.dir.join(name))
    }

    /// Timestamped snapshot names, newest first.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let wanted_prefix = format!("{}-", self.prefix);
        let mut names: Vec<String> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| {
                name.starts_with(&wanted_prefix)
                    && name.ends_with(".json")
                    && *name != self.latest_name
            })
            .collect();
        names.sort();
        names.reverse();
        Ok(names)
    }

    fn read_degrading<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(data) => Ok(Some(data)),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "malformed snapshot file, treating as no previous data");
                Ok(None)
            }
        }
    }
}

/// Fixed `current.json`/`previous.json` pair for the generic page scraper.
#[derive(Debug, Clone)]
pub struct RollingStore {
    dir: PathBuf,
}

const CURRENT_FILE: &str = "current.json";
const PREVIOUS_FILE: &str = "previous.json";

impl RollingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Moves the current capture to the previous slot, writes the new one,
    /// and returns the displaced baseline (None on the first run or when
    /// the old file is unreadable).
    pub fn rotate_and_save<T: Serialize + DeserializeOwned>(
        &self,
        data: &T,
    ) -> Result<Option<T>> {
        fs::create_dir_all(&self.dir)?;

        let displaced = self.load_current()?;
        if let Some(ref old) = displaced {
            fs::write(
                self.dir.join(PREVIOUS_FILE),
                serde_json::to_vec_pretty(old)?,
            )?;
        }
        fs::write(self.dir.join(CURRENT_FILE), serde_json::to_vec_pretty(data)?)?;
        Ok(displaced)
    }

    pub fn load_current<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.read_degrading(&self.dir.join(CURRENT_FILE))
    }

    pub fn load_previous<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.read_degrading(&self.dir.join(PREVIOUS_FILE))
    }

    fn read_degrading<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(data) => Ok(Some(data)),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "malformed page capture, ignoring");
                Ok(None)
            }
        }
    }
}
