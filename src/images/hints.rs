use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HintFile {
    saved_at: DateTime<Utc>,
    urls: Vec<String>,
}

/// Image keys remembered between runs so the next start can warm the cache.
/// Purely advisory: a missing or unreadable file just means no hints.
#[derive(Debug, Clone)]
pub struct PreloadHints {
    path: PathBuf,
}

impl PreloadHints {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn save(&self, urls: &[String]) -> Result<()> {
        let file = HintFile {
            saved_at: Utc::now(),
            urls: urls.to_vec(),
        };
        let serialized = serde_json::to_string_pretty(&file)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write preload hints to {}", self.path.display()))?;
        log_info!("Saved {} preload hints", urls.len());
        Ok(())
    }

    pub fn load(&self) -> Vec<String> {
        if !self.path.exists() {
            return Vec::new();
        }

        let parsed = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read preload hints from {}", self.path.display()))
            .and_then(|contents| Ok(serde_json::from_str::<HintFile>(&contents)?));

        match parsed {
            Ok(file) => file.urls,
            Err(err) => {
                log_warn!("Ignoring preload hints: {:#}", err);
                Vec::new()
            }
        }
    }
}
