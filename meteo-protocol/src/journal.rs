//! Append-only payload journal
//!
//! Every raw payload sent or received can be appended to a per-direction
//! log file followed by a `----` separator line. Write failures are logged
//! and swallowed: the journal must never interrupt message flow.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::warn;

pub const ENTRY_SEPARATOR: &str = "----";

#[derive(Debug, Clone, Default)]
pub struct PayloadJournal {
    dir: Option<PathBuf>,
}

impl PayloadJournal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: Some(dir.into()) }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// Journal rooted at `dir` when present, disabled otherwise.
    pub fn from_option(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub async fn append(&self, file_name: &str, content: &str) {
        let Some(dir) = &self.dir else {
            return;
        };
        let path = dir.join(file_name);
        if let Err(e) = write_entry(dir, &path, content).await {
            warn!("journal write to {} failed: {}", path.display(), e);
        }
    }
}

async fn write_entry(dir: &Path, path: &Path, content: &str) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    let entry = format!("{content}\n{ENTRY_SEPARATOR}\n");
    file.write_all(entry.as_bytes()).await?;
    file.flush().await
}
