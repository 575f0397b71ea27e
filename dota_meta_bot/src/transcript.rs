//! A bounded, append-only log of what people sent the bot, kept as one
//! JSON file for admins to look through.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("transcript I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("transcript serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("transcript writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<u64>,
    pub username: String,
    pub text: String,
}

#[derive(Debug)]
pub struct Transcript {
    path: PathBuf,
    cap: usize,
    entries: Mutex<Vec<TranscriptEntry>>,
}

impl Transcript {
    /// Load the transcript at `path`. A missing, empty or unreadable file
    /// is just an empty transcript; it gets overwritten on the next append.
    pub fn load(path: impl Into<PathBuf>, cap: usize) -> Self {
        let path = path.into();

        let mut entries = match read_entries(&path) {
            Ok(x) => x,
            Err(TranscriptError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("No transcript at {}, starting fresh.", path.display());
                Vec::new()
            }
            Err(e) => {
                log::warn!(
                    "Could not read transcript at {}, starting fresh: {}",
                    path.display(),
                    e
                );
                Vec::new()
            }
        };

        trim_to_cap(&mut entries, cap);

        Self {
            path,
            cap,
            entries: Mutex::new(entries),
        }
    }

    pub async fn append(&self, entry: TranscriptEntry) -> Result<(), TranscriptError> {
        let mut entries = self.entries.lock().await;
        entries.push(entry);
        trim_to_cap(&mut entries, self.cap);
        self.save(&entries).await
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// The last `count` entries, oldest first.
    pub async fn recent(&self, count: usize) -> Vec<TranscriptEntry> {
        let entries = self.entries.lock().await;
        entries[entries.len().saturating_sub(count)..].to_vec()
    }

    pub async fn clear(&self) -> Result<(), TranscriptError> {
        let mut entries = self.entries.lock().await;
        entries.clear();
        self.save(&entries).await
    }

    /// Serialize here, write on the blocking pool. Callers hold the lock
    /// for the whole write, so writes land in order.
    async fn save(&self, entries: &[TranscriptEntry]) -> Result<(), TranscriptError> {
        let data = serde_json::to_vec_pretty(entries)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_file(&path, &data)).await?
    }
}

fn trim_to_cap(entries: &mut Vec<TranscriptEntry>, cap: usize) {
    if entries.len() > cap {
        let excess = entries.len() - cap;
        entries.drain(..excess);
    }
}

fn read_entries(path: &Path) -> Result<Vec<TranscriptEntry>, TranscriptError> {
    let data = fs::read_to_string(path)?;
    if data.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&data)?)
}

/// Write through a temp file in the same directory, so a crash mid-write
/// leaves the old file intact.
fn write_file(path: &Path, data: &[u8]) -> Result<(), TranscriptError> {
    let dir = match path.parent() {
        Some(x) if !x.as_os_str().is_empty() => x,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(data)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
