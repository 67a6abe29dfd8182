use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Local;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Durable store for small text records.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_text(&self, key: &str) -> Result<Option<String>>;
    async fn put_text(&self, key: &str, value: &str) -> Result<()>;
}

/// A kind of record kept under a fixed key, as JSON unless it says otherwise.
pub trait Record: Serialize + DeserializeOwned + Default {
    const KEY: &'static str;

    fn encode(&self) -> serde_json::Result<String> { serde_json::to_string(self) }

    fn decode(text: &str) -> serde_json::Result<Self> { serde_json::from_str(text) }
}

/// One submitted download, newest first in [`DownloadHistory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub file: String,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadHistory(pub Vec<HistoryEntry>);

impl Record for DownloadHistory {
    const KEY: &'static str = "VRFiles";
}

/// Last chosen save directory, stored as the bare path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadDir(pub String);

impl Record for DownloadDir {
    const KEY: &'static str = "VRDir";

    fn encode(&self) -> serde_json::Result<String> { Ok(self.0.clone()) }

    fn decode(text: &str) -> serde_json::Result<Self> { Ok(Self(text.to_string())) }
}

impl DownloadHistory {
    /// Put `files` on top, dropping older entries for the same paths.
    pub fn add(&mut self, files: &[String], date: &str, time: &str) {
        self.0.retain(|entry| !files.contains(&entry.file));
        for file in files {
            self.0.insert(0, HistoryEntry { file: file.clone(), date: date.to_string(), time: time.to_string() });
        }
    }

    pub fn remove(&mut self, file: &str) { self.0.retain(|entry| entry.file != file); }
}

/// Typed access over a [`Storage`]. Never fails: unreadable records come back
/// as their default and failed writes are only logged.
#[derive(Clone)]
pub struct RecordStore {
    storage: Arc<dyn Storage>,
}

impl RecordStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self { Self { storage } }

    pub async fn load<R: Record>(&self) -> R {
        match self.storage.get_text(R::KEY).await {
            Ok(Some(text)) if !text.is_empty() => R::decode(&text).unwrap_or_else(|e| {
                tracing::warn!("record {} is corrupt, using default: {e}", R::KEY);
                R::default()
            }),
            Ok(_) => R::default(),
            Err(e) => {
                tracing::warn!("reading record {} failed: {e:#}", R::KEY);
                R::default()
            }
        }
    }

    pub async fn save<R: Record>(&self, record: &R) {
        let text = match record.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("encoding record {} failed: {e}", R::KEY);
                return;
            }
        };
        if let Err(e) = self.storage.put_text(R::KEY, &text).await {
            tracing::warn!("writing record {} failed: {e:#}", R::KEY);
        }
    }

    /// Prepend `files` to the download history, stamped with the local time.
    pub async fn add_history(&self, files: &[String]) -> DownloadHistory {
        let now = Local::now();
        let mut history: DownloadHistory = self.load().await;
        history.add(files, &now.format("%Y-%m-%d").to_string(), &now.format("%H:%M:%S").to_string());
        self.save(&history).await;
        history
    }

    pub async fn remove_history(&self, file: &str) -> DownloadHistory {
        let mut history: DownloadHistory = self.load().await;
        history.remove(file);
        self.save(&history).await;
        history
    }
}
