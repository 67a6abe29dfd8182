use std::sync::Arc;

use serde::Serialize;

use crate::error::ResolveError;
use crate::fetcher::PageFetcher;
use crate::locate::locate;
use crate::normalize::normalize;
use crate::parse::{parse, work_from_init_data, SceneSource};
use crate::types::{RawWork, WorkDescriptor};
use crate::variant::classify;

/// Pre-filled submission form for one resolved page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadDraft {
    /// Page title, suggested as the destination name.
    pub save_name: String,
    pub manifest_json: String,
}

/// Turns a page URL into a [`WorkDescriptor`]. One best-effort attempt per call, no retries.
#[derive(Clone)]
pub struct Resolver {
    fetcher: Arc<dyn PageFetcher>,
}

impl Resolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self { Self { fetcher } }

    pub fn fetcher(&self) -> &Arc<dyn PageFetcher> { &self.fetcher }

    /// Resolve `url`, keeping the cause of any failure.
    pub async fn resolve(&self, url: &str) -> Result<WorkDescriptor, ResolveError> {
        let lines = match self.fetcher.fetch_page_script(url).await {
            Ok(lines) if !lines.is_empty() => lines,
            Ok(_) => return Err(ResolveError::Fetch(url.to_string())),
            Err(e) => {
                tracing::debug!("page fetch for {url} failed: {e:#}");
                return Err(ResolveError::Fetch(url.to_string()));
            }
        };
        let variant = classify(url).ok_or_else(|| ResolveError::Classification(url.to_string()))?;
        tracing::debug!("{url} classified as {variant}, {} script blocks", lines.len());

        let payload = locate(&lines, variant).ok_or(ResolveError::PayloadNotFound(variant))?;
        let raw = match parse(variant, payload)? {
            SceneSource::Embedded(work) => *work,
            SceneSource::InitQuery(query) => self.init_data_work(&query).await?,
        };
        Ok(normalize(raw)?)
    }

    /// Resolve `url`; every failure collapses to `None` after being logged.
    pub async fn resolve_work_json(&self, url: &str) -> Option<WorkDescriptor> {
        match self.resolve(url).await {
            Ok(work) => Some(work),
            Err(e) => {
                tracing::warn!("resolving {url} failed: {e}");
                None
            }
        }
    }

    /// Resolve `url` and pair the manifest with the page title.
    pub async fn resolve_draft(&self, url: &str) -> Option<DownloadDraft> {
        let work = self.resolve_work_json(url).await?;
        let manifest_json = match serde_json::to_string(&work) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("encoding manifest for {url} failed: {e}");
                return None;
            }
        };
        let save_name = self.fetcher.fetch_page_title(url).await;
        Some(DownloadDraft { save_name, manifest_json })
    }

    async fn init_data_work(&self, query: &serde_json::Value) -> Result<RawWork, ResolveError> {
        match self.fetcher.fetch_page_init_data(query).await {
            Ok(response) => work_from_init_data(response),
            Err(e) => {
                tracing::debug!("init data request failed: {e:#}");
                Err(ResolveError::EmptyScene)
            }
        }
    }
}
