use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use crate::config::Settings;

/// Source of raw page content.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Text of every script block on the page, in document order.
    async fn fetch_page_script(&self, url: &str) -> Result<Vec<String>>;

    /// Page title, or an empty string when it cannot be read.
    async fn fetch_page_title(&self, url: &str) -> String;

    /// Secondary lookup used by realsee.cn pages; `descriptor` is the query the page embedded.
    async fn fetch_page_init_data(&self, descriptor: &Value) -> Result<Value>;
}

/// [`PageFetcher`] over plain HTTP.
pub struct HttpPageFetcher {
    client: reqwest::Client,
    init_data_endpoint: String,
}

impl HttpPageFetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("building http client")?;
        Ok(Self { client, init_data_endpoint: settings.init_data_endpoint.clone() })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()?;
        Ok(resp.text().await?)
    }

    fn init_data_url(&self, descriptor: &Value) -> Result<Url> {
        let mut url = Url::parse(&self.init_data_endpoint)
            .with_context(|| format!("invalid init data endpoint: {}", self.init_data_endpoint))?;
        if let Some(fields) = descriptor.as_object() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in fields {
                match value {
                    Value::String(s) => pairs.append_pair(key, s),
                    other => pairs.append_pair(key, &other.to_string()),
                };
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page_script(&self, url: &str) -> Result<Vec<String>> {
        let html = self.get_text(url).await?;
        Ok(extract_scripts(&html))
    }

    async fn fetch_page_title(&self, url: &str) -> String {
        match self.get_text(url).await {
            Ok(html) => extract_title(&html),
            Err(e) => {
                tracing::warn!("fetching title of {url} failed: {e:#}");
                String::new()
            }
        }
    }

    async fn fetch_page_init_data(&self, descriptor: &Value) -> Result<Value> {
        let url = self.init_data_url(descriptor)?;
        tracing::debug!("requesting init data: {url}");
        let resp = self.client.get(url).send().await?.error_for_status()?;
        resp.json::<Value>().await.context("decoding init data response")
    }
}

// Html is not Send; keep parsing out of the async bodies.

pub fn extract_scripts(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("script") else { return Vec::new() };
    document.select(&selector).map(|script| script.inner_html()).collect()
}

pub fn extract_title(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("title") else { return String::new() };
    document
        .select(&selector)
        .next()
        .map(|title| title.inner_html().trim().to_string())
        .unwrap_or_default()
}
