use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;

pub const DEFAULT_INIT_DATA_ENDPOINT: &str = "https://realsee.cn/api/getPageInitData";

/// Runtime settings: `config.toml`, then `PANOGRAB_*` environment overrides.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    /// SQLite (or other sqlx) URL for the record store. Defaults to the user's data dir.
    pub database_url: Option<String>,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Pause between two task state queries.
    pub poll_interval_ms: u64,
    pub init_data_endpoint: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            user_agent: format!("panograb/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 30,
            poll_interval_ms: 2000,
            init_data_endpoint: DEFAULT_INIT_DATA_ENDPOINT.to_string(),
        }
    }
}

impl Settings {
    /// Load from `path`, or from the default config file when it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        settings.apply_env();
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config: {}", path.display()))
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("PANOGRAB_DATABASE_URL") {
            if !url.trim().is_empty() { self.database_url = Some(url); }
        }
        if let Ok(ua) = std::env::var("PANOGRAB_USER_AGENT") { self.user_agent = ua; }
        if let Ok(ep) = std::env::var("PANOGRAB_INIT_DATA_ENDPOINT") { self.init_data_endpoint = ep; }
        self.request_timeout_secs = env_u64("PANOGRAB_REQUEST_TIMEOUT_SECS").unwrap_or(self.request_timeout_secs);
        self.poll_interval_ms = env_u64("PANOGRAB_POLL_INTERVAL_MS").unwrap_or(self.poll_interval_ms);
    }

    pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms.max(1)) }
}

fn env_u64(name: &str) -> Option<u64> { std::env::var(name).ok().and_then(|s| s.parse().ok()) }

pub fn project_dirs() -> Option<ProjectDirs> { ProjectDirs::from("dev", "panograb", "panograb") }

pub fn default_config_path() -> Option<PathBuf> { project_dirs().map(|p| p.config_dir().join("config.toml")) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "poll_interval_ms = 500\nuser_agent = \"test-agent\"\n").unwrap();
        let s = Settings::from_file(&path).unwrap();
        assert_eq!(s.poll_interval(), Duration::from_millis(500));
        assert_eq!(s.user_agent, "test-agent");
        assert_eq!(s.request_timeout_secs, 30);
        assert_eq!(s.init_data_endpoint, DEFAULT_INIT_DATA_ENDPOINT);
        assert!(s.database_url.is_none());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "poll_interval_ms = \"soon\"").unwrap();
        assert!(Settings::from_file(&path).is_err());
    }
}
