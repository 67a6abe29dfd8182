pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod locate;
pub mod normalize;
pub mod parse;
pub mod poller;
pub mod resolver;
pub mod storage;
pub mod tasks;
pub mod types;
pub mod variant;

// --- Library API for embedding ---

/// Convenience re-exports for embedders.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::error::{ResolveError, SubmitError};
    pub use crate::fetcher::{HttpPageFetcher, PageFetcher};
    pub use crate::poller::{TaskPoller, TaskSnapshot};
    pub use crate::resolver::DownloadDraft;
    pub use crate::storage::{DownloadDir, DownloadHistory, HistoryEntry};
    pub use crate::tasks::{AssetFetcher, LocalTaskManager, TaskManager, TaskState};
    pub use crate::types::{PlannedAsset, WorkDescriptor};
    pub use crate::variant::SiteVariant;
    pub use crate::Panograb;
}

use anyhow::Result;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::config::Settings;
use crate::db::Database;
use crate::error::SubmitError;
use crate::fetcher::{HttpPageFetcher, PageFetcher};
use crate::poller::TaskPoller;
use crate::resolver::{DownloadDraft, Resolver};
use crate::storage::{DownloadDir, DownloadHistory, RecordStore, Storage};
use crate::tasks::TaskManager;
use crate::types::WorkDescriptor;

/// Async library entry point. Owns the resolver and the record store; the
/// download task manager belongs to the embedder and is passed in per call.
pub struct Panograb {
    settings: Settings,
    resolver: Resolver,
    records: RecordStore,
}

impl Panograb {
    /// Open the record database (running migrations) and build the HTTP fetcher.
    pub async fn connect(settings: Settings) -> Result<Self> {
        let db = Database::connect(settings.database_url.as_deref()).await?;
        db.run_migrations().await?;
        let fetcher = Arc::new(HttpPageFetcher::new(&settings)?);
        Ok(Self::with_parts(settings, fetcher, Arc::new(db)))
    }

    pub fn with_parts(settings: Settings, fetcher: Arc<dyn PageFetcher>, storage: Arc<dyn Storage>) -> Self {
        Self { settings, resolver: Resolver::new(fetcher), records: RecordStore::new(storage) }
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn resolver(&self) -> &Resolver { &self.resolver }

    pub fn records(&self) -> &RecordStore { &self.records }

    pub async fn resolve_work_json(&self, url: &str) -> Option<WorkDescriptor> { self.resolver.resolve_work_json(url).await }

    pub async fn resolve_draft(&self, url: &str) -> Option<DownloadDraft> { self.resolver.resolve_draft(url).await }

    /// Page title, empty when unavailable.
    pub async fn page_title(&self, url: &str) -> String { self.resolver.fetcher().fetch_page_title(url).await }

    /// Validate a download form and hand it to `tasks`.
    ///
    /// The destination is `save_dir/save_name`. It must not exist yet, which
    /// also covers queued and running tasks since the manager creates the
    /// directory on submission. On success the destination heads the history.
    pub async fn submit_download(
        &self,
        tasks: &dyn TaskManager,
        save_dir: &str,
        save_name: &str,
        manifest_json: &str,
    ) -> Result<PathBuf, SubmitError> {
        if save_dir.trim().is_empty() {
            return Err(SubmitError::MissingDirectory);
        }
        if save_name.trim().is_empty() {
            return Err(SubmitError::MissingName);
        }
        // the name is pre-filled from page data; it must stay inside save_dir
        let mut segments = Path::new(save_name).components();
        if !matches!((segments.next(), segments.next()), (Some(Component::Normal(_)), None)) {
            return Err(SubmitError::InvalidName(save_name.to_string()));
        }
        if manifest_json.trim().is_empty() {
            return Err(SubmitError::MissingManifest);
        }

        let dest = Path::new(save_dir).join(save_name);
        if tasks.path_exists(&dest).await {
            return Err(SubmitError::Conflict(dest));
        }
        tasks
            .submit(&dest, manifest_json)
            .await
            .map_err(|e| SubmitError::Rejected(format!("{e:#}")))?;
        self.records.add_history(&[dest.to_string_lossy().into_owned()]).await;
        Ok(dest)
    }

    pub async fn history(&self) -> DownloadHistory { self.records.load().await }

    pub async fn remove_history(&self, file: &str) -> DownloadHistory { self.records.remove_history(file).await }

    pub async fn download_dir(&self) -> Option<String> {
        let DownloadDir(dir) = self.records.load::<DownloadDir>().await;
        (!dir.is_empty()).then_some(dir)
    }

    pub async fn set_download_dir(&self, dir: &str) { self.records.save(&DownloadDir(dir.to_string())).await }

    /// Start republishing `tasks` state at the configured interval.
    pub fn spawn_poller(&self, tasks: Arc<dyn TaskManager>) -> TaskPoller {
        TaskPoller::spawn(tasks, self.settings.poll_interval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::tests::{work_value, FakeFetcher};
    use crate::storage::tests::MemoryStorage;
    use crate::tasks::tests::{manifest_json, wait_finished, FakeAssets};
    use crate::tasks::{AssetFetcher, LocalTaskManager, TaskState};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn facade(fetcher: FakeFetcher) -> Panograb {
        Panograb::with_parts(Settings::default(), Arc::new(fetcher), Arc::new(MemoryStorage::default()))
    }

    #[tokio::test]
    async fn form_fields_are_validated_before_anything_runs() {
        let app = facade(FakeFetcher::default());
        let tasks = LocalTaskManager::new(Arc::new(FakeAssets::default()));
        let json = manifest_json("https://x/");

        assert!(matches!(app.submit_download(&tasks, "", "a", &json).await, Err(SubmitError::MissingDirectory)));
        assert!(matches!(app.submit_download(&tasks, "/tmp", "", &json).await, Err(SubmitError::MissingName)));
        assert!(matches!(app.submit_download(&tasks, "/tmp", "a", " ").await, Err(SubmitError::MissingManifest)));
        assert!(tasks.query_all().await.unwrap().is_empty());
        assert!(app.history().await.0.is_empty());
    }

    /// Holds every fetch until released, so the first task stays running.
    #[derive(Default)]
    struct GatedAssets {
        released: AtomicBool,
        gate: Notify,
    }

    impl GatedAssets {
        fn release(&self) {
            self.released.store(true, Ordering::SeqCst);
            self.gate.notify_one();
        }
    }

    #[async_trait]
    impl AssetFetcher for GatedAssets {
        async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
            if !self.released.load(Ordering::SeqCst) {
                self.gate.notified().await;
            }
            tokio::fs::write(dest, url).await?;
            Ok(())
        }
    }

    async fn wait_running(tasks: &dyn TaskManager, dest: &Path) {
        for _ in 0..200 {
            if let Some(TaskState::Running { .. }) = tasks.query_all().await.unwrap().get(dest) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} never started", dest.display());
    }

    #[tokio::test]
    async fn submission_is_refused_for_completed_and_running_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let save_dir = dir.path().to_string_lossy().into_owned();
        let app = facade(FakeFetcher::default());
        let json = manifest_json("https://x/");

        let finished_tasks = LocalTaskManager::new(Arc::new(FakeAssets::default()));
        let done = app.submit_download(&finished_tasks, &save_dir, "done", &json).await.unwrap();
        assert_eq!(wait_finished(&finished_tasks, &done).await, TaskState::Success);
        assert!(matches!(
            app.submit_download(&finished_tasks, &save_dir, "done", &json).await,
            Err(SubmitError::Conflict(p)) if p == done
        ));

        let assets = Arc::new(GatedAssets::default());
        let slow_tasks = LocalTaskManager::new(assets.clone());
        let running = app.submit_download(&slow_tasks, &save_dir, "running", &json).await.unwrap();
        wait_running(&slow_tasks, &running).await;
        assert!(matches!(
            app.submit_download(&slow_tasks, &save_dir, "running", &json).await,
            Err(SubmitError::Conflict(p)) if p == running
        ));
        assert!(matches!(
            slow_tasks.query_all().await.unwrap().get(&running),
            Some(TaskState::Running { .. })
        ));

        assets.release();
        assert_eq!(wait_finished(&slow_tasks, &running).await, TaskState::Success);

        let history = app.history().await;
        let files: Vec<PathBuf> = history.0.iter().map(|e| PathBuf::from(&e.file)).collect();
        assert_eq!(files, vec![running, done]);
    }

    #[tokio::test]
    async fn names_leaving_the_save_dir_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let save_dir = dir.path().join("downloads");
        let save_dir = save_dir.to_string_lossy().into_owned();
        let app = facade(FakeFetcher::default());
        let tasks = LocalTaskManager::new(Arc::new(FakeAssets::default()));
        let json = manifest_json("https://x/");
        let absolute = dir.path().join("abs").to_string_lossy().into_owned();

        for name in ["../escaped", absolute.as_str(), "a/b", ".", ".."] {
            assert!(
                matches!(app.submit_download(&tasks, &save_dir, name, &json).await, Err(SubmitError::InvalidName(n)) if n == name),
                "{name} was accepted"
            );
        }
        assert!(!dir.path().join("escaped").exists());
        assert!(!dir.path().join("abs").exists());
        assert!(tasks.query_all().await.unwrap().is_empty());
        assert!(app.history().await.0.is_empty());
    }

    #[tokio::test]
    async fn manager_refusal_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let save_dir = dir.path().to_string_lossy().into_owned();
        let app = facade(FakeFetcher::default());
        let tasks = LocalTaskManager::new(Arc::new(FakeAssets::default()));

        match app.submit_download(&tasks, &save_dir, "x", "[1, 2]").await {
            Err(SubmitError::Rejected(msg)) => assert!(msg.starts_with("json_decode_work error")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(app.history().await.0.is_empty());
    }

    #[tokio::test]
    async fn resolved_draft_submits_and_polls_to_success() {
        let url = "https://realsee.com/lianjia/abc";
        let mut fetcher = FakeFetcher::default();
        fetcher.pages.insert(url.into(), vec![format!("work_code;;__module__data={}", json!({"work": work_value("https://x/")}))]);
        fetcher.titles.insert(url.into(), "Loft".into());
        let settings = Settings { poll_interval_ms: 5, ..Settings::default() };
        let app = Panograb::with_parts(settings, Arc::new(fetcher), Arc::new(MemoryStorage::default()));
        let tasks = Arc::new(LocalTaskManager::new(Arc::new(FakeAssets::default())));
        let poller = app.spawn_poller(tasks.clone());
        let mut updates = poller.subscribe();

        let dir = tempfile::tempdir().unwrap();
        let draft = app.resolve_draft(url).await.unwrap();
        let dest = app
            .submit_download(tasks.as_ref(), &dir.path().to_string_lossy(), &draft.save_name, &draft.manifest_json)
            .await
            .unwrap();
        assert!(dest.ends_with("Loft"));

        let finished = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                updates.changed().await.unwrap();
                if updates.borrow().get(&dest) == Some(&TaskState::Success) {
                    break;
                }
            }
        })
        .await;
        assert!(finished.is_ok());
    }

    #[tokio::test]
    async fn download_dir_defaults_to_none() {
        let app = facade(FakeFetcher::default());
        assert_eq!(app.download_dir().await, None);
        app.set_download_dir("/home/me/vr").await;
        assert_eq!(app.download_dir().await.as_deref(), Some("/home/me/vr"));
    }
}
