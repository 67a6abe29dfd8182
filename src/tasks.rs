use std::collections::{HashMap, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::WorkDescriptor;

/// Assets land under `<dest>/origin`.
pub const ORIGIN_DIR: &str = "origin";
pub const INPUT_FILE: &str = "input.json";
pub const WORK_FILE: &str = "work.json";

/// State of one download task, keyed by its destination path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TaskState {
    Waiting,
    Running { percent: usize },
    Success,
    Failure { message: String },
}

impl TaskState {
    pub fn is_finished(&self) -> bool { matches!(self, TaskState::Success | TaskState::Failure { .. }) }
}

/// Accepts manifests and executes them in the background.
#[async_trait]
pub trait TaskManager: Send + Sync {
    async fn submit(&self, dest: &Path, manifest_json: &str) -> Result<()>;
    async fn query_all(&self) -> Result<HashMap<PathBuf, TaskState>>;
    async fn path_exists(&self, path: &Path) -> bool;
}

/// Retrieves one asset to a file. Parent directories already exist.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

#[derive(Default)]
struct Queue {
    pending: VecDeque<(PathBuf, WorkDescriptor)>,
    states: HashMap<PathBuf, TaskState>,
    worker_running: bool,
}

struct Inner {
    fetcher: Arc<dyn AssetFetcher>,
    queue: Mutex<Queue>,
}

/// In-process [`TaskManager`]: a FIFO queue drained by a single worker task.
#[derive(Clone)]
pub struct LocalTaskManager {
    inner: Arc<Inner>,
}

impl LocalTaskManager {
    pub fn new(fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self { inner: Arc::new(Inner { fetcher, queue: Mutex::new(Queue::default()) }) }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        // a panicked worker leaves the map readable
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, dest: &Path, state: TaskState) { self.lock().states.insert(dest.to_path_buf(), state); }

    async fn run_worker(self: Arc<Self>) {
        loop {
            let next = {
                let mut queue = self.lock();
                let next = queue.pending.pop_front();
                if next.is_none() {
                    queue.worker_running = false;
                }
                next
            };
            let Some((dest, work)) = next else { return };

            tracing::info!("download started: {}", dest.display());
            let state = match self.download(&dest, &work).await {
                Ok(()) => {
                    tracing::info!("download finished: {}", dest.display());
                    TaskState::Success
                }
                Err(e) => {
                    tracing::warn!("download of {} failed: {e:#}", dest.display());
                    TaskState::Failure { message: format!("{e:#}") }
                }
            };
            self.set_state(&dest, state);
        }
    }

    async fn download(&self, dest: &Path, work: &WorkDescriptor) -> Result<()> {
        self.set_state(dest, TaskState::Running { percent: 0 });
        let origin = dest.join(ORIGIN_DIR);
        let plan = work.download_plan();
        let total = plan.len();
        for (done, asset) in plan.iter().enumerate() {
            let target = origin.join(safe_relative(&asset.path)?);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            self.fetcher
                .fetch(&asset.url, &target)
                .await
                .with_context(|| format!("fetching {}", asset.url))?;
            self.set_state(dest, TaskState::Running { percent: (done + 1) * 100 / total });
        }
        let manifest = serde_json::to_string(work)?;
        tokio::fs::create_dir_all(&origin).await?;
        tokio::fs::write(origin.join(WORK_FILE), manifest)
            .await
            .context("writing work.json")?;
        Ok(())
    }
}

/// Asset paths come from page data; keep them inside the task directory.
fn safe_relative(path: &str) -> Result<&Path> {
    let p = Path::new(path);
    if p.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir)) {
        Ok(p)
    } else {
        Err(anyhow!("asset path escapes the task directory: {path}"))
    }
}

#[async_trait]
impl TaskManager for LocalTaskManager {
    async fn submit(&self, dest: &Path, manifest_json: &str) -> Result<()> {
        let work: WorkDescriptor =
            serde_json::from_str(manifest_json).map_err(|e| anyhow!("json_decode_work error: {e}"))?;
        {
            let mut queue = self.inner.lock();
            if queue.states.contains_key(dest) {
                bail!("task already exists: {}", dest.display());
            }
            queue.states.insert(dest.to_path_buf(), TaskState::Waiting);
        }

        let written = async {
            tokio::fs::create_dir_all(dest)
                .await
                .with_context(|| format!("creating {}", dest.display()))?;
            tokio::fs::write(dest.join(INPUT_FILE), manifest_json)
                .await
                .context("writing input.json")
        }
        .await;
        if let Err(e) = written {
            self.inner.lock().states.remove(dest);
            return Err(e);
        }

        let start_worker = {
            let mut queue = self.inner.lock();
            queue.pending.push_back((dest.to_path_buf(), work));
            !std::mem::replace(&mut queue.worker_running, true)
        };
        if start_worker {
            tokio::spawn(self.inner.clone().run_worker());
        }
        tracing::info!("download queued: {}", dest.display());
        Ok(())
    }

    async fn query_all(&self) -> Result<HashMap<PathBuf, TaskState>> { Ok(self.inner.lock().states.clone()) }

    async fn path_exists(&self, path: &Path) -> bool { tokio::fs::try_exists(path).await.unwrap_or(false) }
}
