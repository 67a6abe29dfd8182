use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::tasks::{TaskManager, TaskState};

pub type TaskSnapshot = HashMap<PathBuf, TaskState>;

/// Periodically republishes every task's state. The loop lives as long as the handle.
pub struct TaskPoller {
    handle: JoinHandle<()>,
    states: watch::Receiver<TaskSnapshot>,
}

impl TaskPoller {
    /// Start polling `manager`. The interval is measured from the end of each
    /// query, so a slow query only delays its own next tick.
    pub fn spawn(manager: Arc<dyn TaskManager>, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(TaskSnapshot::new());
        let handle = tokio::spawn(async move {
            loop {
                match manager.query_all().await {
                    Ok(states) => {
                        if tx.send(states).is_err() {
                            tracing::debug!("task poller has no subscribers left");
                            return;
                        }
                    }
                    Err(e) => tracing::warn!("querying download tasks failed: {e:#}"),
                }
                tokio::time::sleep(interval).await;
            }
        });
        Self { handle, states: rx }
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskSnapshot> { self.states.clone() }

    pub fn latest(&self) -> TaskSnapshot { self.states.borrow().clone() }

    /// Consume the handle, aborting the loop.
    pub fn stop(self) {}

    pub fn is_running(&self) -> bool { !self.handle.is_finished() }
}

impl Drop for TaskPoller {
    fn drop(&mut self) { self.handle.abort(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports one running task whose percent is the number of queries so far.
    #[derive(Default)]
    struct CountingManager {
        queries: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl TaskManager for CountingManager {
        async fn submit(&self, _dest: &Path, _manifest_json: &str) -> Result<()> { Ok(()) }

        async fn query_all(&self) -> Result<TaskSnapshot> {
            let n = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_first && n == 1 {
                bail!("manager unavailable");
            }
            Ok(TaskSnapshot::from([(PathBuf::from("/vr/a"), TaskState::Running { percent: n })]))
        }

        async fn path_exists(&self, _path: &Path) -> bool { false }
    }

    #[tokio::test]
    async fn publishes_each_query() {
        let manager = Arc::new(CountingManager::default());
        let poller = TaskPoller::spawn(manager.clone(), Duration::from_millis(5));
        let mut rx = poller.subscribe();

        rx.changed().await.unwrap();
        rx.changed().await.unwrap();
        let snapshot = poller.latest();
        match snapshot.get(Path::new("/vr/a")) {
            Some(TaskState::Running { percent }) => assert!(*percent >= 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn query_errors_do_not_stop_the_loop() {
        let manager = Arc::new(CountingManager { fail_first: true, ..Default::default() });
        let poller = TaskPoller::spawn(manager.clone(), Duration::from_millis(5));
        let mut rx = poller.subscribe();

        rx.changed().await.unwrap();
        assert!(poller.is_running());
        assert!(manager.queries.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn stopping_ends_the_queries() {
        let manager = Arc::new(CountingManager::default());
        let poller = TaskPoller::spawn(manager.clone(), Duration::from_millis(5));
        let mut rx = poller.subscribe();
        rx.changed().await.unwrap();
        poller.stop();

        // let the abort land
        tokio::time::sleep(Duration::from_millis(20)).await;
        let after_stop = manager.queries.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.queries.load(Ordering::SeqCst), after_stop);
        // the sender went away with the aborted loop
        while rx.changed().await.is_ok() {}
    }
}
