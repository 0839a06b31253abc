//! Fixed-cadence background task with its own cancellation token.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A job run on a fixed period until cancelled.
///
/// The first run happens immediately. Missed ticks are skipped, so a slow
/// job never triggers a burst of catch-up runs.
pub struct PeriodicTask {
    name: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    pub fn spawn<F, Fut>(name: impl Into<String>, period: Duration, token: CancellationToken, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let task_token = token.clone();
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = interval.tick() => job().await,
                }
            }

            tracing::debug!("Task {} stopped", task_name);
        });

        Self { name, token, handle }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cancel the task and wait for its current run to finish.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!("Task {} ended abnormally: {}", self.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_runs_until_stopped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        let task = PeriodicTask::spawn("counter", Duration::from_secs(60), CancellationToken::new(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(task.name(), "counter");

        tokio::time::sleep(Duration::from_secs(150)).await;
        task.stop().await;

        // Immediate run plus ticks at 60s and 120s.
        let seen = runs.load(Ordering::SeqCst);
        assert_eq!(seen, 3);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(runs.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_parent_token_cancels() {
        let parent = CancellationToken::new();
        let task = PeriodicTask::spawn("idle", Duration::from_secs(3600), parent.child_token(), || async {});

        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), task.handle)
            .await
            .expect("task should stop when its parent token is cancelled")
            .unwrap();
    }
}
