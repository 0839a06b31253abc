//! Scheduler module for running probes and persisting their observations.

mod task;

pub use task::*;

use crate::db::{ObservationStore, Site};
use crate::probe::probe_site;
use crate::status::Observation;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Flush the write buffer once it holds this many observations.
const BATCH_SIZE: usize = 500;
/// Flush the write buffer at least this often.
const FLUSH_INTERVAL: Duration = Duration::from_secs(2);

/// Orchestrates one probe loop per site and the batch writer behind them.
pub struct Scheduler {
    store: Arc<dyn ObservationStore>,
    client: reqwest::Client,
    sites: Vec<Site>,
    interval: Duration,
    timeout: Duration,
    token: CancellationToken,
    tasks: Mutex<Vec<PeriodicTask>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler. Cancelling `token` stops every task it starts.
    pub fn new(
        store: Arc<dyn ObservationStore>,
        client: reqwest::Client,
        sites: Vec<Site>,
        interval: Duration,
        timeout: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            store,
            client,
            sites,
            interval,
            timeout,
            token,
            tasks: Mutex::new(Vec::new()),
            writer: Mutex::new(None),
        }
    }

    /// Start probing every site.
    pub async fn start(&self) {
        let mut writer = self.writer.lock().await;
        if writer.is_some() {
            return; // Already running
        }

        tracing::info!(
            "Starting scheduler with {} sites every {:?}",
            self.sites.len(),
            self.interval
        );

        let (tx, rx) = mpsc::channel(1000);
        *writer = Some(tokio::spawn(run_batch_writer(rx, self.store.clone())));

        let mut tasks = self.tasks.lock().await;
        for site in &self.sites {
            tracing::info!("Scheduler: Adding site {} ({})", site.short_name, site.url());
            tasks.push(self.spawn_probe_loop(site.clone(), tx.clone()));
        }
        // The writer exits once every probe loop has dropped its sender.
    }

    fn spawn_probe_loop(&self, site: Site, tx: mpsc::Sender<Observation>) -> PeriodicTask {
        let client = self.client.clone();
        let timeout = self.timeout;
        let name = format!("probe:{}", site.short_name);

        PeriodicTask::spawn(name, self.interval, self.token.child_token(), move || {
            let client = client.clone();
            let site = site.clone();
            let tx = tx.clone();
            async move {
                let obs = probe_site(&client, &site, timeout).await;
                tracing::debug!("{}: {} at {}", site.short_name, obs.status, obs.timestamp);
                if tx.send(obs).await.is_err() {
                    tracing::error!("Failed to send observation for {}", site.short_name);
                }
            }
        })
    }

    /// Stop all probe loops and wait for buffered observations to be written.
    pub async fn shutdown(&self) {
        self.token.cancel();

        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            tracing::debug!("Stopping {}", task.name());
            task.stop().await;
        }

        if let Some(writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.await {
                tracing::error!("Batch writer ended abnormally: {}", e);
            }
        }

        tracing::info!("Scheduler stopped");
    }
}

/// Run the batch writer that accumulates and flushes observations.
async fn run_batch_writer(mut rx: mpsc::Receiver<Observation>, store: Arc<dyn ObservationStore>) {
    let mut buffer: Vec<Observation> = Vec::with_capacity(BATCH_SIZE);
    let mut interval = tokio::time::interval(FLUSH_INTERVAL);

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Some(obs) => {
                        buffer.push(obs);
                        if buffer.len() >= BATCH_SIZE {
                            flush_buffer(store.as_ref(), &mut buffer);
                        }
                    }
                    None => {
                        // Channel closed, flush remaining and exit
                        flush_buffer(store.as_ref(), &mut buffer);
                        break;
                    }
                }
            }
            _ = interval.tick() => {
                flush_buffer(store.as_ref(), &mut buffer);
            }
        }
    }
}

fn flush_buffer(store: &dyn ObservationStore, buffer: &mut Vec<Observation>) {
    if buffer.is_empty() {
        return;
    }

    match store.append(buffer) {
        Ok(()) => tracing::debug!("Flushed {} observations", buffer.len()),
        Err(e) => tracing::error!("Failed to flush {} observations: {}", buffer.len(), e),
    }

    buffer.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::status::ProbeStatus;
    use axum::{routing::get, Router};
    use chrono::{TimeZone, Utc};
    use tempfile::NamedTempFile;

    async fn spawn_site() -> Site {
        let app = Router::new().route("/", get(|| async { "ok" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Site {
            short_name: "local".to_string(),
            domain: format!("http://{}/", addr),
            long_name: "Local".to_string(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_scheduler_records_observations() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        let site = spawn_site().await;
        let client = reqwest::Client::builder().no_proxy().build().unwrap();

        let scheduler = Scheduler::new(
            store.clone(),
            client,
            vec![site],
            Duration::from_millis(200),
            Duration::from_secs(2),
            CancellationToken::new(),
        );
        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(700)).await;
        scheduler.shutdown().await;

        // Everything buffered is on disk after shutdown.
        let count = store.count("local").unwrap();
        assert!(count >= 2, "expected at least 2 observations, got {}", count);

        let from = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let observations = store.fetch_range("local", from, Utc::now()).unwrap();
        assert!(observations.iter().all(|o| o.status == ProbeStatus::Up));
        assert!(observations.iter().all(|o| o.latency.is_some()));

        // No more probes after shutdown.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(store.count("local").unwrap(), count);
    }

    #[tokio::test]
    async fn test_unreachable_site_recorded_down() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());

        // Bind then drop to get a port nobody listens on.
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let site = Site {
            short_name: "gone".to_string(),
            domain: format!("http://{}/", addr),
            long_name: "Gone".to_string(),
            description: String::new(),
        };
        let client = reqwest::Client::builder().no_proxy().build().unwrap();

        let scheduler = Scheduler::new(
            store.clone(),
            client,
            vec![site],
            Duration::from_secs(3600),
            Duration::from_millis(500),
            CancellationToken::new(),
        );
        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(800)).await;
        scheduler.shutdown().await;

        let latest = store.latest("gone").unwrap().unwrap();
        assert_eq!(latest.status, ProbeStatus::Down);
        assert_eq!(latest.latency, None);
    }
}
