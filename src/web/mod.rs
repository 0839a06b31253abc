//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::ServerConfig;
use crate::db::{ObservationStore, Site};

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<dyn ObservationStore>,
    pub sites: Arc<Vec<Site>>,
}

impl AppState {
    pub fn site(&self, short_name: &str) -> Option<&Site> {
        self.sites.iter().find(|s| s.short_name == short_name)
    }
}

/// Web server for sitewatch.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, store: Arc<dyn ObservationStore>, sites: Vec<Site>) -> Self {
        Self {
            state: AppState {
                config,
                store,
                sites: Arc::new(sites),
            },
        }
    }

    /// Build the router with all routes.
    pub fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            .route("/", get(handlers::handle_list_sites))
            .route("/api/sites", get(handlers::handle_list_sites))
            .route("/api/status", get(handlers::handle_status_summary))
            .route("/api/storage", get(handlers::handle_storage_stats))
            .route("/api/sites/{short_name}/ranges", get(handlers::handle_ranges))
            .route("/api/sites/{short_name}/daily", get(handlers::handle_daily))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
            .with_state(self.state.clone())
    }

    /// Serve on the configured port until `shutdown` is cancelled.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Web server listening on {}", addr);
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` is cancelled.
    pub async fn serve(
        &self,
        listener: tokio::net::TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        axum::serve(listener, self.routes())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::status::time::day_start;
    use crate::status::Observation;
    use chrono::{Days, Duration, Utc};
    use serde_json::Value;
    use std::time::Duration as StdDuration;
    use tempfile::NamedTempFile;

    fn sites() -> Vec<Site> {
        vec![
            Site {
                short_name: "gh".to_string(),
                domain: "github.com".to_string(),
                long_name: "GitHub".to_string(),
                description: "Code hosting".to_string(),
            },
            Site {
                short_name: "blog".to_string(),
                domain: "blog.example.com".to_string(),
                long_name: "Blog".to_string(),
                description: String::new(),
            },
        ]
    }

    struct TestServer {
        base: String,
        client: reqwest::Client,
        shutdown: CancellationToken,
        _db: NamedTempFile,
    }

    impl TestServer {
        async fn get(&self, path: &str) -> (u16, Value) {
            let resp = self
                .client
                .get(format!("{}{}", self.base, path))
                .send()
                .await
                .unwrap();
            let status = resp.status().as_u16();
            (status, resp.json().await.unwrap_or(Value::Null))
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            self.shutdown.cancel();
        }
    }

    /// Server whose "gh" site has three days of history and "blog" none.
    async fn spawn_server() -> TestServer {
        let db = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(db.path()).unwrap());

        let today = Utc::now().date_naive();
        let yesterday = day_start(today.checked_sub_days(Days::new(1)).unwrap());
        let two_days_ago = day_start(today.checked_sub_days(Days::new(2)).unwrap());
        let latency = Some(StdDuration::from_millis(80));

        store
            .append(&[
                Observation::down("gh", two_days_ago + Duration::hours(23)),
                Observation::down("gh", yesterday + Duration::hours(8)),
                Observation::up("gh", yesterday + Duration::minutes(8 * 60 + 5), latency),
                Observation::up("gh", yesterday + Duration::hours(12), latency),
                Observation::up("gh", day_start(today), latency),
            ])
            .unwrap();

        let server = Server::new(ServerConfig::default(), store, sites());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        tokio::spawn(async move {
            server.serve(listener, token).await.unwrap();
        });

        TestServer {
            base: format!("http://{}", addr),
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
            shutdown,
            _db: db,
        }
    }

    #[tokio::test]
    async fn test_list_sites() {
        let server = spawn_server().await;
        let (status, body) = server.get("/api/sites").await;
        assert_eq!(status, 200);

        let sites = body.as_array().unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0]["shortName"], "gh");
        assert_eq!(sites[0]["status"], "up");
        assert_eq!(sites[0]["latencyMs"], 80.0);
        assert_eq!(sites[1]["status"], "no_data");
        assert!(sites[1]["lastChecked"].is_null());

        let (root_status, root) = server.get("/").await;
        assert_eq!(root_status, 200);
        assert_eq!(root, body);
    }

    #[tokio::test]
    async fn test_status_summary() {
        let server = spawn_server().await;
        let (status, body) = server.get("/api/status").await;
        assert_eq!(status, 200);
        assert_eq!(body["operational"], false);
        assert_eq!(body["up"], serde_json::json!(["GitHub"]));
        assert_eq!(body["down"], serde_json::json!(["Blog"]));
    }

    #[tokio::test]
    async fn test_daily() {
        let server = spawn_server().await;
        let (status, body) = server.get("/api/sites/gh/daily?days=3").await;
        assert_eq!(status, 200);
        assert_eq!(body["shortName"], "gh");
        assert_eq!(body["longName"], "GitHub");

        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 3);

        assert_eq!(data[0]["status"], "down");
        assert_eq!(data[0]["uptimePct"], 0);
        assert_eq!(data[0]["downtimePeriods"][0]["start"], "23:00:00.000");
        assert_eq!(data[0]["downtimePeriods"][0]["end"], "23:59:59.999");

        assert_eq!(data[1]["status"], "up");
        assert_eq!(data[1]["uptimePct"], 67);
        assert_eq!(
            data[1]["downtimePeriods"],
            serde_json::json!([{"start": "08:00:00.000", "end": "08:05:00.000"}])
        );
        assert_eq!(data[1]["latency"]["samples"], 2);

        assert_eq!(data[2]["status"], "up");
        assert_eq!(data[2]["observations"], 1);

        let (_, default_window) = server.get("/api/sites/gh/daily").await;
        assert_eq!(default_window["data"].as_array().unwrap().len(), 60);
        assert_eq!(default_window["data"][0]["status"], "no_data");

        let (_, empty) = server.get("/api/sites/blog/daily?days=2").await;
        let empty = empty["data"].as_array().unwrap();
        assert!(empty.iter().all(|d| d["status"] == "no_data"));
    }

    #[tokio::test]
    async fn test_ranges() {
        let server = spawn_server().await;
        let (status, body) = server.get("/api/sites/gh/ranges?days=3").await;
        assert_eq!(status, 200);

        let ranges = body["ranges"].as_array().unwrap();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0]["status"], "down");
        assert_eq!(ranges[1]["status"], "up");
        assert_eq!(ranges[0]["end"], ranges[1]["start"]);
        assert!(body["upSeconds"].as_i64().unwrap() > 0);
        assert!(body["downSeconds"].as_i64().unwrap() >= 9 * 3600);

        let (status, empty) = server.get("/api/sites/blog/ranges").await;
        assert_eq!(status, 200);
        assert_eq!(empty["ranges"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_storage_stats() {
        let server = spawn_server().await;
        let (status, body) = server.get("/api/storage").await;
        assert_eq!(status, 200);
        assert_eq!(body["observationCount"], 5);
        assert!(body["dbSizeBytes"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_errors() {
        let server = spawn_server().await;

        let (status, body) = server.get("/api/sites/nope/daily").await;
        assert_eq!(status, 404);
        assert!(body["error"].as_str().unwrap().contains("nope"));

        let (status, _) = server.get("/api/sites/gh/daily?days=0").await;
        assert_eq!(status, 400);

        let (status, _) = server.get("/api/sites/gh/ranges?days=1000").await;
        assert_eq!(status, 400);
    }
}
