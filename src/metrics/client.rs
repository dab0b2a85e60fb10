//! Metrics endpoint client

use super::types::SystemInfo;
use super::MetricsError;
use crate::network::ConnectionEstimator;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Something that can produce a system info reading
#[async_trait]
pub trait SystemInfoSource: Send + Sync {
    async fn fetch(&self) -> Result<SystemInfo, MetricsError>;
}

/// Fetches system info with a plain HTTP GET
pub struct HttpSystemInfoSource {
    client: reqwest::Client,
    url: String,
    estimator: Option<Arc<ConnectionEstimator>>,
}

impl HttpSystemInfoSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, MetricsError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            estimator: None,
        })
    }

    /// Feed round-trip samples into a connection estimator
    pub fn with_estimator(mut self, estimator: Arc<ConnectionEstimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SystemInfoSource for HttpSystemInfoSource {
    async fn fetch(&self) -> Result<SystemInfo, MetricsError> {
        let started = Instant::now();
        let response = self
            .client
            .get(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MetricsError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        if let Some(estimator) = &self.estimator {
            estimator.record(started.elapsed(), body.len());
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ConnectionInfoSource;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/system-info")
    }

    fn sample_body() -> serde_json::Value {
        json!({
            "cpuUsage": 12,
            "usedMemory": 1073741824u64,
            "freeMemory": 1073741824u64,
            "totalMemory": 2147483648u64,
            "networkInfo": { "eth0": ["192.168.1.5"] }
        })
    }

    #[tokio::test]
    async fn fetches_and_decodes_system_info() {
        let router = Router::new().route(
            "/system-info",
            get(|headers: HeaderMap| async move {
                let content_type = headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                if content_type.as_deref() == Some("application/json") {
                    Json(sample_body())
                } else {
                    Json(json!({ "unexpected": content_type }))
                }
            }),
        );
        let url = serve(router).await;
        let estimator = Arc::new(ConnectionEstimator::new());
        let source = HttpSystemInfoSource::new(url, Duration::from_secs(2))
            .unwrap()
            .with_estimator(estimator.clone());

        let info = source.fetch().await.expect("fetch should succeed");
        assert_eq!(info.cpu_usage, 12.0);
        assert_eq!(info.used_memory, 1_073_741_824);
        assert_eq!(info.network_info["eth0"], vec!["192.168.1.5"]);
        assert!(estimator.connection_info().is_some());
    }

    #[tokio::test]
    async fn server_error_is_reported_as_status() {
        let router = Router::new().route(
            "/system-info",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
        let source = HttpSystemInfoSource::new(serve(router).await, Duration::from_secs(2)).unwrap();
        assert!(matches!(source.fetch().await, Err(MetricsError::Status(503))));
    }

    #[tokio::test]
    async fn payload_without_network_info_is_a_decode_error() {
        let router = Router::new().route(
            "/system-info",
            get(|| async {
                Json(json!({ "cpuUsage": 3, "usedMemory": 1, "freeMemory": 1, "totalMemory": 2 }))
            }),
        );
        let source = HttpSystemInfoSource::new(serve(router).await, Duration::from_secs(2)).unwrap();
        assert!(matches!(source.fetch().await, Err(MetricsError::Decode(_))));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source =
            HttpSystemInfoSource::new(format!("http://{addr}/system-info"), Duration::from_secs(2))
                .unwrap();
        assert!(matches!(source.fetch().await, Err(MetricsError::Transport(_))));
    }
}
