//! Health Poller
//!
//! Polls every registered actuator endpoint concurrently and merges the
//! answers into one report. No endpoint's failure affects another, and the
//! poll itself never fails: an unreachable service is simply `Down`.
//!
//! Per target and per poll cycle:
//! ```text
//! Unknown ──(answered)──→ Up | Down (from payload "status")
//! Unknown ──(error)─────→ Down
//! ```

use crate::{
    aggregator::{DependencyAggregator, FetchRequest, Settled},
    gateway_client::Gateway,
    registry::{ServiceEndpoint, ServiceRegistry},
    types::{DependencyStatus, ServiceLabel},
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Body kept for display: the service's own payload, or a synthetic DOWN body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawBody {
    Payload(Value),
    Failure { status: String, error: String },
}

impl RawBody {
    pub fn failure(reason: &str) -> Self {
        RawBody::Failure {
            status: "DOWN".to_string(),
            error: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthEntry {
    pub label: ServiceLabel,
    pub url: String,
    pub status: DependencyStatus,
    pub raw_body: RawBody,
    /// `components.<name>.details` of services that expose a sub-report
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

/// One poll cycle, entries in registry order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub entries: Vec<HealthEntry>,
    /// Unix timestamp of the end of the cycle, 0 before the first one
    pub checked_at: i64,
}

impl HealthReport {
    /// Every target `Unknown`: the state before a cycle settles
    pub fn unknown(registry: &ServiceRegistry) -> Self {
        Self {
            entries: registry
                .endpoints()
                .iter()
                .map(|endpoint| HealthEntry {
                    label: endpoint.label.clone(),
                    url: endpoint.url(),
                    status: DependencyStatus::Unknown,
                    raw_body: RawBody::Payload(Value::Null),
                    detail: None,
                })
                .collect(),
            checked_at: 0,
        }
    }

    #[cfg(test)]
    pub fn entry(&self, label: &str) -> Option<&HealthEntry> {
        self.entries.iter().find(|e| e.label.as_str() == label)
    }

    #[cfg(test)]
    pub fn status(&self, label: &str) -> DependencyStatus {
        self.entry(label)
            .map(|e| e.status)
            .unwrap_or(DependencyStatus::Unknown)
    }

    pub fn count(&self, status: DependencyStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    pub fn all_up(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|e| e.status.is_up())
    }
}

/// Top-level `status` of an actuator payload; only "UP" counts as up
pub fn status_from_payload(payload: &Value) -> DependencyStatus {
    match payload.get("status").and_then(Value::as_str) {
        Some("UP") => DependencyStatus::Up,
        _ => DependencyStatus::Down,
    }
}

/// `components.<component>.details`, verbatim. Absence is not an error.
pub fn extract_detail(payload: &Value, component: &str) -> Option<Value> {
    payload
        .get("components")?
        .get(component)?
        .get("details")
        .cloned()
}

pub struct HealthPoller {
    registry: ServiceRegistry,
}

impl HealthPoller {
    pub fn new(registry: ServiceRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Poll every endpoint once, concurrently, and wait for all of them
    pub async fn poll_all(&self, gateway: &dyn Gateway) -> HealthReport {
        let endpoints = self.registry.endpoints();
        let requests: Vec<FetchRequest<'_, Value>> = endpoints
            .iter()
            .map(|endpoint| {
                let url = endpoint.url();
                FetchRequest::best_effort(
                    endpoint.label.clone(),
                    async move { gateway.fetch_health(&url).await },
                    Value::Null,
                )
            })
            .collect();

        let aggregated = match DependencyAggregator::new("health").run(requests).await {
            Ok(aggregated) => aggregated,
            Err(e) => {
                // Only reachable with duplicate labels, which the registry rejects
                warn!("Health poll could not run: {}", e);
                return HealthReport::unknown(&self.registry);
            }
        };

        let entries: Vec<HealthEntry> = endpoints
            .iter()
            .zip(aggregated.entries())
            .map(|(endpoint, entry)| classify(endpoint, &entry.settled))
            .collect();

        let report = HealthReport {
            entries,
            checked_at: chrono::Utc::now().timestamp(),
        };
        info!(
            "Health poll: {} up, {} down",
            report.count(DependencyStatus::Up),
            report.count(DependencyStatus::Down)
        );
        report
    }
}

fn classify(endpoint: &ServiceEndpoint, settled: &Settled<Value>) -> HealthEntry {
    match settled {
        Settled::Payload(payload) => {
            let status = status_from_payload(payload);
            let detail = endpoint
                .detail_component
                .as_deref()
                .and_then(|component| extract_detail(payload, component));
            debug!("{} reported {:?}", endpoint.label, status);

            HealthEntry {
                label: endpoint.label.clone(),
                url: endpoint.url(),
                status,
                raw_body: RawBody::Payload(payload.clone()),
                detail,
            }
        }
        Settled::Failure(reason) => HealthEntry {
            label: endpoint.label.clone(),
            url: endpoint.url(),
            status: DependencyStatus::Down,
            raw_body: RawBody::failure(reason),
            detail: None,
        },
    }
}

// ============================================================================
// BACKGROUND MONITOR
// ============================================================================

/// Re-polls on a fixed interval and publishes the latest report. Each tick
/// overwrites every status; there is no hysteresis.
pub struct HealthMonitor {
    latest: Arc<RwLock<HealthReport>>,
    task: JoinHandle<()>,
}

impl HealthMonitor {
    pub fn spawn(poller: Arc<HealthPoller>, gateway: Arc<dyn Gateway>, period: Duration) -> Self {
        let latest = Arc::new(RwLock::new(HealthReport::unknown(poller.registry())));
        let published = latest.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let report = poller.poll_all(gateway.as_ref()).await;
                *published.write().await = report;
            }
        });

        info!("Health monitor started (every {:?})", period);
        Self { latest, task }
    }

    pub async fn latest(&self) -> HealthReport {
        self.latest.read().await.clone()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::gateway_client::GatewayClient;
    use crate::registry::ServiceEndpoint;
    use crate::testing::{FakeGateway, Scripted};
    use serde_json::json;

    fn registry_of(labels: &[&str]) -> ServiceRegistry {
        ServiceRegistry::new(
            labels
                .iter()
                .map(|l| ServiceEndpoint::new(l, &format!("http://{}", l), "/actuator/health"))
                .collect(),
        )
        .unwrap()
    }

    fn url(label: &str) -> String {
        format!("http://{}/actuator/health", label)
    }

    #[test]
    fn test_status_from_payload() {
        assert_eq!(status_from_payload(&json!({"status": "UP"})), DependencyStatus::Up);
        assert_eq!(status_from_payload(&json!({"status": "DOWN"})), DependencyStatus::Down);
        assert_eq!(
            status_from_payload(&json!({"status": "OUT_OF_SERVICE"})),
            DependencyStatus::Down
        );
        assert_eq!(status_from_payload(&json!({"status": "up"})), DependencyStatus::Down);
        assert_eq!(status_from_payload(&json!({})), DependencyStatus::Down);
    }

    #[test]
    fn test_extract_detail_verbatim() {
        let payload = json!({
            "status": "UP",
            "components": {
                "commande": { "status": "UP", "details": { "message": "Tables commandes non vide", "count": 4 } },
                "db": { "status": "UP" }
            }
        });

        assert_eq!(
            extract_detail(&payload, "commande"),
            Some(json!({ "message": "Tables commandes non vide", "count": 4 }))
        );
        assert_eq!(extract_detail(&payload, "db"), None);
        assert_eq!(extract_detail(&payload, "missing"), None);
        assert_eq!(extract_detail(&json!({"status": "UP"}), "commande"), None);
    }

    #[tokio::test]
    async fn test_one_timeout_three_up() {
        let poller = HealthPoller::new(registry_of(&["a", "b", "c", "d"]));
        let gateway = FakeGateway::default()
            .with_health(&url("a"), Scripted::ok(json!({"status": "UP"})))
            .with_health(&url("b"), Scripted::fail("operation timed out").after(60))
            .with_health(&url("c"), Scripted::ok(json!({"status": "UP"})).after(20))
            .with_health(&url("d"), Scripted::ok(json!({"status": "UP"})));

        let report = poller.poll_all(&gateway).await;

        assert_eq!(report.entries.len(), 4);
        assert_eq!(report.count(DependencyStatus::Up), 3);
        assert_eq!(report.count(DependencyStatus::Down), 1);
        assert_eq!(report.status("b"), DependencyStatus::Down);
        match &report.entry("b").unwrap().raw_body {
            RawBody::Failure { status, error } => {
                assert_eq!(status, "DOWN");
                assert!(error.contains("timed out"));
            }
            other => panic!("expected synthetic body, got {:?}", other),
        }
        assert!(report.checked_at > 0);
    }

    #[tokio::test]
    async fn test_detail_only_for_configured_component() {
        let registry = registry_of(&["Commandes V1", "Produits"])
            .with_detail("Commandes V1", "commande")
            .unwrap();
        let poller = HealthPoller::new(registry);
        let rich = json!({
            "status": "DOWN",
            "components": { "commande": { "status": "DOWN", "details": { "message": "Table commandes vide" } } }
        });
        let gateway = FakeGateway::default()
            .with_health(&url("Commandes V1"), Scripted::ok(rich.clone()))
            .with_health(&url("Produits"), Scripted::ok(rich));

        let report = poller.poll_all(&gateway).await;

        let v1 = report.entry("Commandes V1").unwrap();
        assert_eq!(v1.status, DependencyStatus::Down);
        assert_eq!(v1.detail, Some(json!({ "message": "Table commandes vide" })));
        assert!(report.entry("Produits").unwrap().detail.is_none());
    }

    #[tokio::test]
    async fn test_all_down_still_completes() {
        let poller = HealthPoller::new(registry_of(&["x", "y"]));
        let report = poller.poll_all(&FakeGateway::default()).await;

        assert_eq!(report.count(DependencyStatus::Down), 2);
        assert!(!report.all_up());
    }

    #[test]
    fn test_unknown_report_before_first_cycle() {
        let report = HealthReport::unknown(&registry_of(&["x", "y"]));
        assert_eq!(report.count(DependencyStatus::Unknown), 2);
        assert_eq!(report.status("nope"), DependencyStatus::Unknown);
    }

    #[test]
    fn test_synthetic_body_serialization() {
        let body = serde_json::to_value(RawBody::failure("Inaccessible")).unwrap();
        assert_eq!(body, json!({"status": "DOWN", "error": "Inaccessible"}));
    }

    #[tokio::test]
    async fn test_monitor_publishes_and_overwrites() {
        let poller = Arc::new(HealthPoller::new(registry_of(&["a"])));
        let gateway: Arc<dyn Gateway> = Arc::new(
            FakeGateway::default().with_health(&url("a"), Scripted::ok(json!({"status": "UP"}))),
        );

        let monitor = HealthMonitor::spawn(poller, gateway, Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let latest = monitor.latest().await;
        assert_eq!(latest.status("a"), DependencyStatus::Up);
        assert!(latest.checked_at > 0);
    }

    #[tokio::test]
    async fn test_real_transport_timeout_does_not_hang_poll() {
        // Three actuators answering UP
        let app = axum::Router::new().route(
            "/:svc/actuator/health",
            axum::routing::get(|| async { axum::Json(json!({"status": "UP"})) }),
        );
        let up_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let up_addr = up_listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(up_listener, app).await.unwrap();
        });

        // One that accepts connections and never answers
        let silent = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let silent_addr = silent.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = silent.accept().await {
                held.push(socket);
            }
        });

        let base = format!("http://{}", up_addr);
        let registry = ServiceRegistry::new(vec![
            ServiceEndpoint::new("one", &base, "/one/actuator/health"),
            ServiceEndpoint::new("two", &base, "/two/actuator/health"),
            ServiceEndpoint::new("slow", &format!("http://{}", silent_addr), "/actuator/health"),
            ServiceEndpoint::new("three", &base, "/three/actuator/health"),
        ])
        .unwrap();
        let client = GatewayClient::new(
            "http://unused",
            &HttpConfig {
                timeout: Duration::from_millis(300),
                connect_timeout: Duration::from_millis(300),
            },
        )
        .unwrap();

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            HealthPoller::new(registry).poll_all(&client),
        )
        .await
        .expect("poll must not hang");

        assert_eq!(report.count(DependencyStatus::Up), 3);
        assert_eq!(report.count(DependencyStatus::Down), 1);
        assert_eq!(report.status("slow"), DependencyStatus::Down);
    }

    #[tokio::test]
    async fn test_real_unavailable_and_malformed_bodies() {
        use axum::http::StatusCode;

        let app = axum::Router::new()
            .route(
                "/down/actuator/health",
                axum::routing::get(|| async {
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        axum::Json(json!({
                            "status": "DOWN",
                            "components": {
                                "commande": { "status": "DOWN", "details": { "count": 0, "message": "vide" } }
                            }
                        })),
                    )
                }),
            )
            .route(
                "/garbled/actuator/health",
                axum::routing::get(|| async { "not json" }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let registry = ServiceRegistry::new(vec![
            ServiceEndpoint::new("Commandes V1", &base, "/down/actuator/health").with_detail("commande"),
            ServiceEndpoint::new("Produits", &base, "/garbled/actuator/health"),
        ])
        .unwrap();
        let client = GatewayClient::new("http://unused", &HttpConfig::default()).unwrap();

        let report = HealthPoller::new(registry).poll_all(&client).await;

        let down = report.entry("Commandes V1").unwrap();
        assert_eq!(down.status, DependencyStatus::Down);
        assert_eq!(down.detail, Some(json!({ "count": 0, "message": "vide" })));
        assert!(matches!(&down.raw_body, RawBody::Payload(body) if body["status"] == "DOWN"));

        let garbled = report.entry("Produits").unwrap();
        assert_eq!(garbled.status, DependencyStatus::Down);
        assert!(garbled.detail.is_none());
        match &garbled.raw_body {
            RawBody::Failure { status, error } => {
                assert_eq!(status, "DOWN");
                assert!(error.starts_with("Decode error"), "{}", error);
            }
            other => panic!("expected synthetic body, got {:?}", other),
        }
    }
}
