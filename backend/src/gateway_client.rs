//! Gateway Client
//!
//! Thin REST client over the gateway that fronts the catalog service and
//! both generations of the order service. Every call is a single request;
//! retries and timeouts belong to the transport, and a timeout comes back as
//! an ordinary `Transport` error.

use crate::{
    config::HttpConfig,
    error::{ConsoleError, Result},
    types::{CatalogItem, LegacyOrder, Order, OrderDetail, OrderPayload},
};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

/// REST boundary consumed by the console
#[async_trait]
pub trait Gateway: Send + Sync {
    /// `GET /produits`
    async fn list_products(&self) -> Result<Vec<CatalogItem>>;

    /// `GET /v2/commandes`
    async fn list_orders(&self) -> Result<Vec<Order>>;

    /// `GET /v2/commandes/{id}`, served behind the order service's circuit breaker
    async fn get_order(&self, id: i64) -> Result<OrderDetail>;

    /// `POST /v2/commandes`
    async fn create_order(&self, payload: &OrderPayload) -> Result<Order>;

    /// `PUT /v2/commandes/{id}`
    async fn update_order(&self, id: i64, payload: &OrderPayload) -> Result<Order>;

    /// `DELETE /v2/commandes/{id}`
    async fn delete_order(&self, id: i64) -> Result<()>;

    /// `GET /v1/commandes/all`
    async fn list_legacy_orders(&self) -> Result<Vec<LegacyOrder>>;

    /// `GET /v1/commandes/recent`
    async fn list_recent_legacy_orders(&self) -> Result<Vec<LegacyOrder>>;

    /// `GET {service}/actuator/health`, addressed directly rather than through the gateway
    async fn fetch_health(&self, url: &str) -> Result<serde_json::Value>;
}

pub struct GatewayClient {
    http: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str, config: &HttpConfig) -> Result<Self> {
        let http = Client::builder()
            .pool_max_idle_per_host(16)
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConsoleError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET {}", url);
        let response = self.http.get(url).send().await?;
        decode(check_status(response).await?).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: &B,
    ) -> Result<T> {
        debug!("{} {}", method, url);
        let response = self.http.request(method, url).json(body).send().await?;
        decode(check_status(response).await?).await
    }
}

/// Turn a non-2xx response into an `Upstream` error carrying its body text
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let message = response.text().await.unwrap_or_default();
    warn!("{} answered {}", url, status);
    Err(ConsoleError::Upstream {
        status: status.as_u16(),
        message: if message.is_empty() { url } else { message },
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ConsoleError::Decode(e.to_string()))
}

#[async_trait]
impl Gateway for GatewayClient {
    async fn list_products(&self) -> Result<Vec<CatalogItem>> {
        self.get_json(&self.url("/produits")).await
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        self.get_json(&self.url("/v2/commandes")).await
    }

    async fn get_order(&self, id: i64) -> Result<OrderDetail> {
        self.get_json(&self.url(&format!("/v2/commandes/{}", id))).await
    }

    async fn create_order(&self, payload: &OrderPayload) -> Result<Order> {
        self.send_json(reqwest::Method::POST, &self.url("/v2/commandes"), payload)
            .await
    }

    async fn update_order(&self, id: i64, payload: &OrderPayload) -> Result<Order> {
        self.send_json(
            reqwest::Method::PUT,
            &self.url(&format!("/v2/commandes/{}", id)),
            payload,
        )
        .await
    }

    async fn delete_order(&self, id: i64) -> Result<()> {
        let url = self.url(&format!("/v2/commandes/{}", id));
        debug!("DELETE {}", url);
        let response = self.http.delete(&url).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn list_legacy_orders(&self) -> Result<Vec<LegacyOrder>> {
        self.get_json(&self.url("/v1/commandes/all")).await
    }

    async fn list_recent_legacy_orders(&self) -> Result<Vec<LegacyOrder>> {
        self.get_json(&self.url("/v1/commandes/recent")).await
    }

    async fn fetch_health(&self, url: &str) -> Result<serde_json::Value> {
        // Actuator answers 503 with a full body when a component is DOWN
        debug!("GET {}", url);
        let response = self.http.get(url).send().await?;
        if response.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return decode(response).await;
        }
        decode(check_status(response).await?).await
    }
}
