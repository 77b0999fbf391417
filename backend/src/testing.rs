//! In-memory `Gateway` with scripted outcomes and delays, for tests

use crate::{
    error::{ConsoleError, Result},
    gateway_client::Gateway,
    types::{CatalogItem, LegacyOrder, Order, OrderDetail, OrderPayload},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Outcome handed back after `delay`
#[derive(Debug, Clone)]
pub struct Scripted<T> {
    delay: Duration,
    outcome: std::result::Result<T, String>,
}

impl<T: Clone> Scripted<T> {
    pub fn ok(value: T) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Ok(value),
        }
    }

    pub fn fail(reason: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Err(reason.to_string()),
        }
    }

    pub fn after(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    async fn resolve(&self) -> Result<T> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone().map_err(ConsoleError::Transport)
    }
}

impl<T> Default for Scripted<T> {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Err("not scripted".to_string()),
        }
    }
}

#[derive(Default)]
pub struct FakeGateway {
    pub products: Scripted<Vec<CatalogItem>>,
    pub orders: Scripted<Vec<Order>>,
    pub order_details: HashMap<i64, Scripted<OrderDetail>>,
    pub legacy_orders: Scripted<Vec<LegacyOrder>>,
    pub recent_legacy_orders: Scripted<Vec<LegacyOrder>>,
    pub health: HashMap<String, Scripted<serde_json::Value>>,
    pub created: Arc<Mutex<Vec<OrderPayload>>>,
    pub updated: Arc<Mutex<Vec<(i64, OrderPayload)>>>,
    pub deleted: Arc<Mutex<Vec<i64>>>,
}

impl FakeGateway {
    pub fn with_detail(mut self, id: i64, detail: Scripted<OrderDetail>) -> Self {
        self.order_details.insert(id, detail);
        self
    }

    pub fn with_health(mut self, url: &str, body: Scripted<serde_json::Value>) -> Self {
        self.health.insert(url.to_string(), body);
        self
    }
}

fn stored(payload: &OrderPayload, id: i64) -> Order {
    Order {
        id,
        description: payload.description.clone(),
        catalog_item_id: payload.catalog_item_id,
        quantity: Some(payload.quantity),
        amount: Some(payload.amount),
        date: Some(payload.date),
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn list_products(&self) -> Result<Vec<CatalogItem>> {
        self.products.resolve().await
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        self.orders.resolve().await
    }

    async fn get_order(&self, id: i64) -> Result<OrderDetail> {
        match self.order_details.get(&id) {
            Some(detail) => detail.resolve().await,
            None => Err(ConsoleError::Upstream {
                status: 404,
                message: "Commande non trouvée".to_string(),
            }),
        }
    }

    async fn create_order(&self, payload: &OrderPayload) -> Result<Order> {
        let mut created = self.created.lock().unwrap();
        created.push(payload.clone());
        Ok(stored(payload, created.len() as i64))
    }

    async fn update_order(&self, id: i64, payload: &OrderPayload) -> Result<Order> {
        self.updated.lock().unwrap().push((id, payload.clone()));
        Ok(stored(payload, id))
    }

    async fn delete_order(&self, id: i64) -> Result<()> {
        self.deleted.lock().unwrap().push(id);
        Ok(())
    }

    async fn list_legacy_orders(&self) -> Result<Vec<LegacyOrder>> {
        self.legacy_orders.resolve().await
    }

    async fn list_recent_legacy_orders(&self) -> Result<Vec<LegacyOrder>> {
        self.recent_legacy_orders.resolve().await
    }

    async fn fetch_health(&self, url: &str) -> Result<serde_json::Value> {
        match self.health.get(url) {
            Some(body) => body.resolve().await,
            None => Err(ConsoleError::Transport(format!("connection refused: {}", url))),
        }
    }
}
