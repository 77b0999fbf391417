use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a logical dependency (e.g. "orders", "catalog", "Gateway")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceLabel(String);

impl ServiceLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceLabel {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for ServiceLabel {
    fn from(label: String) -> Self {
        Self(label)
    }
}

/// Last observed state of a dependency. The last probe always wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DependencyStatus {
    #[default]
    Unknown,
    Up,
    Down,
}

impl DependencyStatus {
    pub fn is_up(&self) -> bool {
        matches!(self, DependencyStatus::Up)
    }
}

/// Catalog item as served by `GET /produits`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i64,

    #[serde(rename = "nom")]
    pub name: String,

    /// Unit price, never negative
    #[serde(rename = "prix", with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
}

/// Order as listed by `GET /v2/commandes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "idProduit", default)]
    pub catalog_item_id: Option<i64>,

    #[serde(rename = "quantite", default)]
    pub quantity: Option<i64>,

    #[serde(rename = "montant", default, with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,

    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Body of `POST /v2/commandes` and `PUT /v2/commandes/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPayload {
    pub description: String,

    #[serde(rename = "idProduit")]
    pub catalog_item_id: Option<i64>,

    #[serde(rename = "quantite")]
    pub quantity: i64,

    /// Client-computed; the order service stores it without recomputing
    #[serde(rename = "montant", with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    pub date: NaiveDate,
}

/// Reference object nested in `GET /v2/commandes/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRef {
    #[serde(rename = "nom", default)]
    pub name: Option<String>,

    #[serde(rename = "prix", default, with = "rust_decimal::serde::float_option")]
    pub unit_price: Option<Decimal>,
}

/// Single order enriched with its catalog reference, when resolvable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(default)]
    pub id: Option<i64>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(rename = "montant", default, with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,

    #[serde(default)]
    pub date: Option<NaiveDate>,

    #[serde(rename = "produit", default)]
    pub product: Option<ProductRef>,
}

/// Order from the legacy (v1) order service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyOrder {
    pub id: i64,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "quantite", default)]
    pub quantity: Option<i64>,

    #[serde(rename = "montant", default, with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,

    #[serde(default)]
    pub date: Option<NaiveDate>,
}
