//! Service Endpoint Registry
//!
//! Static mapping from a logical service name to a reachable address and
//! resource path. Built once from configuration and never mutated.

use crate::types::ServiceLabel;
use anyhow::{anyhow, bail};
use serde::Serialize;

/// Spring actuator path exposed by every backend service
pub const ACTUATOR_HEALTH_PATH: &str = "/actuator/health";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceEndpoint {
    pub label: ServiceLabel,

    /// Scheme, host and port, without trailing slash
    pub base_url: String,

    /// Resource path, starting with '/'
    pub path: String,

    /// Health component whose `details` object is lifted into the report
    pub detail_component: Option<String>,
}

impl ServiceEndpoint {
    pub fn new(label: &str, base_url: &str, path: &str) -> Self {
        Self {
            label: ServiceLabel::new(label),
            base_url: base_url.trim_end_matches('/').to_string(),
            path: path.to_string(),
            detail_component: None,
        }
    }

    pub fn with_detail(mut self, component: &str) -> Self {
        self.detail_component = Some(component.to_string());
        self
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }

    /// Parse a `Label=url` entry. The URL is split at its path component.
    fn parse(entry: &str) -> anyhow::Result<Self> {
        let (label, url) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("expected Label=url, got '{}'", entry))?;
        let (label, url) = (label.trim(), url.trim());
        if label.is_empty() {
            bail!("empty label in '{}'", entry);
        }

        let scheme_end = url
            .find("://")
            .ok_or_else(|| anyhow!("missing scheme in '{}'", url))?
            + 3;
        let (base_url, path) = match url[scheme_end..].find('/') {
            Some(idx) => url.split_at(scheme_end + idx),
            None => (url, ACTUATOR_HEALTH_PATH),
        };

        Ok(Self::new(label, base_url, path))
    }
}

/// Ordered set of health targets
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceRegistry {
    endpoints: Vec<ServiceEndpoint>,
}

impl Default for ServiceRegistry {
    /// The four services of the local deployment, actuators on direct ports
    fn default() -> Self {
        Self {
            endpoints: vec![
                ServiceEndpoint::new("Commandes V1", "http://localhost:8081", ACTUATOR_HEALTH_PATH)
                    .with_detail("commande"),
                ServiceEndpoint::new("Produits", "http://localhost:8082", ACTUATOR_HEALTH_PATH),
                ServiceEndpoint::new("Commandes V2", "http://localhost:8083", ACTUATOR_HEALTH_PATH),
                ServiceEndpoint::new("Gateway", "http://localhost:8080", ACTUATOR_HEALTH_PATH),
            ],
        }
    }
}

impl ServiceRegistry {
    pub fn new(endpoints: Vec<ServiceEndpoint>) -> anyhow::Result<Self> {
        for (idx, endpoint) in endpoints.iter().enumerate() {
            if endpoints[..idx].iter().any(|e| e.label == endpoint.label) {
                bail!("duplicate service label '{}'", endpoint.label);
            }
        }
        Ok(Self { endpoints })
    }

    /// Build from a comma separated `Label=url` list
    ///
    /// # Example
    /// ```text
    /// Produits=http://localhost:8082/actuator/health,Gateway=http://localhost:8080
    /// ```
    pub fn parse(list: &str) -> anyhow::Result<Self> {
        let endpoints = list
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(ServiceEndpoint::parse)
            .collect::<anyhow::Result<Vec<_>>>()?;

        if endpoints.is_empty() {
            bail!("no health endpoints configured");
        }
        Self::new(endpoints)
    }

    /// Attach a detail component to the endpoint with the given label
    pub fn with_detail(mut self, label: &str, component: &str) -> anyhow::Result<Self> {
        let endpoint = self
            .endpoints
            .iter_mut()
            .find(|e| e.label.as_str() == label)
            .ok_or_else(|| anyhow!("unknown service label '{}'", label))?;
        endpoint.detail_component = Some(component.to_string());
        Ok(self)
    }

    #[cfg(test)]
    pub fn get(&self, label: &str) -> Option<&ServiceEndpoint> {
        self.endpoints.iter().find(|e| e.label.as_str() == label)
    }

    pub fn endpoints(&self) -> &[ServiceEndpoint] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
