use crate::registry::ServiceRegistry;
use anyhow::anyhow;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Gateway base address, every REST resource is resolved against it
    pub gateway_url: String,

    /// Server host
    pub server_host: String,

    /// Server port
    pub server_port: u16,

    /// Transport settings for outgoing calls
    pub http: HttpConfig,

    /// Health targets polled by the health view
    pub registry: ServiceRegistry,

    /// Background re-poll interval, `None` when disabled
    pub health_poll_interval: Option<Duration>,

    /// Literal looked for in a probed order's product name
    pub fallback_sentinel: String,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whole-request timeout
    pub timeout: Duration,

    pub connect_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            connect_timeout: Duration::from_millis(2000),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let mut registry = match std::env::var("HEALTH_ENDPOINTS") {
            Ok(list) => ServiceRegistry::parse(&list)?,
            Err(_) => ServiceRegistry::default(),
        };
        if let Ok(detail) = std::env::var("HEALTH_DETAIL") {
            let (label, component) = detail
                .split_once('=')
                .ok_or_else(|| anyhow!("HEALTH_DETAIL must be Label=component"))?;
            registry = registry.with_detail(label.trim(), component.trim())?;
        }

        let poll_secs: u64 = std::env::var("HEALTH_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "0".to_string())
            .parse()?;

        Ok(Config {
            gateway_url: std::env::var("GATEWAY_URL")
                .unwrap_or_else(|_| "http://localhost:8080/api".to_string()),
            server_host: std::env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: std::env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            http: HttpConfig {
                timeout: Duration::from_millis(
                    std::env::var("HTTP_TIMEOUT_MS")
                        .unwrap_or_else(|_| "5000".to_string())
                        .parse()?,
                ),
                connect_timeout: Duration::from_millis(
                    std::env::var("HTTP_CONNECT_TIMEOUT_MS")
                        .unwrap_or_else(|_| "2000".to_string())
                        .parse()?,
                ),
            },
            registry,
            health_poll_interval: (poll_secs > 0).then(|| Duration::from_secs(poll_secs)),
            fallback_sentinel: std::env::var("FALLBACK_SENTINEL")
                .unwrap_or_else(|_| "Fallback".to_string()),
        })
    }
}
