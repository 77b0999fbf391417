//! Fallback Probe
//!
//! Issues a single request against the order-by-id resource, whose server
//! handler sits behind a circuit breaker, and classifies the answer as
//! nominal or degraded. The probe sees no breaker state, only the data the
//! breaker's fallback path produces.
//!
//! # Staleness
//! ```text
//! begin(7)  → ticket #1 ──────────────── complete(#1) ✗ ignored
//! begin(9)  → ticket #2 ──── complete(#2) ✓ displayed
//! ```
//! Requests are never cancelled; a completion whose ticket is no longer the
//! newest one is discarded by `ProbeSession::complete`.

use crate::{
    gateway_client::Gateway,
    types::OrderDetail,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Decides from a decoded payload whether the server answered from its fallback path
pub trait DegradationSignal: Send + Sync {
    fn is_degraded(&self, detail: &OrderDetail) -> bool;
}

/// Case-sensitive substring match on the nested product name
///
/// The fallback path of the order service names its placeholder product
/// `"Fallback (Erreur: ...)"`. A payload with no product or no name is
/// ambiguous and counts as nominal.
#[derive(Debug, Clone)]
pub struct SentinelNameMatch {
    sentinel: String,
}

impl SentinelNameMatch {
    pub fn new(sentinel: &str) -> Self {
        Self {
            sentinel: sentinel.to_string(),
        }
    }
}

impl Default for SentinelNameMatch {
    fn default() -> Self {
        Self::new("Fallback")
    }
}

impl DegradationSignal for SentinelNameMatch {
    fn is_degraded(&self, detail: &OrderDetail) -> bool {
        match detail.product.as_ref().and_then(|p| p.name.as_deref()) {
            Some(name) => name.contains(&self.sentinel),
            None => {
                debug!("Probe payload has no product name, classifying as nominal");
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeOutcome {
    Pending,
    Classified,
    Errored,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub target_id: i64,
    pub outcome: ProbeOutcome,
    /// Never set on an errored probe
    pub is_degraded: bool,
    pub observed_label: String,
    pub observed_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn pending(target_id: i64) -> Self {
        Self {
            target_id,
            outcome: ProbeOutcome::Pending,
            is_degraded: false,
            observed_label: String::new(),
            observed_amount: Decimal::ZERO,
            error: None,
        }
    }
}

pub struct FallbackProbe {
    signal: Box<dyn DegradationSignal>,
}

impl FallbackProbe {
    pub fn new(signal: impl DegradationSignal + 'static) -> Self {
        Self {
            signal: Box::new(signal),
        }
    }

    /// Probe one order. Never retries and never returns an error: failures
    /// come back as an `Errored` result.
    pub async fn probe(&self, gateway: &dyn Gateway, target_id: i64) -> ProbeResult {
        let mut result = ProbeResult::pending(target_id);

        match gateway.get_order(target_id).await {
            Ok(detail) => {
                result.outcome = ProbeOutcome::Classified;
                result.is_degraded = self.signal.is_degraded(&detail);
                result.observed_label = detail
                    .product
                    .as_ref()
                    .and_then(|p| p.name.clone())
                    .unwrap_or_default();
                result.observed_amount = detail.amount.unwrap_or(Decimal::ZERO);

                info!(
                    "Probe on order {}: {} ('{}')",
                    target_id,
                    if result.is_degraded { "degraded" } else { "nominal" },
                    result.observed_label
                );
            }
            Err(e) => {
                warn!("Probe on order {} failed: {}", target_id, e);
                result.outcome = ProbeOutcome::Errored;
                result.error = Some(e.to_string());
            }
        }

        result
    }
}

/// Handle returned by `ProbeSession::begin`, presented again on completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTicket {
    pub target_id: i64,
    pub sequence: u64,
}

/// What the probe panel currently displays
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ProbeState {
    Idle,
    Probing { target_id: i64, sequence: u64 },
    Classified { result: ProbeResult },
    Errored { target_id: i64, reason: String },
}

/// Owned per-view state machine: at most one live probe
#[derive(Debug)]
pub struct ProbeSession {
    state: ProbeState,
    sequence: u64,
}

impl Default for ProbeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeSession {
    pub fn new() -> Self {
        Self {
            state: ProbeState::Idle,
            sequence: 0,
        }
    }

    pub fn state(&self) -> &ProbeState {
        &self.state
    }

    /// Start a probe, invalidating whatever was live before
    pub fn begin(&mut self, target_id: i64) -> ProbeTicket {
        self.sequence += 1;
        self.state = ProbeState::Probing {
            target_id,
            sequence: self.sequence,
        };
        debug!("Probe #{} started for order {}", self.sequence, target_id);

        ProbeTicket {
            target_id,
            sequence: self.sequence,
        }
    }

    /// Apply a completion. Returns false (and changes nothing) when a newer
    /// probe has started since `ticket` was issued.
    pub fn complete(&mut self, ticket: ProbeTicket, result: ProbeResult) -> bool {
        if ticket.sequence != self.sequence {
            debug!(
                "Discarding stale probe #{} for order {} (live: #{})",
                ticket.sequence, ticket.target_id, self.sequence
            );
            return false;
        }

        self.state = match result.outcome {
            ProbeOutcome::Errored => ProbeState::Errored {
                target_id: result.target_id,
                reason: result.error.unwrap_or_default(),
            },
            ProbeOutcome::Classified => ProbeState::Classified { result },
            ProbeOutcome::Pending => return false,
        };
        true
    }
}
