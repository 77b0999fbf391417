//! Dependency Aggregator
//!
//! Issues a labeled set of independent fetches concurrently, waits for every
//! one of them to settle and assembles a single result with one entry per
//! label.
//!
//! # Architecture
//! ```text
//! orders  (blocking)    ─┐
//!                        ├─→ [join_all] ─→ AggregatedResult { orders: Up, catalog: Down }
//! catalog (best-effort) ─┘
//! ```
//!
//! A failed blocking label fails the whole call, but only after every other
//! fetch has settled. A failed best-effort label is recorded as `Down` and
//! reads back as its neutral payload.

use crate::{
    error::{ConsoleError, Result},
    types::{DependencyStatus, ServiceLabel},
};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde::Serialize;
use std::future::Future;
use tracing::{debug, error, warn};

/// What a label's failure does to the enclosing call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
    /// Failure fails the aggregation
    Blocking,
    /// Failure degrades the label to `Down`
    BestEffort,
}

/// One labeled fetch operation awaiting execution
pub struct FetchRequest<'a, T> {
    label: ServiceLabel,
    policy: FetchPolicy,
    neutral: Option<T>,
    fetch: BoxFuture<'a, Result<T>>,
}

impl<'a, T> FetchRequest<'a, T> {
    /// A fetch the caller cannot render without
    pub fn blocking<F>(label: impl Into<ServiceLabel>, fetch: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'a,
    {
        Self {
            label: label.into(),
            policy: FetchPolicy::Blocking,
            neutral: None,
            fetch: fetch.boxed(),
        }
    }

    /// A fetch whose failure substitutes `neutral` (usually an empty list)
    pub fn best_effort<F>(label: impl Into<ServiceLabel>, fetch: F, neutral: T) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'a,
    {
        Self {
            label: label.into(),
            policy: FetchPolicy::BestEffort,
            neutral: Some(neutral),
            fetch: fetch.boxed(),
        }
    }
}

/// Outcome of a single fetch. Exactly one of payload or failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled<T> {
    Payload(T),
    Failure(String),
}

#[derive(Debug)]
pub struct LabelEntry<T> {
    pub label: ServiceLabel,
    pub policy: FetchPolicy,
    pub status: DependencyStatus,
    pub settled: Settled<T>,
    neutral: Option<T>,
}

impl<T> LabelEntry<T> {
    /// Decoded payload, or the neutral substitute of a failed best-effort fetch
    #[cfg(test)]
    pub fn payload(&self) -> Option<&T> {
        match &self.settled {
            Settled::Payload(payload) => Some(payload),
            Settled::Failure(_) => self.neutral.as_ref(),
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match &self.settled {
            Settled::Payload(_) => None,
            Settled::Failure(reason) => Some(reason),
        }
    }

    fn into_payload(self) -> Option<T> {
        match self.settled {
            Settled::Payload(payload) => Some(payload),
            Settled::Failure(_) => self.neutral,
        }
    }
}

/// Combined outcome of one aggregation, one entry per requested label in
/// request order
#[derive(Debug)]
pub struct AggregatedResult<T> {
    entries: Vec<LabelEntry<T>>,
}

impl<T> AggregatedResult<T> {
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, label: &str) -> Option<&LabelEntry<T>> {
        self.entries.iter().find(|e| e.label.as_str() == label)
    }

    pub fn entries(&self) -> &[LabelEntry<T>] {
        &self.entries
    }

    pub fn status(&self, label: &str) -> DependencyStatus {
        self.entry(label)
            .map(|e| e.status)
            .unwrap_or(DependencyStatus::Unknown)
    }

    /// Per-label status map, request order preserved
    #[cfg(test)]
    pub fn statuses(&self) -> Vec<(ServiceLabel, DependencyStatus)> {
        self.entries
            .iter()
            .map(|e| (e.label.clone(), e.status))
            .collect()
    }

    #[cfg(test)]
    pub fn failure_reason(&self, label: &str) -> Option<&str> {
        self.entry(label).and_then(LabelEntry::failure)
    }

    /// Move a label's payload (or neutral substitute) out of the result
    pub fn take(&mut self, label: &str) -> Option<T> {
        let idx = self.entries.iter().position(|e| e.label.as_str() == label)?;
        self.entries.remove(idx).into_payload()
    }
}

/// Fan-out/join executor for labeled dependency fetches
pub struct DependencyAggregator {
    /// Name used in log lines (e.g. the page being loaded)
    name: String,
}

impl DependencyAggregator {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    /// Run every request concurrently and wait for all of them to settle
    ///
    /// # Algorithm
    /// 1. Reject duplicate labels before anything is sent
    /// 2. Poll all fetches together with `join_all` (no short-circuit)
    /// 3. Record each outcome against its label: `Up` on payload, `Down` on failure
    /// 4. If any blocking label failed, return the first one in request order
    ///
    /// # Errors
    /// * `InvalidInput` - The same label was requested twice
    /// * `BlockingDependency` - A blocking fetch failed; carries label and cause
    pub async fn run<'a, T: Send + 'a>(
        &self,
        requests: Vec<FetchRequest<'a, T>>,
    ) -> Result<AggregatedResult<T>> {
        for (idx, request) in requests.iter().enumerate() {
            if requests[..idx].iter().any(|r| r.label == request.label) {
                return Err(ConsoleError::InvalidInput(format!(
                    "label '{}' requested twice",
                    request.label
                )));
            }
        }

        debug!("{}: fanning out {} fetches", self.name, requests.len());

        let mut pending = Vec::with_capacity(requests.len());
        let mut fetches = Vec::with_capacity(requests.len());
        for request in requests {
            pending.push((request.label, request.policy, request.neutral));
            fetches.push(request.fetch);
        }

        // Join barrier: nothing below runs until every fetch has settled
        let outcomes = join_all(fetches).await;

        let mut entries = Vec::with_capacity(outcomes.len());
        let mut blocking_failure = None;

        for ((label, policy, neutral), outcome) in pending.into_iter().zip(outcomes) {
            let (status, settled) = match outcome {
                Ok(payload) => {
                    debug!("{}: '{}' settled Up", self.name, label);
                    (DependencyStatus::Up, Settled::Payload(payload))
                }
                Err(e) => {
                    let reason = e.to_string();
                    match policy {
                        FetchPolicy::Blocking => {
                            error!("{}: blocking dependency '{}' failed: {}", self.name, label, reason);
                            if blocking_failure.is_none() {
                                blocking_failure = Some(ConsoleError::blocking(label.clone(), e));
                            }
                        }
                        FetchPolicy::BestEffort => {
                            warn!("{}: '{}' degraded: {}", self.name, label, reason);
                        }
                    }
                    (DependencyStatus::Down, Settled::Failure(reason))
                }
            };

            entries.push(LabelEntry {
                label,
                policy,
                status,
                settled,
                neutral,
            });
        }

        match blocking_failure {
            Some(err) => Err(err),
            None => Ok(AggregatedResult { entries }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    async fn settle_after(ms: u64, outcome: Result<u32>) -> Result<u32> {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        outcome
    }

    fn transport(msg: &str) -> ConsoleError {
        ConsoleError::Transport(msg.to_string())
    }

    #[tokio::test]
    async fn test_every_label_present_regardless_of_completion_order() {
        let aggregator = DependencyAggregator::new("test");
        // Completion order is the reverse of request order
        let requests = vec![
            FetchRequest::best_effort("a", settle_after(40, Ok(1)), 0),
            FetchRequest::best_effort("b", settle_after(30, Err(transport("b down"))), 0),
            FetchRequest::best_effort("c", settle_after(20, Ok(3)), 0),
            FetchRequest::best_effort("d", settle_after(10, Err(transport("d down"))), 0),
        ];

        let result = aggregator.run(requests).await.unwrap();

        assert_eq!(result.len(), 4);
        let labels: Vec<String> = result.statuses().iter().map(|(l, _)| l.to_string()).collect();
        assert_eq!(labels, vec!["a", "b", "c", "d"]);
        for entry in result.entries() {
            assert!(entry.payload().is_some());
            assert_eq!(entry.failure().is_some(), entry.status == DependencyStatus::Down);
        }
        assert_eq!(result.status("a"), DependencyStatus::Up);
        assert_eq!(result.status("b"), DependencyStatus::Down);
        assert_eq!(result.failure_reason("d"), Some("Transport error: d down"));
    }

    #[tokio::test]
    async fn test_best_effort_failure_substitutes_neutral() {
        let aggregator = DependencyAggregator::new("test");
        let requests = vec![
            FetchRequest::blocking("orders", settle_after(5, Ok(10))),
            FetchRequest::best_effort("catalog", settle_after(5, Err(transport("refused"))), 0),
        ];

        let mut result = aggregator.run(requests).await.unwrap();

        assert_eq!(result.status("orders"), DependencyStatus::Up);
        assert_eq!(result.status("catalog"), DependencyStatus::Down);
        assert_eq!(result.take("catalog"), Some(0));
        assert_eq!(result.take("orders"), Some(10));
        assert_eq!(result.take("orders"), None);
    }

    #[tokio::test]
    async fn test_blocking_failure_fails_call_after_all_settle() {
        let aggregator = DependencyAggregator::new("test");
        let settled = Arc::new(AtomicUsize::new(0));

        let slow = {
            let settled = settled.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                settled.fetch_add(1, Ordering::SeqCst);
                Ok(2)
            }
        };
        let requests = vec![
            FetchRequest::blocking("orders", settle_after(1, Err(transport("boom")))),
            FetchRequest::best_effort("catalog", slow, 0),
        ];

        let err = aggregator.run(requests).await.unwrap_err();

        assert_eq!(settled.load(Ordering::SeqCst), 1);
        match err {
            ConsoleError::BlockingDependency { label, source } => {
                assert_eq!(label.as_str(), "orders");
                assert!(matches!(*source, ConsoleError::Transport(_)));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_first_blocking_failure_in_request_order_wins() {
        let aggregator = DependencyAggregator::new("test");
        let requests = vec![
            FetchRequest::blocking("first", settle_after(30, Err(transport("late")))),
            FetchRequest::blocking("second", settle_after(1, Err(transport("early")))),
        ];

        match aggregator.run(requests).await {
            Err(ConsoleError::BlockingDependency { label, .. }) => assert_eq!(label.as_str(), "first"),
            other => panic!("unexpected result: {:?}", other.map(|r| r.len())),
        }
    }

    #[tokio::test]
    async fn test_fetches_run_concurrently() {
        let aggregator = DependencyAggregator::new("test");
        let requests: Vec<_> = (0..5)
            .map(|i| FetchRequest::best_effort(format!("svc-{}", i).as_str(), settle_after(100, Ok(i)), 0))
            .collect();

        let started = std::time::Instant::now();
        let result = aggregator.run(requests).await.unwrap();

        assert_eq!(result.len(), 5);
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_duplicate_labels_rejected() {
        let aggregator = DependencyAggregator::new("test");
        let requests = vec![
            FetchRequest::best_effort("x", settle_after(1, Ok(1)), 0),
            FetchRequest::best_effort("x", settle_after(1, Ok(2)), 0),
        ];

        assert!(matches!(
            aggregator.run(requests).await,
            Err(ConsoleError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_request_set() {
        let aggregator = DependencyAggregator::new("test");
        let result = aggregator.run(Vec::<FetchRequest<'_, u32>>::new()).await.unwrap();
        assert!(result.is_empty());
    }
}
