use futures::future::join_all;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::core::rate_budget::RateBudget;
use crate::core::scoring::clamp_score;
use crate::models::{
    AggregatedResult, FailureKind, MatchCandidate, Provider, ProviderOutcome, RateLimitStatus,
    SearchRequest,
};
use crate::services::ProviderClient;

/// Extra time a provider task gets past its own timeout before it is abandoned
const DISPATCH_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum SearchError {
    /// Every provider task panicked. This is a bug, not a provider outage.
    #[error("all {0} provider tasks crashed")]
    AllProvidersCrashed(usize),
}

/// Fans one query out to every provider and merges the results
///
/// # Pipeline
/// 1. Select the requested providers (registration order)
/// 2. Run every provider search concurrently, each on its own task
/// 3. Wait for all of them; a crashed task contributes nothing
/// 4. Concatenate, stable-sort by score, drop duplicate ids
pub struct SearchAggregator {
    clients: Vec<Arc<dyn ProviderClient>>,
    budget: Arc<RateBudget>,
    timeout: Duration,
}

impl SearchAggregator {
    pub fn new(
        clients: Vec<Arc<dyn ProviderClient>>,
        budget: Arc<RateBudget>,
        timeout: Duration,
    ) -> Self {
        Self {
            clients,
            budget,
            timeout,
        }
    }

    /// Registered providers, in registration order
    pub fn providers(&self) -> Vec<Provider> {
        self.clients.iter().map(|c| c.provider()).collect()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Read-only view of every provider's rate window
    pub fn rate_limits(&self) -> BTreeMap<Provider, RateLimitStatus> {
        self.budget.snapshot()
    }

    /// Run one search across the requested providers
    pub async fn search(&self, request: &SearchRequest) -> Result<AggregatedResult, SearchError> {
        let start = Instant::now();

        let selected: Vec<Arc<dyn ProviderClient>> = self
            .clients
            .iter()
            .filter(|c| request.includes(c.provider()))
            .cloned()
            .collect();

        if selected.is_empty() {
            tracing::warn!("No registered provider selected for query '{}'", request.query);
            return Ok(AggregatedResult {
                query: request.query.clone(),
                candidates: Vec::new(),
                total_found: 0,
                sources: Vec::new(),
            });
        }

        let handles: Vec<_> = selected
            .iter()
            .map(|client| {
                let client = Arc::clone(client);
                let query = request.query.clone();
                let timeout = self.timeout;

                tokio::spawn(async move {
                    let provider = client.provider();
                    let started = Instant::now();

                    let deadline = timeout.saturating_add(DISPATCH_GRACE);
                    let outcome =
                        match tokio::time::timeout(deadline, client.search(&query, timeout)).await {
                            Ok(outcome) => outcome,
                            Err(_) => {
                                tracing::error!(
                                    "{} search ignored its {:?} timeout, dropping it",
                                    provider,
                                    timeout
                                );
                                ProviderOutcome::failed(provider, FailureKind::Unavailable)
                            }
                        };

                    outcome.with_duration_ms(started.elapsed().as_millis() as u64)
                })
            })
            .collect();

        let joined = join_all(handles).await;

        let mut crashed = 0;
        let outcomes: Vec<ProviderOutcome> = selected
            .iter()
            .zip(joined)
            .map(|(client, result)| match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    crashed += 1;
                    tracing::error!("{} search task crashed: {}", client.provider(), e);
                    ProviderOutcome::failed(client.provider(), FailureKind::Crashed)
                }
            })
            .collect();

        if crashed == selected.len() {
            return Err(SearchError::AllProvidersCrashed(crashed));
        }

        let sources = outcomes.iter().map(ProviderOutcome::report).collect::<Vec<_>>();
        let candidates = merge_ranked(outcomes);
        let total_found = candidates.len();

        tracing::info!(
            "Search '{}' found {} candidates in {}ms ({})",
            request.query,
            total_found,
            start.elapsed().as_millis(),
            sources
                .iter()
                .map(|s| format!("{}={:?}:{}", s.provider.key(), s.status, s.count))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(AggregatedResult {
            query: request.query.clone(),
            candidates,
            total_found,
            sources,
        })
    }
}

/// Concatenate provider results in order, rank by score and drop duplicate ids
///
/// The sort is stable: candidates with equal scores keep their provider order.
/// When an id appears twice, the higher-ranked copy wins.
pub fn merge_ranked(outcomes: Vec<ProviderOutcome>) -> Vec<MatchCandidate> {
    let mut merged: Vec<MatchCandidate> = outcomes
        .into_iter()
        .flat_map(|outcome| outcome.candidates)
        .map(|mut candidate| {
            candidate.score = clamp_score(candidate.score);
            candidate
        })
        .collect();

    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen = HashSet::with_capacity(merged.len());
    merged.retain(|candidate| seen.insert(candidate.id.clone()));

    merged
}
