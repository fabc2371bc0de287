use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::core::rate_budget::{RateBudget, RateLimitConfig};
use crate::core::scoring::ScoreProvider;
use crate::core::simulated::SimulatedResultGenerator;
use crate::core::SearchAggregator;
use crate::models::{FailureKind, MatchCandidate, Provider, ProviderOutcome, ScoreProfile};
use crate::services::adapters::{spec_for, MapContext, ProviderSpec, RequestContext};

/// Errors from a single live provider call
///
/// These never leave [`ProviderClient::search`]; they decide which fallback
/// is used and get logged.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limit exceeded")]
    RateLimited,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response format: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::RateLimited => FailureKind::RateLimited,
            _ => FailureKind::Unavailable,
        }
    }
}

/// One searchable social network
///
/// `search` always produces an outcome: failures are absorbed and turned into
/// fallback (or empty) results for this provider only.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn search(&self, query: &str, timeout: Duration) -> ProviderOutcome;
}

/// Resolved settings for one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub base_url: String,
    pub api_key: String,
    pub rate_limit: RateLimitConfig,
    pub fallback_count: usize,
    pub score_profile: ScoreProfile,
    pub simulate_on_failure: bool,
    pub page_size: u32,
}

impl ProviderConfig {
    pub fn defaults(provider: Provider) -> Self {
        Self {
            provider,
            base_url: spec_for(provider).default_base_url.to_string(),
            api_key: String::new(),
            rate_limit: RateLimitConfig::per_minute(provider.default_rate_limit()),
            fallback_count: provider.default_fallback_count(),
            score_profile: provider.default_score_profile(),
            simulate_on_failure: true,
            page_size: 10,
        }
    }
}

/// Live client for any network described by a [`ProviderSpec`]
pub struct HttpProviderClient {
    config: ProviderConfig,
    spec: &'static ProviderSpec,
    http: Client,
    budget: Arc<RateBudget>,
    generator: Arc<SimulatedResultGenerator>,
    scorer: Arc<dyn ScoreProvider>,
}

impl HttpProviderClient {
    pub fn new(
        config: ProviderConfig,
        http: Client,
        budget: Arc<RateBudget>,
        generator: Arc<SimulatedResultGenerator>,
        scorer: Arc<dyn ScoreProvider>,
    ) -> Self {
        Self {
            spec: spec_for(config.provider),
            config,
            http,
            budget,
            generator,
            scorer,
        }
    }

    /// Budget check, live call and mapping; any error means "use the fallback"
    async fn fetch(
        &self,
        query: &str,
        timeout: Duration,
    ) -> Result<Vec<MatchCandidate>, ProviderError> {
        let provider = self.config.provider;

        if !self.budget.try_consume(provider) {
            return Err(ProviderError::RateLimited);
        }

        let request = (self.spec.build_request)(&RequestContext {
            base_url: &self.config.base_url,
            api_key: &self.config.api_key,
            query,
            page_size: self.config.page_size,
        });

        tracing::debug!("Dispatching {} search for '{}'", provider, query);

        let call = async {
            let mut builder = self.http.get(&request.url);
            for (name, value) in &request.headers {
                builder = builder.header(*name, value);
            }

            let response = builder.send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read body".to_string());
                return Err(ProviderError::Api {
                    status: status.as_u16(),
                    body: body.chars().take(200).collect(),
                });
            }

            let body = response.text().await?;
            serde_json::from_str::<Value>(&body)
                .map_err(|e| ProviderError::Malformed(e.to_string()))
        };

        let json = tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| ProviderError::Timeout(timeout))??;

        let items = json
            .pointer(self.spec.items_pointer)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ProviderError::Malformed(format!(
                    "missing item array at {}",
                    self.spec.items_pointer
                ))
            })?;

        let ctx = MapContext {
            query,
            scorer: self.scorer.as_ref(),
            profile: self.config.score_profile,
        };

        let candidates: Vec<MatchCandidate> = items
            .iter()
            .filter_map(|item| (self.spec.map_item)(item, &ctx))
            .collect();

        if candidates.len() < items.len() {
            tracing::debug!(
                "{} skipped {} unusable items",
                provider,
                items.len() - candidates.len()
            );
        }

        Ok(candidates)
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    fn provider(&self) -> Provider {
        self.config.provider
    }

    async fn search(&self, query: &str, timeout: Duration) -> ProviderOutcome {
        let provider = self.config.provider;

        match self.fetch(query, timeout).await {
            Ok(candidates) => {
                tracing::debug!("{} returned {} live candidates", provider, candidates.len());
                ProviderOutcome::live(provider, candidates)
            }
            Err(e) => {
                let kind = e.kind();
                if self.config.simulate_on_failure {
                    tracing::warn!(
                        "{} search failed ({}), using {} simulated results: {}",
                        provider,
                        kind,
                        self.config.fallback_count,
                        e
                    );
                    let candidates = self
                        .generator
                        .generate(provider, query, self.config.fallback_count);
                    ProviderOutcome::fallback(provider, candidates, kind)
                } else {
                    tracing::warn!("{} search failed ({}): {}", provider, kind, e);
                    ProviderOutcome::failed(provider, kind)
                }
            }
        }
    }
}

/// Shared outbound HTTP client
pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Wire the rate budget, fallback generator and one client per provider
///
/// Providers are registered in the order given.
pub fn build_aggregator(
    configs: Vec<ProviderConfig>,
    timeout: Duration,
    scorer: Arc<dyn ScoreProvider>,
) -> Result<SearchAggregator, reqwest::Error> {
    let started = Instant::now();
    let http = http_client()?;

    let budget = Arc::new(RateBudget::new(
        configs.iter().map(|c| (c.provider, c.rate_limit)),
    ));
    let generator = Arc::new(SimulatedResultGenerator::with_profiles(
        Arc::clone(&scorer),
        configs.iter().map(|c| (c.provider, c.score_profile)),
    ));

    let clients: Vec<Arc<dyn ProviderClient>> = configs
        .into_iter()
        .map(|config| {
            Arc::new(HttpProviderClient::new(
                config,
                http.clone(),
                Arc::clone(&budget),
                Arc::clone(&generator),
                Arc::clone(&scorer),
            )) as Arc<dyn ProviderClient>
        })
        .collect();

    tracing::debug!("Registered {} providers in {:?}", clients.len(), started.elapsed());

    Ok(SearchAggregator::new(clients, budget, timeout))
}
