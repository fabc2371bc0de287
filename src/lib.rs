//! Photo Search - people search across social networks for an uploaded photo
//!
//! One query token is fanned out to every configured network concurrently.
//! Each network is guarded by its own fixed-window rate budget, and a network
//! that is throttled or failing contributes simulated candidates instead, so
//! one outage never fails the whole search.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{merge_ranked, RateBudget, SearchAggregator, SearchError, SimulatedResultGenerator};
pub use models::{AggregatedResult, MatchCandidate, Provider, SearchRequest, SearchResponse};
pub use services::{build_aggregator, ProviderClient, ProviderConfig};
