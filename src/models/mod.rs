// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    AggregatedResult, AvatarRef, FailureKind, MatchCandidate, Provider, ProviderOutcome,
    RateLimitStatus, ScoreProfile, SourceReport, SourceStatus, UnknownProvider,
};
pub use requests::{SearchParams, SearchRequest};
pub use responses::{ErrorResponse, HealthResponse, SearchResponse};
