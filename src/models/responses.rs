use serde::{Deserialize, Serialize};
use crate::models::domain::{MatchCandidate, Provider, SourceReport};

/// Response for the search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    #[serde(rename = "searchId")]
    pub search_id: String,
    pub results: Vec<MatchCandidate>,
    #[serde(rename = "totalFound")]
    pub total_found: usize,
    #[serde(rename = "searchQueries")]
    pub search_queries: Vec<String>,
    pub sources: Vec<SourceReport>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub providers: Vec<Provider>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
