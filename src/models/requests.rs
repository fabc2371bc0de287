use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::{Provider, UnknownProvider};

/// Query-string parameters accepted next to the uploaded photo
///
/// `POST /api/search?searchQueries=["анна","фото"]&providers=vk,telegram`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams {
    /// JSON array of search terms derived from the photo
    #[serde(rename = "searchQueries", default)]
    pub search_queries: Option<String>,
    /// Comma-separated provider names; all registered providers when absent
    #[serde(default)]
    pub providers: Option<String>,
}

impl SearchParams {
    /// Parse `searchQueries`, falling back to `defaults` when absent or blank
    pub fn queries(&self, defaults: &[String]) -> Result<Vec<String>, serde_json::Error> {
        match self.search_queries.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let queries: Vec<String> = serde_json::from_str(raw)?;
                if queries.is_empty() {
                    Ok(defaults.to_vec())
                } else {
                    Ok(queries)
                }
            }
            _ => Ok(defaults.to_vec()),
        }
    }

    /// Parse `providers`; `None` means every registered provider
    pub fn provider_subset(&self) -> Result<Option<Vec<Provider>>, UnknownProvider> {
        let Some(raw) = self.providers.as_deref() else {
            return Ok(None);
        };

        let mut providers = Vec::new();
        for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let provider: Provider = name.parse()?;
            if !providers.contains(&provider) {
                providers.push(provider);
            }
        }

        if providers.is_empty() {
            Ok(None)
        } else {
            Ok(Some(providers))
        }
    }
}

/// One logical search: the query token plus an optional provider subset
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 256))]
    pub query: String,
    #[serde(default)]
    pub providers: Option<Vec<Provider>>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            providers: None,
        }
    }

    pub fn with_providers(mut self, providers: Vec<Provider>) -> Self {
        self.providers = Some(providers);
        self
    }

    /// Whether `provider` takes part in this search
    pub fn includes(&self, provider: Provider) -> bool {
        self.providers
            .as_ref()
            .map_or(true, |subset| subset.contains(&provider))
    }
}
