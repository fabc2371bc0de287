use actix_multipart::Multipart;
use actix_web::{http::header, web, HttpRequest, HttpResponse, Responder};
use futures::{Stream, StreamExt};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use validator::Validate;

use crate::core::SearchAggregator;
use crate::models::{
    HealthResponse, RateLimitStatus, SearchParams, SearchRequest, SearchResponse,
};
use crate::routes::ApiError;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<SearchAggregator>,
    /// Query tokens used when the upload carries none
    pub default_queries: Vec<String>,
    pub max_upload_bytes: usize,
}

/// Configure the search API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/search", web::post().to(search_by_photo))
        .route("/rate-limits", web::get().to(rate_limits));
}

/// Health check endpoint
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        providers: state.aggregator.providers(),
    })
}

/// An uploaded photo plus any form fields sent with it
struct Upload {
    photo: web::Bytes,
    search_queries: Option<String>,
    providers: Option<String>,
}

/// Search social networks for people matching an uploaded photo
///
/// POST /api/search
///
/// Accepts either `multipart/form-data` with a `photo` file field (plus
/// optional `searchQueries` and `providers` fields), or the raw photo as an
/// `image/*` body. Query-string `searchQueries`/`providers` apply when the
/// form does not carry them. The photo is only checked for presence; the
/// first search query is what gets sent to every provider.
async fn search_by_photo(
    state: web::Data<AppState>,
    http_req: HttpRequest,
    params: web::Query<SearchParams>,
    payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    let upload = read_upload(&http_req, payload, state.max_upload_bytes).await?;
    if upload.photo.is_empty() {
        return Err(ApiError::InvalidInput("No photo uploaded".to_string()));
    }

    let mut params = params.into_inner();
    if upload.search_queries.is_some() {
        params.search_queries = upload.search_queries;
    }
    if upload.providers.is_some() {
        params.providers = upload.providers;
    }

    let search_queries = params.queries(&state.default_queries).map_err(|e| {
        ApiError::InvalidInput(format!(
            "searchQueries must be a JSON array of strings: {}",
            e
        ))
    })?;

    let providers = params
        .provider_subset()
        .map_err(|e| ApiError::InvalidInput(e.to_string()))?;

    let query = search_queries
        .first()
        .cloned()
        .ok_or_else(|| ApiError::InvalidInput("searchQueries is empty".to_string()))?;

    let mut request = SearchRequest::new(query);
    if let Some(providers) = providers {
        request = request.with_providers(providers);
    }

    if let Err(errors) = request.validate() {
        tracing::info!("Validation failed for search request: {:?}", errors);
        return Err(ApiError::InvalidInput(format!("Validation failed: {}", errors)));
    }

    let search_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        "Search {} started: query='{}', photo={} bytes",
        search_id,
        request.query,
        upload.photo.len()
    );

    let result = state.aggregator.search(&request).await.map_err(|e| {
        tracing::error!("Search {} failed: {}", search_id, e);
        ApiError::Internal(format!("Search failed: {}", e))
    })?;

    tracing::info!("Search {} returning {} results", search_id, result.total_found);

    Ok(HttpResponse::Ok().json(SearchResponse {
        success: true,
        search_id,
        results: result.candidates,
        total_found: result.total_found,
        search_queries,
        sources: result.sources,
    }))
}

/// Current rate window of every registered provider
///
/// GET /api/rate-limits
async fn rate_limits(state: web::Data<AppState>) -> impl Responder {
    let limits: BTreeMap<&'static str, RateLimitStatus> = state
        .aggregator
        .rate_limits()
        .into_iter()
        .map(|(provider, status)| (provider.key(), status))
        .collect();

    HttpResponse::Ok().json(limits)
}

/// Read the photo from a multipart form or a raw `image/*` body
async fn read_upload(
    http_req: &HttpRequest,
    payload: web::Payload,
    limit: usize,
) -> Result<Upload, ApiError> {
    let content_type = http_req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if content_type.starts_with("multipart/form-data") {
        return read_form(http_req, payload, limit).await;
    }

    if !content_type.starts_with("image/") {
        tracing::info!("Rejected upload with content type '{}'", content_type);
        return Err(ApiError::InvalidInput(
            "No photo uploaded: expected a multipart photo field or an image/* body".to_string(),
        ));
    }

    let declared = http_req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    if declared.is_some_and(|len| len > limit) {
        return Err(ApiError::PayloadTooLarge(limit));
    }

    Ok(Upload {
        photo: collect_limited(payload, limit).await?,
        search_queries: None,
        providers: None,
    })
}

/// Walk the form fields: `photo` must be an image, text fields are optional
async fn read_form(
    http_req: &HttpRequest,
    payload: web::Payload,
    limit: usize,
) -> Result<Upload, ApiError> {
    let mut form = Multipart::new(http_req.headers(), payload);
    let mut photo = None;
    let mut search_queries = None;
    let mut providers = None;

    while let Some(field) = form.next().await {
        let field = field.map_err(|e| {
            ApiError::InvalidInput(format!("Failed to read multipart field: {}", e))
        })?;
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "photo" => {
                let is_image = field
                    .content_type()
                    .is_some_and(|mime| mime.essence_str().starts_with("image/"));
                if !is_image {
                    return Err(ApiError::InvalidInput(
                        "photo field must be an image".to_string(),
                    ));
                }
                photo = Some(collect_limited(field, limit).await?);
            }
            "searchQueries" => search_queries = Some(text_field(field, limit).await?),
            "providers" => providers = Some(text_field(field, limit).await?),
            _ => {
                collect_limited(field, limit).await?;
            }
        }
    }

    let photo = photo.ok_or_else(|| ApiError::InvalidInput("No photo uploaded".to_string()))?;

    Ok(Upload {
        photo,
        search_queries,
        providers,
    })
}

async fn text_field<S, E>(field: S, limit: usize) -> Result<String, ApiError>
where
    S: Stream<Item = Result<web::Bytes, E>>,
    E: Display,
{
    let bytes = collect_limited(field, limit).await?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| ApiError::InvalidInput("form fields must be UTF-8 text".to_string()))
}

/// Collect a body or form field, refusing anything over `limit` bytes
async fn collect_limited<S, E>(stream: S, limit: usize) -> Result<web::Bytes, ApiError>
where
    S: Stream<Item = Result<web::Bytes, E>>,
    E: Display,
{
    let mut stream = Box::pin(stream);
    let mut body = web::BytesMut::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| ApiError::InvalidInput(format!("Failed to read upload: {}", e)))?;
        if body.len() + chunk.len() > limit {
            return Err(ApiError::PayloadTooLarge(limit));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body.freeze())
}
