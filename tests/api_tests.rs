// HTTP API tests

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use async_trait::async_trait;
use photo_search::core::{RateBudget, RateLimitConfig, SearchAggregator};
use photo_search::models::{AvatarRef, MatchCandidate, Provider, ProviderOutcome};
use photo_search::routes::{self, AppState};
use photo_search::services::ProviderClient;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Answers every query with one candidate, echoing the query in its name
struct EchoClient(Provider, f64);

#[async_trait]
impl ProviderClient for EchoClient {
    fn provider(&self) -> Provider {
        self.0
    }

    async fn search(&self, query: &str, _timeout: Duration) -> ProviderOutcome {
        ProviderOutcome::live(
            self.0,
            vec![MatchCandidate {
                id: format!("{}_1", self.0.id_prefix()),
                name: query.to_string(),
                provider: self.0,
                profile_url: format!("https://example.test/{}", self.0.key()),
                score: self.1,
                avatar: AvatarRef::Remote("https://example.test/a.png".to_string()),
                metadata: Map::new(),
            }],
        )
    }
}

struct PanickingClient(Provider);

#[async_trait]
impl ProviderClient for PanickingClient {
    fn provider(&self) -> Provider {
        self.0
    }

    async fn search(&self, _query: &str, _timeout: Duration) -> ProviderOutcome {
        panic!("provider bug")
    }
}

fn app_state(clients: Vec<Arc<dyn ProviderClient>>) -> AppState {
    let budget = Arc::new(RateBudget::new(
        clients
            .iter()
            .map(|c| {
                let limit = c.provider().default_rate_limit();
                (c.provider(), RateLimitConfig::per_minute(limit))
            }),
    ));

    AppState {
        aggregator: Arc::new(SearchAggregator::new(clients, budget, Duration::from_secs(2))),
        default_queries: vec!["человек".to_string(), "фото".to_string()],
        max_upload_bytes: 1024,
    }
}

fn echo_state() -> AppState {
    app_state(vec![
        Arc::new(EchoClient(Provider::VKontakte, 0.9)),
        Arc::new(EchoClient(Provider::Telegram, 0.7)),
    ])
}

fn photo_upload(uri: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri(uri)
        .insert_header((header::CONTENT_TYPE, "image/png"))
        .set_payload(vec![0x89, b'P', b'N', b'G'])
}

/// One `multipart/form-data` part; `content_type` marks a file part
fn form_part(name: &str, content_type: Option<&str>, data: &[u8]) -> Vec<u8> {
    let mut part = match content_type {
        Some(ct) => format!(
            "--XB\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"me.png\"\r\n\
             Content-Type: {}\r\n\r\n",
            name, ct
        ),
        None => format!(
            "--XB\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n",
            name
        ),
    }
    .into_bytes();
    part.extend_from_slice(data);
    part.extend_from_slice(b"\r\n");
    part
}

fn form_upload(parts: Vec<Vec<u8>>) -> test::TestRequest {
    let mut body = parts.concat();
    body.extend_from_slice(b"--XB--\r\n");

    test::TestRequest::post()
        .uri("/api/search")
        .insert_header((header::CONTENT_TYPE, "multipart/form-data; boundary=XB"))
        .set_payload(body)
}

#[actix_web::test]
async fn test_health() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(echo_state()))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["providers"], serde_json::json!(["VKontakte", "Telegram"]));
}

#[actix_web::test]
async fn test_search_uses_default_queries() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(echo_state()))
            .configure(routes::configure_routes),
    )
    .await;

    let resp = test::call_service(&app, photo_upload("/api/search").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["totalFound"], 2);
    assert_eq!(body["searchQueries"], serde_json::json!(["человек", "фото"]));
    assert_eq!(body["results"][0]["id"], "vk_1");
    assert_eq!(body["results"][0]["name"], "человек");
    assert_eq!(body["results"][0]["socialNetwork"], "VKontakte");
    assert_eq!(body["results"][1]["similarity"], 0.7);
    assert!(uuid::Uuid::parse_str(body["searchId"].as_str().unwrap()).is_ok());
    assert_eq!(body["sources"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn test_search_with_queries_and_provider_subset() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(echo_state()))
            .configure(routes::configure_routes),
    )
    .await;

    let queries = urlencoding::encode(r#"["анна","петрова"]"#);
    let uri = format!("/api/search?searchQueries={}&providers=tg", queries);
    let req = photo_upload(&uri).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["totalFound"], 1);
    assert_eq!(body["results"][0]["socialNetwork"], "Telegram");
    assert_eq!(body["results"][0]["name"], "анна");
    assert_eq!(body["searchQueries"], serde_json::json!(["анна", "петрова"]));
}

#[actix_web::test]
async fn test_search_rejects_missing_photo() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(echo_state()))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/search")
        .insert_header((header::CONTENT_TYPE, "image/jpeg"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "invalid_input");
    assert_eq!(body["status_code"], 400);
}

#[actix_web::test]
async fn test_search_rejects_non_image() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(echo_state()))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/search")
        .insert_header((header::CONTENT_TYPE, "text/plain"))
        .set_payload("hello")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_search_rejects_bad_parameters() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(echo_state()))
            .configure(routes::configure_routes),
    )
    .await;

    for uri in [
        "/api/search?searchQueries=not-json",
        "/api/search?providers=myspace",
        "/api/search?searchQueries=%5B%22%22%5D",
    ] {
        let resp = test::call_service(&app, photo_upload(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }
}

#[actix_web::test]
async fn test_search_rejects_oversized_upload() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(echo_state()))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/search")
        .insert_header((header::CONTENT_TYPE, "image/jpeg"))
        .set_payload(vec![0u8; 4096])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "payload_too_large");
    assert_eq!(body["status_code"], 413);
}

#[actix_web::test]
async fn test_search_survives_one_crashing_provider() {
    let state = app_state(vec![
        Arc::new(PanickingClient(Provider::Facebook)),
        Arc::new(EchoClient(Provider::Instagram, 0.8)),
    ]);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(routes::configure_routes),
    )
    .await;

    let req = photo_upload("/api/search").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["totalFound"], 1);
    assert_eq!(body["sources"][0]["status"], "failed");
    assert_eq!(body["sources"][0]["reason"], "crashed");
}

#[actix_web::test]
async fn test_search_all_crashed_is_internal_error() {
    let state = app_state(vec![Arc::new(PanickingClient(Provider::Facebook))]);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(routes::configure_routes),
    )
    .await;

    let resp = test::call_service(&app, photo_upload("/api/search").to_request()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn test_rate_limits_endpoint() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(echo_state()))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/rate-limits").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["vkontakte"]["max"], 100);
    assert_eq!(body["telegram"]["max"], 30);
    assert_eq!(body["telegram"]["current"], 0);
    let reset = body["vkontakte"]["resetTime"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(reset).is_ok());
}

#[actix_web::test]
async fn test_search_with_multipart_form() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(echo_state()))
            .configure(routes::configure_routes),
    )
    .await;

    let req = form_upload(vec![
        form_part("photo", Some("image/png"), b"\x89PNG"),
        form_part("searchQueries", None, r#"["анна"]"#.as_bytes()),
        form_part("providers", None, b"vk"),
    ])
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["searchQueries"], serde_json::json!(["анна"]));
    assert_eq!(body["totalFound"], 1);
    assert_eq!(body["results"][0]["name"], "анна");
    assert_eq!(body["results"][0]["socialNetwork"], "VKontakte");
}

#[actix_web::test]
async fn test_multipart_form_falls_back_to_query_string() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(echo_state()))
            .configure(routes::configure_routes),
    )
    .await;

    let queries = urlencoding::encode(r#"["мария"]"#);
    let req = form_upload(vec![form_part("photo", Some("image/jpeg"), b"jpeg")])
        .uri(&format!("/api/search?searchQueries={}", queries))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["searchQueries"], serde_json::json!(["мария"]));
    assert_eq!(body["totalFound"], 2);
}

#[actix_web::test]
async fn test_multipart_form_rejects_bad_photo_parts() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(echo_state()))
            .configure(routes::configure_routes),
    )
    .await;

    let cases = [
        vec![form_part("searchQueries", None, r#"["анна"]"#.as_bytes())],
        vec![form_part("photo", Some("text/plain"), b"hello")],
        vec![form_part("photo", Some("image/png"), b"")],
    ];

    for parts in cases {
        let resp = test::call_service(&app, form_upload(parts).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "invalid_input");
    }
}

#[actix_web::test]
async fn test_multipart_photo_over_limit_rejected() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(echo_state()))
            .configure(routes::configure_routes),
    )
    .await;

    let req = form_upload(vec![form_part("photo", Some("image/png"), &[0u8; 2048])]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
