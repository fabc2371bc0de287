use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use photo_search::config::Settings;
use photo_search::core::JitterScore;
use photo_search::routes::{self, AppState};
use photo_search::services::build_aggregator;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Load configuration
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            // The subscriber is not up yet
            eprintln!("Configuration error: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    // Initialize logging; RUST_LOG wins over logging.level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if settings.logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }

    info!("Starting photo search service...");

    let provider_configs = settings.provider_configs();
    for config in &provider_configs {
        if config.api_key.is_empty() {
            info!("{} has no API key configured, live calls will fall back", config.provider);
        }
    }

    let aggregator = build_aggregator(
        provider_configs,
        settings.search.timeout(),
        Arc::new(JitterScore),
    )
    .map_err(|e| {
        error!("Failed to build HTTP client: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e)
    })?;

    info!(
        "Search aggregator initialized with providers {:?} (timeout {:?})",
        aggregator.providers(),
        aggregator.timeout()
    );

    // Build application state
    let app_state = AppState {
        aggregator: Arc::new(aggregator),
        default_queries: settings.search.default_queries.clone(),
        max_upload_bytes: settings.server.max_upload_bytes,
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);
    let allowed_origins = settings.server.allowed_origins.clone();

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = if allowed_origins.is_empty() {
            Cors::permissive()
        } else {
            allowed_origins
                .iter()
                .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
                .allow_any_method()
                .allow_any_header()
        };

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
