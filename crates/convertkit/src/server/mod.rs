use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::config::{ServeOptions, ServerConfig};
use crate::prelude::{eprintln, *};

pub mod response;
pub mod routes;
pub mod upload;

/// Conversion routes, in the order the health check lists them.
pub const MODULES: [&str; 10] = [
    "/csv/to-json",
    "/json/to-csv",
    "/csv/to-excel",
    "/excel/to-csv",
    "/json/format",
    "/xml/to-json",
    "/json/to-xml",
    "/html-table/to-json",
    "/csv/url-to-json",
    "/text/clean",
];

/// Read-only state shared by every request.
#[derive(Debug)]
pub struct AppState {
    pub config: ServerConfig,
    pub client: reqwest::Client,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let client = crate::fetch::build_client(&config.fetch)?;
        Ok(Self { config, client })
    }
}

pub async fn run(options: ServeOptions, global: crate::Global) -> Result<()> {
    let config = ServerConfig::try_from(&options)?;
    let addr = config.addr.clone();

    if global.verbose {
        eprintln!("Starting convertkit on {addr}...");
        eprintln!("Limits: {}", serde_json::to_string(&config.limits)?);
    }

    let state = Arc::new(AppState::new(config)?);
    let app_router = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| eyre!("Failed to bind to {}: {}", addr, e))?;

    log::info!("convertkit listening on http://{addr}");
    if global.verbose {
        eprintln!("Health check: http://{addr}/");
        for module in MODULES {
            eprintln!("Endpoint: http://{addr}{module}");
        }
    }

    axum::serve(listener, app_router)
        .await
        .map_err(|e| eyre!("Server error: {e}"))?;

    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/csv/to-json", post(routes::csv::to_json))
        .route("/json/to-csv", post(routes::json::to_csv))
        .route("/csv/to-excel", post(routes::csv::to_excel))
        .route("/excel/to-csv", post(routes::excel::to_csv))
        .route("/json/format", post(routes::json::format))
        .route("/xml/to-json", post(routes::xml::to_json))
        .route("/json/to-xml", post(routes::json::to_xml))
        .route("/html-table/to-json", post(routes::html_table::to_json))
        .route("/csv/url-to-json", post(routes::csv::url_to_json))
        .route("/text/clean", post(routes::text::clean))
        .layer(DefaultBodyLimit::max(state.config.body_limit))
        .layer(middleware::from_fn(log_request))
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub message: String,
    pub modules: Vec<&'static str>,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        message: f!("convertkit {} is running", env!("CARGO_PKG_VERSION")),
        modules: MODULES.to_vec(),
    })
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    log::info!(
        "{method} {path} -> {} in {}ms",
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}
