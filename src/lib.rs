pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod types;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::database::DatabaseManager;

/// The full HTTP application
pub fn app() -> Router {
    let config = config::config();

    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(handlers::routes())
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(cors_layer());

    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

fn cors_layer() -> CorsLayer {
    let config = config::config();
    if config.cors_is_permissive() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Zaytoonz NGO API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Connects job, funding and training seekers with NGOs",
            "endpoints": {
                "health": "/health (public)",
                "admin": "/api/admin/* (create-user, templates, ngos, saved-sources, extract-opportunity, scraped-opportunities)",
                "ngo": "/api/ngo/* (approval, applications, team), /api/ngo-profile/:id, /api/offres-templates",
                "public": "/api/public/ngos[/:id] (public)",
                "opportunities": "/api/opportunities, /api/opportunities/recent, /api/opportunities/applications[/:id], /api/opportunities/:id/evaluation",
                "evaluations": "/api/evaluations, /api/evaluations/applications",
                "seeker": "/api/seeker/profile",
                "cvs": "/api/cvs/:id",
                "forms": "/api/forms/:id",
                "dashboard": "/api/dashboard/*-stats, /api/dashboard/recent-activities",
                "export": "/api/export/xlsx",
            }
        }
    }))
}

async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                    }
                })),
            )
        }
    }
}
