// handlers/public/mod.rs - Endpoints readable without signing in

pub mod ngos;

use axum::{routing::get, Router};

pub fn routes() -> Router {
    Router::new()
        .route("/api/public/ngos", get(ngos::list))
        .route("/api/public/ngos/:id", get(ngos::get_ngo))
}
