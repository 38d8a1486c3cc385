// handlers/mod.rs - Route groups
//
// Each group exposes `routes()`; `crate::app` merges them. Authorization is
// per handler: admin-only handlers take `AdminUser`, signed-in ones take
// `AuthUser`, and everything else is open.

pub mod admin;
pub mod cvs;
pub mod dashboard;
pub mod evaluations;
pub mod export;
pub mod forms;
pub mod ngo;
pub mod offres_templates;
pub mod opportunities;
pub mod public;
pub mod seeker;
pub mod utils;

use axum::{
    routing::{get, post},
    Router,
};

pub fn routes() -> Router {
    Router::new()
        .merge(admin::routes())
        .merge(ngo::routes())
        .merge(public::routes())
        .merge(opportunities::routes())
        .merge(dashboard::routes())
        .merge(evaluations::routes())
        .merge(offres_templates::routes())
        .merge(seeker::routes())
        .route("/api/cvs/:id", get(cvs::get_cv))
        .route("/api/forms/:id", get(forms::get_form))
        .route("/api/export/xlsx", post(export::export_xlsx))
}
