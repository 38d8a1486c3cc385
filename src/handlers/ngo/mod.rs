// handlers/ngo/mod.rs - NGO self-service endpoints

pub mod applications;
pub mod approval;
pub mod profile;
pub mod team;

use axum::{
    routing::{get, patch, post},
    Router,
};

pub fn routes() -> Router {
    Router::new()
        .route("/api/ngo/approval-status", get(approval::approval_status))
        .route("/api/ngo/mark-launching-shown", post(approval::mark_launching_shown))
        .route("/api/ngo/applications", get(applications::list).put(applications::update_status))
        .route("/api/ngo/team", get(team::list).post(team::add))
        .route("/api/ngo/team/:id", patch(team::update).delete(team::remove))
        .route("/api/ngo-profile/:id", get(profile::get_profile))
}
