// handlers/admin/mod.rs - Platform administration endpoints (/api/admin/*)

pub mod create_user;
pub mod extract_opportunity;
pub mod ngos;
pub mod publish;
pub mod saved_sources;
pub mod scraped_opportunities;
pub mod templates;

use axum::{routing::post, Router};

use crate::types::TemplateKind;

pub fn routes() -> Router {
    Router::new()
        .route("/api/admin/create-user", post(create_user::create_user))
        .route("/api/admin/templates/publish", post(publish::publish_template))
        .merge(templates::routes(TemplateKind::Evaluation, "/api/admin/evaluation-templates"))
        .merge(templates::routes(TemplateKind::Offres, "/api/admin/offres-templates"))
        .merge(templates::routes(TemplateKind::Forms, "/api/admin/forms-templates"))
        .merge(templates::routes(TemplateKind::Process, "/api/admin/process-templates"))
        .merge(ngos::routes())
        .merge(saved_sources::routes())
        .merge(extract_opportunity::routes())
        .merge(scraped_opportunities::routes())
}
