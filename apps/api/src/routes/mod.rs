pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::{admin, messages, projects, testimonials};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Public site
        .route("/api/projects", get(projects::list_public))
        .route("/api/projects/:id", get(projects::get_public))
        .route("/api/contact", post(messages::submit_contact))
        .route(
            "/api/testimonials",
            get(testimonials::list).post(testimonials::submit),
        )
        // Admin console (token-gated in each handler)
        .route(
            "/api/projects/admin",
            post(projects::admin_create)
                .put(projects::admin_update)
                .delete(projects::admin_delete),
        )
        .route(
            "/api/messages/admin",
            get(messages::admin_list).delete(messages::admin_delete),
        )
        .route("/api/admin/stats", get(admin::stats::stats_handler))
        .route("/api/admin/bulk", post(admin::bulk::bulk_handler))
        .route(
            "/api/admin/collections",
            get(admin::collections::list_handler)
                .post(admin::collections::create_handler)
                .put(admin::collections::update_handler)
                .delete(admin::collections::delete_handler),
        )
        .route(
            "/api/admin/export/:collection",
            get(admin::bulk::export_handler),
        )
        .route("/api/admin/upload", post(admin::upload::upload_handler))
        .route("/api/admin/events", get(admin::events::events_handler))
        .with_state(state)
}
