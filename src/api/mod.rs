pub mod auth;
pub mod error;
pub mod lockout;
mod metrics;
mod public;
mod quotes;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/profile", get(auth::profile))
        .route("/verify", get(auth::verify))
        .route("/avatar", post(auth::upload_avatar))
        .route("/admin/create-user", post(auth::admin_create_user))
        .route("/admin/users", get(auth::admin_list_users))
        .route("/admin/users/:id", delete(auth::admin_delete_user))
        .route("/admin/change-password", post(auth::admin_change_password));

    // Authentication happens in the CurrentUser extractor on each handler
    let api_routes = Router::new()
        .route(
            "/cotizaciones",
            get(quotes::list_quotes).post(quotes::create_quote),
        )
        .route(
            "/cotizaciones/:id",
            get(quotes::get_quote).delete(quotes::delete_quote),
        )
        .route("/metricas", get(metrics::dashboard))
        .route("/admin/estadisticas", get(metrics::admin_overview))
        .route(
            "/admin/estadisticas/empleados",
            get(metrics::admin_per_employee),
        )
        .route(
            "/admin/estadisticas/top-vistas",
            get(metrics::admin_top_viewed),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        // Public, unauthenticated: the tracked link and the stored files
        .route("/c/:slug", get(public::open_tracked_link))
        .nest_service("/files", ServeDir::new(state.storage.root()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
