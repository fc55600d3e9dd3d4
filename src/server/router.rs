use std::path::Path;
use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeader;
use tower_http::trace::TraceLayer;

use crate::server::handlers::{courses, health, query, sessions};
use crate::state::AppState;

/// Creates the application router.
///
/// The JSON API lives under `/api`. When the frontend folder exists it is
/// served for every other path with caching disabled; otherwise `/` answers
/// with the health message.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.settings.server.cors_allowed_origins);
    let frontend_dir = state.paths.frontend_dir.clone();

    let api = Router::new()
        .route("/api/query", post(query::query_documents))
        .route("/api/courses", get(courses::course_stats))
        .route("/api/reset-session", post(sessions::reset_session))
        .route("/api/sessions/:session_id", get(sessions::get_session))
        .route("/api/health", get(health::health))
        .with_state(state);

    with_frontend(api, &frontend_dir)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn with_frontend(api: Router, frontend_dir: &Path) -> Router {
    if !frontend_dir.is_dir() {
        tracing::warn!(
            dir = %frontend_dir.display(),
            "Frontend folder not found, serving the API only"
        );
        return api.route("/", get(health::health));
    }

    let static_files = SetResponseHeader::overriding(
        ServeDir::new(frontend_dir).append_index_html_on_directories(true),
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache"),
    );
    api.fallback_service(static_files)
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
