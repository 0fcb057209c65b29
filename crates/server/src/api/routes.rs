use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, middleware as api_middleware};
use crate::state::AppState;

/// Largest accepted `.torrent` upload.
pub const MAX_TORRENT_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let guarded = Router::new()
        // Introspection
        .route("/config", get(handlers::get_config))
        .route("/version", get(handlers::version))
        .route("/metrics", get(handlers::metrics))
        // Search
        .route("/search/{term}", get(handlers::search))
        .route("/grab/{term}", post(handlers::grab))
        .route("/plugins", get(handlers::plugins))
        // Retention
        .route("/purge/{days}", delete(handlers::purge))
        // Add torrent
        .route("/add_torrent", post(handlers::add_torrent))
        .route("/add_torrent_url", post(handlers::add_torrent_url))
        .route(
            "/add_torrent_file",
            post(handlers::add_torrent_file)
                .layer(DefaultBodyLimit::max(MAX_TORRENT_UPLOAD_BYTES)),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(guarded)
        .layer(middleware::from_fn(api_middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
