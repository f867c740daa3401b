//! Route table.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::web::handlers;
use crate::web::state::AppState;

/// Largest accepted upload body.
pub const UPLOAD_LIMIT_BYTES: usize = 16 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    let static_files = ServeDir::new(state.static_dir().as_std_path());
    Router::new()
        .route("/", get(handlers::index))
        .route("/species", get(handlers::species))
        .route("/species/download", get(handlers::species_download))
        .route("/host", get(handlers::host))
        .route("/host/download", get(handlers::host_download))
        .route("/geography", get(handlers::geography))
        .route("/geography/download", get(handlers::geography_download))
        .route("/date", get(handlers::date))
        .route("/date/download", get(handlers::date_download))
        .route("/baltimore", get(handlers::baltimore))
        .route("/baltimore/download", get(handlers::baltimore_download))
        .route(
            "/self-catalogue",
            get(handlers::catalogue_form)
                .post(handlers::catalogue_upload)
                .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .nest_service("/static", static_files)
        .fallback(handlers::index)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
