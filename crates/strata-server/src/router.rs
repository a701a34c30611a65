use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the registry API router.
pub fn build_router(state: AppState, max_body_size: usize) -> Router {
    Router::new()
        .route("/v2/", get(handler::version))
        .route(
            "/v2/:org/:artifact/manifests/:reference",
            get(handler::get_manifest)
                .head(handler::head_manifest)
                .put(handler::put_manifest),
        )
        .route(
            "/v2/:org/:artifact/blobs/:digest",
            get(handler::get_blob).head(handler::head_blob),
        )
        .route("/v2/:org/:artifact/blobs/uploads/", post(handler::start_upload))
        .route(
            "/v2/:org/:artifact/blobs/uploads/:id",
            put(handler::put_upload)
                .patch(handler::patch_upload)
                .get(handler::upload_status)
                .delete(handler::cancel_upload),
        )
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
