//! Static asset handler

use axum::extract::State;
use axum::http::Uri;
use axum::response::{IntoResponse, Response};

use crate::server::AppState;

/// Serves any request that is not the session endpoint from the asset map.
pub async fn static_asset(State(state): State<AppState>, uri: Uri) -> Response {
    match state.assets.serve(uri.path()).await {
        Ok(response) => response,
        Err(status) => {
            tracing::debug!(path = uri.path(), %status, "No static asset for path");
            (status, "Not found").into_response()
        }
    }
}

