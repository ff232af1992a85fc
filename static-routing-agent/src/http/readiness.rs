use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;

/// Flips to ready once the token is cancelled by whoever starts the
/// controllers.
#[derive(Clone, Debug, Default)]
pub struct Readiness {
    ready: CancellationToken,
}

impl Readiness {
    pub fn token(&self) -> CancellationToken {
        self.ready.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_cancelled()
    }
}

impl IntoResponse for Readiness {
    fn into_response(self) -> Response {
        if self.is_ready() {
            (StatusCode::OK, "ready").into_response()
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, "controllers not started").into_response()
        }
    }
}
