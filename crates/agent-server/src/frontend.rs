//! Static Frontend
//!
//! The built web UI is served under `/app`. Without a build, `/app` answers
//! 503 with instructions instead of 404s.

use std::path::Path;

use axum::{Router, http::StatusCode, routing::get};
use tower_http::services::ServeDir;

pub const NOT_BUILT: &str = "Frontend not built. Run 'npm run build' in the frontend directory.";

pub fn routes<S>(dir: &Path) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    if dir.join("index.html").is_file() {
        tracing::info!(dir = %dir.display(), "Serving frontend at /app");
        Router::new().nest_service(
            "/app",
            ServeDir::new(dir).append_index_html_on_directories(true),
        )
    } else {
        tracing::warn!(dir = %dir.display(), "Frontend build not found");
        Router::new()
            .route("/app", get(not_built))
            .route("/app/{*path}", get(not_built))
    }
}

async fn not_built() -> (StatusCode, &'static str) {
    (StatusCode::SERVICE_UNAVAILABLE, NOT_BUILT)
}
