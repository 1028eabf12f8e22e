//! Server Configuration

use std::path::PathBuf;

use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

/// Settings read from the environment at start-up
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Browser origins allowed to call the API with credentials
    pub cors_origins: Vec<String>,

    /// Built frontend, served under `/app`
    pub frontend_dir: PathBuf,

    /// Identity every turn is attributed to
    pub user_id: String,
    pub session_id: String,

    /// Model override; the provider's default otherwise
    pub model: Option<String>,

    /// TOML routing rules; the built-in rules otherwise
    pub router_config: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".into(),
            cors_origins: vec!["http://localhost:5173".into()],
            frontend_dir: PathBuf::from("frontend/dist"),
            user_id: "default_user".into(),
            session_id: "default_session".into(),
            model: None,
            router_config: None,
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: non_empty("BIND_ADDR").unwrap_or(defaults.bind_addr),
            cors_origins: non_empty("CORS_ALLOWED_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or(defaults.cors_origins),
            frontend_dir: non_empty("FRONTEND_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.frontend_dir),
            user_id: non_empty("APP_USER_ID").unwrap_or(defaults.user_id),
            session_id: non_empty("APP_SESSION_ID").unwrap_or(defaults.session_id),
            model: non_empty("AGENT_MODEL"),
            router_config: non_empty("ROUTER_CONFIG").map(PathBuf::from),
        }
    }

    /// CORS restricted to the configured origins, credentials allowed
    pub fn cors_layer(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(%origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        // Wildcards are not allowed together with credentials, so headers are mirrored
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true)
    }
}

/// Split a comma-separated origin list
pub fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_end_matches('/'))
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
