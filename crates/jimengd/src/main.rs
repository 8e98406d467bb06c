use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use jimeng_core::backend::ImageBackend;
use jimeng_core::config::{AppConfig, ServerConfig};
use jimeng_core::detector::{ImageDetection, PromptImageDetector};
use jimeng_core::normalize::Normalizer;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

mod backend;
mod error;
mod request;
mod routes;
mod token;

use crate::backend::HttpImageBackend;
use crate::token::{mask_token, LOBE_SETTINGS_HEADER};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) normalizer: Arc<Normalizer>,
    pub(crate) backend: Arc<dyn ImageBackend>,
    pub(crate) detector: Arc<dyn ImageDetection>,
    pub(crate) fallback_token: Option<String>,
    pub(crate) backend_timeout: Duration,
    pub(crate) manifest_dir: PathBuf,
    pub(crate) upload_limit_bytes: usize,
}

impl AppState {
    pub(crate) fn new(
        config: &AppConfig,
        backend: Arc<dyn ImageBackend>,
        fallback_token: Option<String>,
    ) -> Self {
        Self {
            normalizer: Arc::new(Normalizer::new(config.generation.clone())),
            backend,
            detector: Arc::new(PromptImageDetector),
            fallback_token,
            backend_timeout: Duration::from_secs(config.backend.effective_timeout_seconds()),
            manifest_dir: PathBuf::from(&config.server.manifest_dir),
            upload_limit_bytes: config.server.upload_limit_bytes,
        }
    }
}

pub(crate) fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static(LOBE_SETTINGS_HEADER),
        ]);
    let body_limit = DefaultBodyLimit::max(server.body_limit_bytes);

    Router::new()
        .route("/manifest.json", get(routes::manifest))
        .route("/manifest-lobechat.json", get(routes::manifest_lobechat))
        .route(
            "/api/generateImage",
            post(routes::generate_image).layer(body_limit),
        )
        .route(
            "/api/dify/generateImage",
            post(routes::dify_generate_image).layer(body_limit),
        )
        .route(
            "/api/comfyui/generateImage",
            post(routes::comfyui_generate_image)
                .layer(DefaultBodyLimit::max(server.upload_limit_bytes)),
        )
        .layer(cors)
        .with_state(state)
}

/// `backend.api_token`, else the `JIMENG_API_TOKEN` environment variable.
fn fallback_token(config: &AppConfig) -> Option<String> {
    config
        .backend
        .api_token
        .clone()
        .or_else(|| std::env::var("JIMENG_API_TOKEN").ok())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        // 默认用 info 级别，若设置 RUST_LOG 则以环境变量为准。
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::load("configs/config.toml")?;
    let fallback_token = fallback_token(&config);
    info!(
        "backend config: base_url={} timeout_seconds={} fallback_token={}",
        config.backend.base_url,
        config.backend.effective_timeout_seconds(),
        fallback_token
            .as_deref()
            .map(mask_token)
            .unwrap_or_else(|| "none".to_string())
    );
    info!(
        "generation defaults: model={} ratio={} upload_ratio={}",
        config.generation.default_model,
        config.generation.default_ratio,
        config.generation.upload_default_ratio
    );

    let backend = HttpImageBackend::new(&config.backend)?;
    let state = AppState::new(&config, Arc::new(backend), fallback_token);
    let app = build_router(state, &config.server);

    let listener = tokio::net::TcpListener::bind(&config.server.listen).await?;
    info!("jimengd listening on {}", config.server.listen);
    info!(
        "routes: POST /api/generateImage, POST /api/dify/generateImage, POST /api/comfyui/generateImage, GET /manifest.json"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
