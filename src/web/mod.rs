use axum::{
    Router,
    routing::{any, get, post},
};
use http::HeaderValue;
use std::{net::SocketAddr, sync::Arc};
use tokio::time::Duration as TokioDuration;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::compression::CompressionLevel;
use tower_http::services::ServeDir;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::error::{ConfigError, Result as AppResult};
use crate::state::AppState;

pub mod error;
pub mod handlers;
pub mod ws;

pub use self::error::WebError;

fn cors_layer(server_config: &ServerConfig) -> CorsLayer {
    let cors_origins_result: Result<Vec<HeaderValue>, _> = server_config
        .cors_origins
        .iter()
        .map(|origin| {
            origin
                .parse()
                .map_err(|e| format!("Invalid CORS origin '{origin}': {e}"))
        })
        .collect();

    let cors_origins = cors_origins_result.unwrap_or_else(|e| {
        tracing::error!(error = %e, "CORS config error. Defaulting to restrictive");
        vec![]
    });

    if !cors_origins.is_empty() {
        tracing::info!(
            cors.origins.count = cors_origins.len(),
            "CORS configured with allowed origins"
        );
        CorsLayer::new()
            .allow_methods(vec![http::Method::GET, http::Method::POST])
            .allow_origin(cors_origins)
            .allow_headers(vec![http::header::CONTENT_TYPE, http::header::ACCEPT])
    } else {
        tracing::info!("Restrictive CORS policy applied (no origins configured)");
        CorsLayer::new()
    }
}

/// Builds the application router. `static_root`, when set, is served under
/// `/data` so question banks can be read directly by browsers.
pub fn build_router(
    app_state: AppState,
    server_config: &ServerConfig,
    static_root: Option<&str>,
) -> AppResult<Router> {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(500)
            .burst_size(30)
            .finish()
            .ok_or_else(|| {
                ConfigError::InvalidValue("rate limiter period and burst must be non-zero".into())
            })?,
    );
    tracing::info!(
        rate_limit.per_ms = 500,
        rate_limit.burst_size = 30,
        "Rate limiter configured"
    );

    let governor_limiter = governor_conf.limiter().clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(TokioDuration::from_secs(60)).await;
            let limiter_size = governor_limiter.len();
            if limiter_size > 1_000_000 {
                tracing::warn!(
                    rate_limiter.storage_size = limiter_size,
                    "Rate limiting storage size is large"
                );
            }
            governor_limiter.retain_recent();
        }
    });

    let mut app = Router::new()
        .route("/api/sessions", post(handlers::create_session_handler))
        .route(
            "/api/sessions/{session_id}",
            get(handlers::get_session_handler),
        )
        .route("/api/sets", get(handlers::list_sets_handler))
        .route("/ws", any(ws::ws_handler));

    if let Some(root) = static_root {
        tracing::info!(content.root = %root, "Serving question bank under /data");
        app = app.nest_service("/data", ServeDir::new(root));
    }

    Ok(app
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CompressionLayer::new()
                .quality(CompressionLevel::Default)
                .gzip(true),
        )
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(cors_layer(server_config)))
}

#[tracing::instrument(skip(app_state, server_config), fields(
    server.port = server_config.port,
    cors.origins.count = server_config.cors_origins.len()
))]
pub async fn run_server(
    app_state: AppState,
    server_config: ServerConfig,
    static_root: Option<String>,
) -> AppResult<()> {
    let app = build_router(app_state, &server_config, static_root.as_deref())?;

    let addr = SocketAddr::from(([0, 0, 0, 0], server_config.port));
    tracing::info!(server.address = %addr, "HTTP server starting");

    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(Into::into)
}
