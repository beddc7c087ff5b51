use crate::config::Config;
use crate::orchestrator::Orchestrator;
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub mod auth;
pub mod error;
pub mod openapi;
pub mod routes_api;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppContext {
    /// Build the context, discovering tools from the configuration.
    pub fn new(config: Config) -> Self {
        let tools = config.tools.registry();
        let orchestrator = Orchestrator::new(config.storage.clone(), tools);
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(auth::API_KEY_HEADER),
        ]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(allowed))
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let protected = routes_api::protected_routes();
    let protected = if ctx.config.auth.enabled() {
        protected.layer(middleware::from_fn_with_state(
            ctx.clone(),
            auth::api_key_middleware,
        ))
    } else {
        protected
    };

    Router::new()
        .merge(routes_api::public_routes())
        .merge(protected)
        .nest("/api", openapi::openapi_routes())
        .layer(DefaultBodyLimit::max(ctx.config.server.max_upload_bytes()))
        .layer(cors_layer(&ctx.config.server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let ctx = AppContext::new(config);
    ctx.orchestrator
        .ensure_dirs()
        .await
        .context("Failed to create storage directories")?;

    for tool in ctx.orchestrator.tools().check_all() {
        match tool.path {
            Some(path) => tracing::info!("Using {} at {:?}", tool.name, path),
            None => tracing::warn!(
                "{} not found; install FFmpeg or set tools.{}_path",
                tool.name,
                tool.name
            ),
        }
    }
    if !ctx.config.auth.enabled() {
        tracing::warn!("No API key configured; /process and /download are open");
    }

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
