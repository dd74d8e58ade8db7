//! Application startup and lifecycle management.

use crate::config::SuggestConfig;
use crate::handlers::{
    health::{health_check, readiness_check},
    metrics::metrics,
    suggest::suggest,
};
use crate::services::providers::gemini::{GeminiConfig, GeminiTextGenerator};
use crate::services::providers::TextGenerator;
use crate::services::SuggestionService;
use axum::{
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::tracing::{request_id_middleware, REQUEST_ID_HEADER};
use std::any::Any;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub suggestions: Arc<SuggestionService>,
}

impl AppState {
    pub fn new(suggestions: SuggestionService) -> Self {
        Self {
            suggestions: Arc::new(suggestions),
        }
    }
}

fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    AppError::from(anyhow::anyhow!("handler panicked")).into_response()
}

/// Build the HTTP router with all routes and layers.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    Router::new()
        .route("/api/suggest", post(suggest))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(cors)
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application against the real Gemini API.
    pub async fn build(config: SuggestConfig) -> Result<Self, AppError> {
        let generator = GeminiTextGenerator::new(GeminiConfig {
            api_key: config.google.api_key.clone(),
            api_base: config.google.api_base.clone(),
            model: config.generation.model.clone(),
            timeout: config.policy.request_timeout,
        })
        .map_err(|e| AppError::config(e.to_string()))?;

        tracing::info!(
            model = %config.generation.model,
            api_base = %config.google.api_base,
            "Initialized Gemini text generator"
        );

        Self::build_with_generator(config, Arc::new(generator)).await
    }

    /// Build the application with an arbitrary generator.
    pub async fn build_with_generator(
        config: SuggestConfig,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Self, AppError> {
        generator
            .health_check()
            .map_err(|e| AppError::config(e.to_string()))?;

        let service = SuggestionService::new(
            generator,
            config.generation.clone(),
            config.policy.clone(),
        );
        let router = build_router(AppState::new(service));

        // Port 0 = random port for testing
        let addr = config.common.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Suggest service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until SIGINT/SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
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
