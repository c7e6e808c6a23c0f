//! Chat widget relay server.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chat_widget::adapters::{
    app_router, AnthropicProvider, ChatAppState, InMemoryRateLimiter, RateLimitCleanup,
};
use chat_widget::application::StreamRelay;
use chat_widget::config::AppConfig;
use chat_widget::domain::chat::RequestValidator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config);

    config.validate()?;
    let addr = config.server.socket_addr()?;

    let provider = AnthropicProvider::new(config.ai.anthropic_config()?)?;
    let relay = StreamRelay::new(
        Arc::new(provider),
        config.prompt.composer()?,
        config.relay_settings(),
    );

    let limiter = Arc::new(InMemoryRateLimiter::new(config.rate_limit.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cleanup = RateLimitCleanup::new(limiter.clone()).spawn(shutdown_rx);

    let state = ChatAppState {
        relay: Arc::new(relay),
        validator: RequestValidator::new(config.chat),
        rate_limiter: limiter,
    };
    let app = app_router(state, &config.server.cors_origins_list());

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        environment = ?config.server.environment,
        model = %config.ai.model,
        rate_limit = config.rate_limit.max_requests,
        "Chat relay listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = cleanup.await {
        tracing::warn!(error = %e, "Rate limit cleanup task ended abnormally");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

/// JSON logs in production, human-readable otherwise. `RUST_LOG` wins over
/// the configured level.
fn init_tracing(config: &AppConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .ok();
    }
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
