//! Reference audit server
//!
//! Serves the audit REST API from memory, for local development against
//! `fieldsync sync` and `fieldsync watch`. Everything is lost on restart.
//!
//! # Configuration
//!
//! Environment variables:
//! - `FIELDSYNC_SERVER_PORT`: Port to listen on (default: 8000)
//! - `FIELDSYNC_SERVER_TOKENS`: Comma-separated bearer tokens accepted
//! - `FIELDSYNC_SERVER_PAGE_SIZE`: Rows per list page (default: 50)
//!
//! # Endpoints
//!
//! - `GET /api/health`: Health check endpoint (no auth required)
//! - `GET|POST /api/auditoria/<collection>/`: List or create (auth required)
//! - `GET /api/auditoria/<collection>/<id>/`: Fetch one (auth required)

use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldsync::server::{router, AppState, DEFAULT_PAGE_SIZE};

/// Server configuration
#[derive(Debug, Clone)]
struct Config {
    /// Port to listen on
    port: u16,
    /// Accepted bearer tokens
    tokens: Vec<String>,
    /// Rows per list page
    page_size: usize,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let port = std::env::var("FIELDSYNC_SERVER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8000);

        let tokens = std::env::var("FIELDSYNC_SERVER_TOKENS")
            .map(|v| parse_tokens(&v))
            .unwrap_or_default();

        let page_size = std::env::var("FIELDSYNC_SERVER_PAGE_SIZE")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE);

        Self {
            port,
            tokens,
            page_size,
        }
    }
}

fn parse_tokens(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldsync=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    if config.tokens.is_empty() {
        tracing::warn!("No tokens configured - all authenticated requests will fail");
    } else {
        tracing::info!("Loaded {} token(s)", config.tokens.len());
    }

    let state = AppState::new(config.tokens).with_page_size(config.page_size);
    let app = router(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tokens() {
        assert_eq!(parse_tokens("a, b,,c "), vec!["a", "b", "c"]);
        assert!(parse_tokens("").is_empty());
    }
}
