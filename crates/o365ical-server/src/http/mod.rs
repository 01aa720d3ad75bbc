//! HTTP front end.
//!
//! Starts and manages the axum server exposing the sign-in flow, the feed
//! and the mirrored attachments.

mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::http::HeaderMap;
use axum::http::header::HOST;
use o365ical_providers::{GraphConfig, OAuthClient};
use tower_http::LatencyUnit;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};

use crate::attachments::AttachmentMirror;
use crate::calendar::CalendarService;
use crate::error::ServerResult;
use crate::refresher::RefresherHandle;
use crate::registry::SessionRegistry;
use crate::store::Storage;

pub use routes::{COOKIE_NAME, routes};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub store: Arc<dyn Storage>,
    pub calendar: Arc<CalendarService>,
    pub mirror: AttachmentMirror,
    pub oauth: Arc<OAuthClient>,
    pub graph: GraphConfig,
    /// Running refresher; poked on sign-in, reported on `/health`.
    pub refresher: RefresherHandle,
    /// Fixed public base URL; derived from `Host` when unset.
    pub public_url: Option<String>,
}

impl AppState {
    /// Base URL feed and attachment links are built on.
    pub fn base_url(&self, headers: &HeaderMap) -> String {
        if let Some(ref url) = self.public_url {
            return url.trim_end_matches('/').to_string();
        }
        let host = headers
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("localhost");
        format!("https://{}", host)
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
        .with_state(state)
}

/// Serves the application on `addr` until `shutdown` completes.
pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> ServerResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP server stopped");
    Ok(())
}
