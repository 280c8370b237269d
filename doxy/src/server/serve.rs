//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::DoxyError;
use crate::server::handlers::{
    deploy_handler, deployments_handler, proxy_handler, version_handler,
};
use crate::server::state::ServerState;

/// Build the application router
pub fn app(state: Arc<ServerState>) -> Router {
    Router::new()
        // Deployments; the listing and version paths fall through to the
        // proxy when the request names a deployment
        .route("/doxy", any(deploy_handler))
        .route("/doxy/deployments", any(deployments_handler))
        .route("/doxy/version", any(version_handler))
        // Everything else goes to a deployment
        .fallback(proxy_handler)
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), DoxyError>>, DoxyError> {
    let app = app(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| DoxyError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| DoxyError::ServerError(e.to_string()))
    });

    Ok(handle)
}
