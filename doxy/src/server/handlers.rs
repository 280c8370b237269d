//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::debug;

use crate::deploy::request::DeployRequest;
use crate::errors::DoxyError;
use crate::registry::DeploymentEntry;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Deploy handler: build and run a branch, then route its name to it
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<&'static str, DoxyError> {
    let request: DeployRequest = serde_json::from_slice(&body).map_err(|e| {
        debug!("Rejected deploy body: {}", e);
        DoxyError::ValidationError("Could not decode JSON body.".to_string())
    })?;

    state.pipeline.deploy(request).await?;
    Ok("Deployed!")
}

/// Deployments response
#[derive(Debug, Serialize)]
pub struct DeploymentsResponse {
    pub deployments: Vec<DeploymentEntry>,
    pub total: usize,
}

/// Deployments handler
pub async fn deployments_handler(
    State(state): State<Arc<ServerState>>,
    request: Request,
) -> Result<Response, DoxyError> {
    if addressed_to_deployment(&state, &request) {
        return proxy_handler(State(state), request).await;
    }

    let deployments = state.registry.list();
    let total = deployments.len();
    Ok(Json(DeploymentsResponse { deployments, total }).into_response())
}

/// Version handler
pub async fn version_handler(
    State(state): State<Arc<ServerState>>,
    request: Request,
) -> Result<Response, DoxyError> {
    if addressed_to_deployment(&state, &request) {
        return proxy_handler(State(state), request).await;
    }

    Ok(Json(version_info()).into_response())
}

/// Catch-all handler: forward to the deployment the request names
pub async fn proxy_handler(
    State(state): State<Arc<ServerState>>,
    request: Request,
) -> Result<Response, DoxyError> {
    let host = request_host(&request);
    let target = state.router.resolve(host.as_deref(), request.uri().path())?;
    let index = state
        .registry
        .lookup(&target.name)
        .ok_or_else(|| DoxyError::UnknownDeployment(target.name.clone()))?;
    let port = state
        .registry
        .port_for(index)
        .ok_or_else(|| DoxyError::ServerError(format!("No port for image {}", index)))?;

    state.proxy.forward(request, port, &target.path).await
}

fn request_host(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| request.uri().host())
        .map(str::to_string)
}

fn addressed_to_deployment(state: &ServerState, request: &Request) -> bool {
    let host = request_host(request);
    state
        .router
        .names_deployment(host.as_deref(), request.uri().path())
}
