//! Server state

use std::sync::Arc;

use crate::deploy::pipeline::BuildPipeline;
use crate::proxy::forward::ProxyClient;
use crate::proxy::router::Router;
use crate::registry::DeploymentRegistry;

/// Server state shared across handlers
pub struct ServerState {
    pub registry: Arc<DeploymentRegistry>,
    pub pipeline: Arc<BuildPipeline>,
    pub router: Router,
    pub proxy: Arc<ProxyClient>,
}

impl ServerState {
    pub fn new(
        registry: Arc<DeploymentRegistry>,
        pipeline: Arc<BuildPipeline>,
        router: Router,
        proxy: Arc<ProxyClient>,
    ) -> Self {
        Self {
            registry,
            pipeline,
            router,
            proxy,
        }
    }
}
