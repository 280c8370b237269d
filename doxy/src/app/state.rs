//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::deploy::command::{CommandRunner, ProcessRunner};
use crate::deploy::pipeline::BuildPipeline;
use crate::errors::DoxyError;
use crate::proxy::forward::ProxyClient;
use crate::proxy::router::Router;
use crate::registry::DeploymentRegistry;
use crate::server::state::ServerState;

/// Main application state
pub struct AppState {
    /// Deployment name to image index
    pub registry: Arc<DeploymentRegistry>,

    /// Serialized build-and-run pipeline
    pub pipeline: Arc<BuildPipeline>,

    /// Deployment name resolver
    pub router: Router,

    /// Reverse proxy client
    pub proxy: Arc<ProxyClient>,
}

impl AppState {
    /// Initialize application state with real git and docker processes
    pub async fn init(options: &AppOptions) -> Result<Self, DoxyError> {
        Self::init_with_runner(options, Arc::new(ProcessRunner)).await
    }

    /// Initialize application state with a custom command runner
    pub async fn init_with_runner(
        options: &AppOptions,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, DoxyError> {
        info!("Initializing application state...");

        let git_dir = &options.pipeline.git_dir;
        let metadata = tokio::fs::metadata(git_dir).await.map_err(|e| {
            DoxyError::ConfigError(format!("Unable to read {}: {}", git_dir.display(), e))
        })?;
        if !metadata.is_dir() {
            return Err(DoxyError::ConfigError(format!(
                "{} is not a directory",
                git_dir.display()
            )));
        }

        let registry = Arc::new(DeploymentRegistry::new(options.pipeline.base_port));
        let pipeline = Arc::new(BuildPipeline::new(
            git_dir.clone(),
            runner,
            registry.clone(),
        ));
        let router = Router::new(options.router.mode, &options.router.domain);
        let proxy = Arc::new(ProxyClient::new(
            &options.router.upstream_host,
            options.router.connect_timeout,
            options.router.max_body_bytes,
        )?);

        Ok(Self {
            registry,
            pipeline,
            router,
            proxy,
        })
    }

    /// State handed to the HTTP handlers
    pub fn server_state(&self) -> ServerState {
        ServerState::new(
            self.registry.clone(),
            self.pipeline.clone(),
            self.router.clone(),
            self.proxy.clone(),
        )
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), DoxyError> {
        info!(
            "Shutting down with {} deployment(s) still running",
            self.registry.len()
        );
        Ok(())
    }
}
