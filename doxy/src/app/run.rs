//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::DoxyError;
use crate::server::serve::serve;

/// Run doxy until the shutdown signal resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DoxyError> {
    let app_state = Arc::new(AppState::init(&options).await?);
    run_with_state(options, app_state, shutdown_signal).await
}

/// Run doxy over already initialized state
pub async fn run_with_state(
    options: AppOptions,
    app_state: Arc<AppState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DoxyError> {
    info!("Initializing doxy...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager =
        ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone(), app_state.clone());

    if let Err(e) = init_server(&options, &app_state, &mut shutdown_manager, shutdown_tx.subscribe()).await {
        error!("Failed to start doxy: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

async fn init_server(
    options: &AppOptions,
    app_state: &AppState,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DoxyError> {
    info!("Initializing HTTP server...");

    let server_handle = serve(&options.server, Arc::new(app_state.server_state()), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_server_handle(server_handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Arc<AppState>,
    server_handle: Option<JoinHandle<Result<(), DoxyError>>>,
}

impl ShutdownManager {
    fn new(
        shutdown_tx: broadcast::Sender<()>,
        lifecycle_options: LifecycleOptions,
        app_state: Arc<AppState>,
    ) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state,
            server_handle: None,
        }
    }

    fn with_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), DoxyError>>,
    ) -> Result<(), DoxyError> {
        if self.server_handle.is_some() {
            return Err(DoxyError::ShutdownError("server_handle already set".to_string()));
        }
        self.server_handle = Some(handle);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), DoxyError> {
        let _ = self.shutdown_tx.send(());

        let max_delay = self.lifecycle_options.max_shutdown_delay;
        match tokio::time::timeout(max_delay, self.shutdown_impl()).await {
            Ok(result) => result,
            Err(_) => Err(DoxyError::ShutdownError(format!(
                "Shutdown timed out after {:?}",
                max_delay
            ))),
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), DoxyError> {
        info!("Shutting down doxy...");

        // 1. Server; an in-flight build finishes before this returns
        if let Some(handle) = self.server_handle.take() {
            handle.await.map_err(|e| DoxyError::ShutdownError(e.to_string()))??;
        }

        // 2. App state
        self.app_state.shutdown().await?;

        info!("Shutdown complete");
        Ok(())
    }
}
