//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::proxy::router::RoutingMode;

/// Main application options
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Server configuration
    pub server: ServerOptions,

    /// Build pipeline configuration
    pub pipeline: PipelineOptions,

    /// Request routing configuration
    pub router: RouterOptions,
}

/// Lifecycle options
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// Build-and-run pipeline options
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Git working directory images are built from
    pub git_dir: PathBuf,

    /// Host port of image 0; image N is published on `base_port + N`
    pub base_port: u16,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            git_dir: PathBuf::new(),
            base_port: 8080,
        }
    }
}

/// Routing and proxy options
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// How deployment names are read from requests
    pub mode: RoutingMode,

    /// Domain stripped from the Host header in subdomain mode
    pub domain: String,

    /// Host the containers' ports are published on
    pub upstream_host: String,

    /// Timeout for connecting to a container
    pub connect_timeout: Duration,

    /// Largest request body forwarded to a container
    pub max_body_bytes: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            mode: RoutingMode::Subdomain,
            domain: "telltale.xyz".to_string(),
            upstream_host: "localhost".to_string(),
            connect_timeout: Duration::from_secs(10),
            max_body_bytes: 64 * 1024 * 1024,
        }
    }
}
