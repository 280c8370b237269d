//! Settings file and command line flags

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app::options::{
    AppOptions, LifecycleOptions, PipelineOptions, RouterOptions, ServerOptions,
};
use crate::errors::DoxyError;
use crate::logs::LogLevel;
use crate::proxy::router::RoutingMode;

/// Doxy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Directory for daily log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Git working directory to build from
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// First host port for containers
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// Routing configuration
    #[serde(default)]
    pub routing: RoutingSettings,

    /// Graceful shutdown limit in seconds
    #[serde(default = "default_shutdown_secs")]
    pub max_shutdown_delay_secs: u64,
}

fn default_base_port() -> u16 {
    8080
}

fn default_shutdown_secs() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            directory: None,
            server: ServerSettings::default(),
            base_port: default_base_port(),
            routing: RoutingSettings::default(),
            max_shutdown_delay_secs: default_shutdown_secs(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Routing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingSettings {
    #[serde(default)]
    pub mode: RoutingMode,

    #[serde(default = "default_domain")]
    pub domain: String,

    #[serde(default = "default_upstream_host")]
    pub upstream_host: String,
}

fn default_domain() -> String {
    "telltale.xyz".to_string()
}

fn default_upstream_host() -> String {
    "localhost".to_string()
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            mode: RoutingMode::default(),
            domain: default_domain(),
            upstream_host: default_upstream_host(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file
    pub async fn load(path: &Path) -> Result<Self, DoxyError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            DoxyError::ConfigError(format!("Unable to read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Override settings with `--key=value` flags
    pub fn apply_cli_args(&mut self, args: &HashMap<String, String>) -> Result<(), DoxyError> {
        for (key, value) in args {
            match key.as_str() {
                "directory" | "dir" => self.directory = Some(PathBuf::from(value)),
                "host" => self.server.host = value.clone(),
                "port" => self.server.port = parse_flag(key, value)?,
                "base-port" => self.base_port = parse_flag(key, value)?,
                "domain" => self.routing.domain = value.clone(),
                "routing" => {
                    self.routing.mode = value.parse().map_err(DoxyError::ConfigError)?
                }
                "upstream-host" => self.routing.upstream_host = value.clone(),
                "log-level" => self.log_level = value.parse().map_err(DoxyError::ConfigError)?,
                "log-json" => self.log_json = parse_flag(key, value)?,
                "log-dir" => self.log_dir = Some(PathBuf::from(value)),
                _ => {}
            }
        }
        Ok(())
    }

    /// Build application options. Fails when no git directory is configured.
    pub fn to_app_options(&self) -> Result<AppOptions, DoxyError> {
        let git_dir = match &self.directory {
            Some(dir) if !dir.as_os_str().is_empty() => dir.clone(),
            _ => {
                return Err(DoxyError::ConfigError(
                    "Please specify a directory.".to_string(),
                ))
            }
        };

        Ok(AppOptions {
            lifecycle: LifecycleOptions {
                max_shutdown_delay: std::time::Duration::from_secs(self.max_shutdown_delay_secs),
            },
            server: ServerOptions {
                host: self.server.host.clone(),
                port: self.server.port,
            },
            pipeline: PipelineOptions {
                git_dir,
                base_port: self.base_port,
            },
            router: RouterOptions {
                mode: self.routing.mode,
                domain: self.routing.domain.clone(),
                upstream_host: self.routing.upstream_host.clone(),
                ..Default::default()
            },
        })
    }
}

fn parse_flag<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, DoxyError> {
    value
        .parse()
        .map_err(|_| DoxyError::ConfigError(format!("Invalid value for --{}: {}", key, value)))
}

/// Flags that take no value
const SWITCHES: [&str; 2] = ["version", "log-json"];

/// Parse `--key=value`, `--key value` and standalone switches. One or two
/// leading dashes are accepted.
pub fn parse_cli_args<I>(args: I) -> Result<HashMap<String, String>, DoxyError>
where
    I: IntoIterator<Item = String>,
{
    let mut cli_args = HashMap::new();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let flag = match arg.strip_prefix('-') {
            Some(flag) => flag.trim_start_matches('-'),
            None => {
                return Err(DoxyError::ConfigError(format!(
                    "Unexpected argument: {}",
                    arg
                )))
            }
        };

        if let Some((key, value)) = flag.split_once('=') {
            cli_args.insert(key.to_string(), value.to_string());
        } else if SWITCHES.contains(&flag) {
            cli_args.insert(flag.to_string(), "true".to_string());
        } else {
            match args.next() {
                Some(value) if !value.starts_with('-') => {
                    cli_args.insert(flag.to_string(), value);
                }
                _ => {
                    return Err(DoxyError::ConfigError(format!(
                        "Missing value for --{}",
                        flag
                    )))
                }
            }
        }
    }

    Ok(cli_args)
}
