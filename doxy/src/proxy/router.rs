//! Resolve which deployment an incoming request is addressed to

use serde::{Deserialize, Serialize};

use crate::errors::DoxyError;

/// How the deployment name is read from a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// `<name>.<domain>` in the Host header
    #[default]
    Subdomain,
    /// `/<name>/...` as the first path segment, stripped before forwarding
    Path,
}

impl std::str::FromStr for RoutingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "subdomain" | "host" => Ok(RoutingMode::Subdomain),
            "path" | "prefix" => Ok(RoutingMode::Path),
            _ => Err(format!("Invalid routing mode: {}", s)),
        }
    }
}

/// First path segment of doxy's own endpoints
pub const CONTROL_PREFIX: &str = "doxy";

/// Where a request should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub name: String,
    /// Path to request upstream, always starting with `/`
    pub path: String,
}

/// Deployment name resolver
#[derive(Debug, Clone)]
pub struct Router {
    mode: RoutingMode,
    domain: String,
}

impl Router {
    pub fn new(mode: RoutingMode, domain: &str) -> Self {
        Self {
            mode,
            domain: domain.trim_start_matches('.').to_lowercase(),
        }
    }

    /// Deployment name and upstream path for a request
    pub fn resolve(&self, host: Option<&str>, path: &str) -> Result<RouteTarget, DoxyError> {
        match self.mode {
            RoutingMode::Subdomain => {
                let name = host
                    .and_then(|h| self.subdomain(h))
                    .ok_or(DoxyError::NoDeployment)?;
                Ok(RouteTarget {
                    name,
                    path: path.to_string(),
                })
            }
            RoutingMode::Path => split_prefix(path).ok_or(DoxyError::NoDeployment),
        }
    }

    /// Whether a request to one of doxy's `/doxy/...` paths is really meant
    /// for a deployment. In subdomain mode that is any request whose Host
    /// names one; in path mode the `doxy` prefix is always reserved.
    pub fn names_deployment(&self, host: Option<&str>, path: &str) -> bool {
        match self.mode {
            RoutingMode::Subdomain => host.and_then(|h| self.subdomain(h)).is_some(),
            RoutingMode::Path => {
                split_prefix(path).is_some_and(|target| target.name != CONTROL_PREFIX)
            }
        }
    }

    fn subdomain(&self, host: &str) -> Option<String> {
        let host = strip_port(host).to_lowercase();
        let name = host.strip_suffix(&self.domain)?.strip_suffix('.')?;
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

fn split_prefix(path: &str) -> Option<RouteTarget> {
    let trimmed = path.trim_start_matches('/');
    let (name, rest) = match trimmed.split_once('/') {
        Some((name, rest)) => (name, format!("/{}", rest)),
        None => (trimmed, "/".to_string()),
    };
    if name.is_empty() {
        return None;
    }
    Some(RouteTarget {
        name: name.to_string(),
        path: rest,
    })
}
