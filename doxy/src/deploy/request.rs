//! Deployment request model

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::errors::DoxyError;

pub const DEFAULT_BRANCH: &str = "master";
pub const DEFAULT_SUBDIRECTORY: &str = ".";
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Body of `POST /doxy`. Every field may be omitted; empty or zero values
/// fall back to defaults during validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeployRequest {
    pub branch_name: String,
    pub subdirectory: String,
    pub dockerfile: String,
    pub deployment_name: String,
    pub http_port: u16,
    pub pull_origin: bool,
}

/// A request with defaults applied and arguments checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploySpec {
    pub name: String,
    pub branch: String,
    pub subdirectory: String,
    pub dockerfile: String,
    pub http_port: u16,
    pub pull_origin: bool,
}

impl DeployRequest {
    /// Apply defaults and reject requests that cannot be deployed
    pub fn validate(self) -> Result<DeploySpec, DoxyError> {
        if self.deployment_name.is_empty() {
            return Err(DoxyError::ValidationError(
                "No deployment name specified.".to_string(),
            ));
        }

        let branch = or_default(self.branch_name, DEFAULT_BRANCH);
        let dockerfile = or_default(self.dockerfile, DEFAULT_DOCKERFILE);
        let subdirectory = match self.subdirectory.trim_start_matches('/') {
            "" => DEFAULT_SUBDIRECTORY.to_string(),
            dir => dir.to_string(),
        };
        let http_port = if self.http_port == 0 {
            DEFAULT_HTTP_PORT
        } else {
            self.http_port
        };

        // values are passed as process arguments, never through a shell,
        // but a leading dash would still be read as an option
        for (field, value) in [
            ("deploymentName", &self.deployment_name),
            ("branchName", &branch),
            ("dockerfile", &dockerfile),
        ] {
            if value.starts_with('-') {
                return Err(DoxyError::ValidationError(format!(
                    "{} must not start with '-'",
                    field
                )));
            }
        }

        if Path::new(&subdirectory)
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(DoxyError::ValidationError(
                "subdirectory must stay inside the repository".to_string(),
            ));
        }

        Ok(DeploySpec {
            name: self.deployment_name,
            branch,
            subdirectory,
            dockerfile,
            http_port,
            pull_origin: self.pull_origin,
        })
    }
}

fn or_default(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}
