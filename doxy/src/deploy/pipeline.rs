//! Build-and-run pipeline
//!
//! Checks out the requested branch, builds an image from it and starts the
//! image as a detached container. Builds share one git working directory, so
//! they run one at a time: the build lock is held for the whole sequence and
//! also owns the image counter. Each build runs in its own task, so a caller
//! that goes away mid-build cannot release the lock while git or docker is
//! still running.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::deploy::command::{BuildStep, CommandFailure, CommandRunner};
use crate::deploy::request::{DeployRequest, DeploySpec};
use crate::errors::DoxyError;
use crate::registry::{DeploymentEntry, DeploymentRegistry};

/// Label attached to every container started by doxy
pub const DEPLOYMENT_LABEL: &str = "doxy.deployment";

/// Image tag for an image index
pub fn image_tag(index: u32) -> String {
    format!("image{}", index)
}

/// Serialized build-and-run pipeline
pub struct BuildPipeline {
    git_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
    registry: Arc<DeploymentRegistry>,
    next_image: Mutex<u32>,
}

impl BuildPipeline {
    pub fn new(
        git_dir: PathBuf,
        runner: Arc<dyn CommandRunner>,
        registry: Arc<DeploymentRegistry>,
    ) -> Self {
        Self {
            git_dir,
            runner,
            registry,
            next_image: Mutex::new(0),
        }
    }

    /// Validate a request, build and run it, and publish its registry entry.
    ///
    /// The build itself is spawned and runs to completion even if the
    /// returned future is dropped.
    pub async fn deploy(
        self: &Arc<Self>,
        request: DeployRequest,
    ) -> Result<DeploymentEntry, DoxyError> {
        let spec = request.validate()?;
        let span = info_span!("deploy", id = %uuid::Uuid::new_v4(), name = %spec.name);

        let pipeline = Arc::clone(self);
        let handle = tokio::spawn(
            async move { pipeline.deploy_validated(spec).await }.instrument(span),
        );

        handle
            .await
            .map_err(|e| DoxyError::ServerError(format!("Deployment task failed: {}", e)))?
    }

    async fn deploy_validated(&self, spec: DeploySpec) -> Result<DeploymentEntry, DoxyError> {
        let mut next_image = self.next_image.lock().await;
        let index = *next_image;
        let host_port = self.registry.port_for(index).ok_or_else(|| {
            DoxyError::ServerError(format!(
                "Host port range exhausted after {} images",
                index
            ))
        })?;

        info!(
            "Deploying branch {} as {} on port {}",
            spec.branch, spec.name, host_port
        );

        for step in self.plan(&spec, index, host_port) {
            let output = self.runner.run(&step).await.map_err(|e| {
                DoxyError::ServerError(format!("Failed to run {}: {}", step, e))
            })?;

            if !output.success {
                let failure = CommandFailure::new(step, output);
                error!("{}", failure);
                debug!("stdout:\n{}", failure.stdout);
                debug!("stderr:\n{}", failure.stderr);
                return Err(failure.into());
            }

            debug!("{} succeeded:\n{}", step, output.stdout);
        }

        let entry = DeploymentEntry {
            name: spec.name.clone(),
            index,
            host_port,
            image: image_tag(index),
            branch: spec.branch.clone(),
            container_port: spec.http_port,
            deployed_at: Utc::now(),
        };

        if let Some(previous) = self.registry.register(entry.clone()) {
            warn!(
                "Replaced deployment {}; container from {} on port {} is still running",
                previous.name, previous.image, previous.host_port
            );
        }
        *next_image += 1;

        info!("Deployed {} ({}) on port {}", entry.name, entry.image, host_port);
        Ok(entry)
    }

    /// Commands for one deployment, in execution order
    pub fn plan(&self, spec: &DeploySpec, index: u32, host_port: u16) -> Vec<BuildStep> {
        let tag = image_tag(index);
        let build_dir = self.git_dir.join(&spec.subdirectory);
        let mut steps = Vec::with_capacity(4);

        if spec.pull_origin {
            steps.push(BuildStep::new("git", ["pull"], &self.git_dir));
        }

        steps.push(BuildStep::new(
            "git",
            ["checkout".to_string(), spec.branch.clone()],
            &self.git_dir,
        ));

        steps.push(BuildStep::new(
            "docker",
            [
                "build".to_string(),
                "-t".to_string(),
                tag.clone(),
                "-f".to_string(),
                spec.dockerfile.clone(),
                ".".to_string(),
            ],
            &build_dir,
        ));

        steps.push(BuildStep::new(
            "docker",
            [
                "run".to_string(),
                "-d".to_string(),
                "--label".to_string(),
                format!("{}={}", DEPLOYMENT_LABEL, spec.name),
                "-p".to_string(),
                format!("{}:{}", host_port, spec.http_port),
                tag,
            ],
            &build_dir,
        ));

        steps
    }
}
