//! Shared test fixtures

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use doxy::app::options::AppOptions;
use doxy::app::state::AppState;
use doxy::deploy::command::{BuildStep, CommandOutput, CommandRunner};
use doxy::errors::DoxyError;
use doxy::proxy::router::RoutingMode;

/// Command runner that records steps instead of spawning processes
#[derive(Default)]
pub struct ScriptedRunner {
    steps: Mutex<Vec<BuildStep>>,
    fail_on: Option<(String, String)>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first step whose program and first argument match
    pub fn failing_on(program: &str, subcommand: &str) -> Self {
        Self {
            fail_on: Some((program.to_string(), subcommand.to_string())),
            ..Default::default()
        }
    }

    /// Hold each step for a while so concurrent builds would overlap
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn steps(&self) -> Vec<BuildStep> {
        self.steps.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, step: &BuildStep) -> Result<CommandOutput, DoxyError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.steps.lock().unwrap().push(step.clone());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let fails = self.fail_on.as_ref().is_some_and(|(program, subcommand)| {
            step.program == *program && step.args.first() == Some(subcommand)
        });

        if fails {
            Ok(CommandOutput {
                success: false,
                exit_code: Some(1),
                stdout: "Sending build context to Docker daemon".to_string(),
                stderr: "unable to prepare context: unable to evaluate symlinks".to_string(),
            })
        } else {
            Ok(CommandOutput {
                success: true,
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }
}

pub fn git_dir() -> PathBuf {
    std::env::temp_dir()
}

pub fn options(base_port: u16, mode: RoutingMode) -> AppOptions {
    let mut options = AppOptions::default();
    options.pipeline.git_dir = git_dir();
    options.pipeline.base_port = base_port;
    options.router.mode = mode;
    options.router.upstream_host = "127.0.0.1".to_string();
    options
}

pub async fn app_state(
    base_port: u16,
    mode: RoutingMode,
    runner: Arc<ScriptedRunner>,
) -> AppState {
    AppState::init_with_runner(&options(base_port, mode), runner)
        .await
        .unwrap()
}
