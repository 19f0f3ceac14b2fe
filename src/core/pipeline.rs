//! Deployment pipeline controller.
//!
//! Runs the steps strictly in order, one command at a time:
//!
//! ```text
//! Idle → ConfigLoaded → TreeChecked → BranchResolved → UpstreamVerified → Rebased
//!      → DepsInstalled → Tested → Built → Deployed → BranchRestored
//! ```
//!
//! The first failing step moves the run to `Failed` and nothing after it runs.
//! If the run switched branches, a best-effort checkout of the original branch
//! is still attempted on failure. Remote changes are never rolled back.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::build;
use crate::config::{self, DeployConfig};
use crate::deploy;
use crate::error::Result;
use crate::git;
use crate::release::{self, ReleaseIdentity};
use crate::utils::command::{CommandRunner, DryRunRunner, StreamingRunner};

pub const DEFAULT_DIST_DIR: &str = "/dist";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    /// Build mode passed to the package manager.
    pub fn mode(&self) -> &'static str {
        self.as_str()
    }

    /// `deploy/<environment>.json`
    pub fn default_config_path(&self) -> PathBuf {
        Path::new("deploy").join(format!("{}.json", self.as_str()))
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    ConfigLoaded,
    TreeChecked,
    BranchResolved,
    UpstreamVerified,
    Rebased,
    DepsInstalled,
    Tested,
    Built,
    Deployed,
    BranchRestored,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::BranchRestored | PipelineState::Failed)
    }
}

/// What the controller knows about the run; steps only read it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub environment: Environment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_branch: Option<String>,
    pub dist_dir: PathBuf,
    #[serde(skip)]
    pub config: DeployConfig,
}

impl RunState {
    pub fn new(environment: Environment, config: DeployConfig, dist_dir: PathBuf) -> Self {
        Self {
            environment,
            original_branch: None,
            target_branch: None,
            dist_dir,
            config,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub environment: Environment,
    pub original_branch: String,
    pub target_branch: String,
    pub release: ReleaseIdentity,
    pub dry_run: bool,
    pub states: Vec<PipelineState>,
}

pub struct Pipeline<'a> {
    runner: &'a dyn CommandRunner,
    release_id: String,
    state: PipelineState,
    history: Vec<PipelineState>,
    /// Set while the working tree is on the target branch instead of the original.
    switched_branch: bool,
}

impl<'a> Pipeline<'a> {
    /// `release_id` names the release directory created by this run.
    pub fn new(runner: &'a dyn CommandRunner, release_id: impl Into<String>) -> Self {
        Self {
            runner,
            release_id: release_id.into(),
            state: PipelineState::Idle,
            history: vec![PipelineState::Idle],
            switched_branch: false,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    fn advance(&mut self, next: PipelineState) {
        self.state = next;
        self.history.push(next);
    }

    /// Run all steps against an already loaded configuration.
    pub fn execute(&mut self, run: &mut RunState) -> Result<RunReport> {
        if self.state.is_terminal() {
            return Err(crate::error::Error::internal_unexpected(format!(
                "pipeline has already finished in state {:?}",
                self.state
            )));
        }
        self.advance(PipelineState::ConfigLoaded);

        match self.execute_steps(run) {
            Ok(release) => Ok(RunReport {
                environment: run.environment,
                original_branch: run.original_branch.clone().unwrap_or_default(),
                target_branch: run.target_branch.clone().unwrap_or_default(),
                release,
                dry_run: false,
                states: self.history.clone(),
            }),
            Err(err) => {
                self.advance(PipelineState::Failed);
                self.restore_after_failure(run);
                Err(err)
            }
        }
    }

    fn execute_steps(&mut self, run: &mut RunState) -> Result<ReleaseIdentity> {
        let runner = self.runner;

        git::ensure_clean_working_tree(runner)?;
        self.advance(PipelineState::TreeChecked);

        let original = git::current_branch(runner)?;
        run.original_branch = Some(original.clone());
        let target = run
            .config
            .branch()
            .map(str::to_string)
            .unwrap_or_else(|| original.clone());
        run.target_branch = Some(target.clone());
        if target != original {
            git::checkout(runner, &target)?;
            self.switched_branch = true;
        }
        self.advance(PipelineState::BranchResolved);

        git::check_upstream(runner, &target)?;
        self.advance(PipelineState::UpstreamVerified);

        git::rebase_from_remote(runner, &target)?;
        self.advance(PipelineState::Rebased);

        let package_manager = run.config.package_manager().to_string();
        build::install_dependencies(runner, &package_manager)?;
        self.advance(PipelineState::DepsInstalled);

        build::run_unit_tests(runner, &package_manager)?;
        self.advance(PipelineState::Tested);

        build::build(runner, &package_manager, run.environment.mode())?;
        self.advance(PipelineState::Built);

        let release = deploy::deploy_release(runner, &run.config, &run.dist_dir, &self.release_id)?;
        self.advance(PipelineState::Deployed);

        if self.switched_branch {
            self.switched_branch = false;
            git::checkout(runner, &original)?;
        }
        self.advance(PipelineState::BranchRestored);

        Ok(release)
    }

    fn restore_after_failure(&mut self, run: &RunState) {
        if !self.switched_branch {
            return;
        }
        self.switched_branch = false;
        let Some(original) = run.original_branch.as_deref() else {
            return;
        };
        if let Err(err) = git::checkout(self.runner, original) {
            eprintln!(
                "[git] Could not return to '{}': {}. Check it out manually.",
                original, err
            );
        }
    }
}

/// Options for one CLI invocation.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub environment: Environment,
    /// Defaults to `deploy/<environment>.json`.
    pub config_path: Option<PathBuf>,
    pub dist_dir: PathBuf,
    pub dry_run: bool,
}

impl DeployOptions {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            config_path: None,
            dist_dir: PathBuf::from(DEFAULT_DIST_DIR),
            dry_run: false,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(|| self.environment.default_config_path())
    }
}

/// Load configuration, then deploy with real commands (or a dry run).
pub fn run(options: &DeployOptions) -> Result<RunReport> {
    let config_path = options.config_path();
    eprintln!(
        "[deploy] Deploying to {} using {}",
        options.environment,
        config_path.display()
    );
    let config = config::load_lenient(&config_path);
    let mut state = RunState::new(options.environment, config, options.dist_dir.clone());

    let release_id = release::generate_id();

    let report = if options.dry_run {
        let runner = DryRunRunner::new(StreamingRunner);
        Pipeline::new(&runner, release_id).execute(&mut state)
    } else {
        Pipeline::new(&StreamingRunner, release_id).execute(&mut state)
    }?;

    Ok(RunReport {
        dry_run: options.dry_run,
        ..report
    })
}
