use std::cell::RefCell;
use std::path::PathBuf;

use deployer::command::{CommandOutput, CommandRunner, DryRunRunner, Invocation};
use deployer::config::DeployConfig;
use deployer::error::CommandFailedDetails;
use deployer::pipeline::{Environment, Pipeline, PipelineState, RunState};
use deployer::{Error, ErrorCode, Result};

const RELEASE_ID: &str = "1700000000";

/// Records every invocation and answers like a healthy repository and server,
/// except for the invocation selected by `fail_when`.
#[derive(Default)]
struct FakeRunner {
    current_branch: String,
    status: String,
    fail_when: Option<Box<dyn Fn(&Invocation) -> bool>>,
    calls: RefCell<Vec<Invocation>>,
}

impl FakeRunner {
    fn on_branch(branch: &str) -> Self {
        Self {
            current_branch: branch.to_string(),
            ..Default::default()
        }
    }

    fn dirty(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    fn failing(mut self, predicate: impl Fn(&Invocation) -> bool + 'static) -> Self {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.to_string()).collect()
    }

    fn count(&self, command: &str) -> usize {
        self.commands().iter().filter(|c| *c == command).count()
    }

    fn ran(&self, program: &str) -> bool {
        self.calls.borrow().iter().any(|c| c.program == program)
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(invocation.clone());

        if self.fail_when.as_ref().is_some_and(|f| f(invocation)) {
            return Err(Error::command_failed(CommandFailedDetails {
                program: invocation.program.clone(),
                args: invocation.args.clone(),
                exit_code: 1,
                stdout: String::new(),
                stderr: "boom".to_string(),
            }));
        }

        let stdout = match (
            invocation.program.as_str(),
            invocation.args.first().map(String::as_str),
        ) {
            ("git", Some("status")) => self.status.clone(),
            ("git", Some("rev-parse")) => format!("{}\n", self.current_branch),
            _ => String::new(),
        };

        Ok(CommandOutput {
            exit_code: 0,
            stdout: stdout.into_bytes(),
            stderr: Vec::new(),
        })
    }
}

fn config(branch: &str) -> DeployConfig {
    DeployConfig {
        host: "example.com".to_string(),
        user: "deploy".to_string(),
        branch: branch.to_string(),
        deploy_to: "/srv/app".to_string(),
        ..Default::default()
    }
}

fn run_state(environment: Environment, config: DeployConfig) -> RunState {
    RunState::new(environment, config, PathBuf::from("dist"))
}

fn is_build(invocation: &Invocation) -> bool {
    invocation.program == "yarn" && invocation.args.first().map(String::as_str) == Some("build")
}

#[test]
fn clean_run_on_target_branch_executes_every_step_in_order() {
    let runner = FakeRunner::on_branch("main");
    let mut state = run_state(Environment::Staging, config("main"));
    let mut pipeline = Pipeline::new(&runner, RELEASE_ID);

    let report = pipeline.execute(&mut state).unwrap();

    assert_eq!(
        runner.commands(),
        vec![
            "git status --porcelain",
            "git rev-parse --abbrev-ref HEAD",
            "git log origin/main..HEAD",
            "git pull --rebase origin main",
            "yarn install",
            "yarn test:unit",
            "yarn build -m staging",
            "ssh deploy@example.com 'mkdir -p '\\''/srv/app'\\'' '\\''/srv/app/releases/1700000000'\\'''",
            "rsync -rv dist/ deploy@example.com:/srv/app/releases/1700000000",
            "ssh deploy@example.com 'rm -rf '\\''/srv/app/current'\\''; ln -s '\\''/srv/app/releases/1700000000'\\'' '\\''/srv/app/current'\\'''",
        ]
    );
    assert_eq!(
        report.states,
        vec![
            PipelineState::Idle,
            PipelineState::ConfigLoaded,
            PipelineState::TreeChecked,
            PipelineState::BranchResolved,
            PipelineState::UpstreamVerified,
            PipelineState::Rebased,
            PipelineState::DepsInstalled,
            PipelineState::Tested,
            PipelineState::Built,
            PipelineState::Deployed,
            PipelineState::BranchRestored,
        ]
    );
    assert_eq!(pipeline.state(), PipelineState::BranchRestored);
    assert_eq!(report.release.release_path, "/srv/app/releases/1700000000");
    assert_eq!(report.original_branch, "main");
    assert_eq!(report.target_branch, "main");
    assert!(!runner.commands().iter().any(|c| c.starts_with("git checkout")));
}

#[test]
fn remote_commands_are_single_ssh_arguments() {
    let runner = FakeRunner::on_branch("main");
    let mut state = run_state(Environment::Staging, config("main"));

    Pipeline::new(&runner, RELEASE_ID).execute(&mut state).unwrap();

    let calls = runner.calls.borrow();
    let ssh: Vec<&Invocation> = calls.iter().filter(|c| c.program == "ssh").collect();
    assert_eq!(ssh.len(), 2);
    assert_eq!(
        ssh[0].args,
        vec![
            "deploy@example.com",
            "mkdir -p '/srv/app' '/srv/app/releases/1700000000'"
        ]
    );
    assert_eq!(
        ssh[1].args[1],
        "rm -rf '/srv/app/current'; ln -s '/srv/app/releases/1700000000' '/srv/app/current'"
    );
}

#[test]
fn different_branch_is_checked_out_once_and_restored_once() {
    let runner = FakeRunner::on_branch("feature/login");
    let mut state = run_state(Environment::Staging, config("main"));

    let report = Pipeline::new(&runner, RELEASE_ID)
        .execute(&mut state)
        .unwrap();

    let commands = runner.commands();
    let to_target = commands
        .iter()
        .position(|c| c == "git checkout main")
        .unwrap();
    let build = commands
        .iter()
        .position(|c| c == "yarn build -m staging")
        .unwrap();
    assert!(to_target < build);
    assert_eq!(runner.count("git checkout main"), 1);
    assert_eq!(runner.count("git checkout feature/login"), 1);
    assert_eq!(commands.last().unwrap(), "git checkout feature/login");
    assert_eq!(report.original_branch, "feature/login");
    assert_eq!(report.target_branch, "main");
}

#[test]
fn empty_branch_deploys_current_branch_without_checkout() {
    let runner = FakeRunner::on_branch("develop");
    let mut state = run_state(Environment::Staging, config(""));

    let report = Pipeline::new(&runner, RELEASE_ID)
        .execute(&mut state)
        .unwrap();

    assert_eq!(report.target_branch, "develop");
    assert!(runner.commands().contains(&"git log origin/develop..HEAD".to_string()));
    assert!(!runner.commands().iter().any(|c| c.starts_with("git checkout")));
}

#[test]
fn production_builds_in_production_mode() {
    let runner = FakeRunner::on_branch("main");
    let mut state = run_state(Environment::Production, config("main"));

    Pipeline::new(&runner, RELEASE_ID)
        .execute(&mut state)
        .unwrap();

    assert_eq!(runner.count("yarn build -m production"), 1);
    assert_eq!(runner.count("yarn build -m staging"), 0);
}

#[test]
fn configured_package_manager_is_used() {
    let runner = FakeRunner::on_branch("main");
    let mut state = run_state(
        Environment::Staging,
        DeployConfig {
            package_manager: Some("npm".to_string()),
            ..config("main")
        },
    );

    Pipeline::new(&runner, RELEASE_ID)
        .execute(&mut state)
        .unwrap();

    assert_eq!(runner.count("npm install"), 1);
    assert_eq!(runner.count("npm test:unit"), 1);
    assert!(!runner.ran("yarn"));
}

#[test]
fn dirty_tree_stops_before_anything_else() {
    let runner = FakeRunner::on_branch("feature").dirty(" M src/app.js\n");
    let mut state = run_state(Environment::Staging, config("main"));
    let mut pipeline = Pipeline::new(&runner, RELEASE_ID);

    let err = pipeline.execute(&mut state).unwrap_err();

    assert_eq!(err.code, ErrorCode::GitDirtyWorkingTree);
    assert_eq!(runner.commands(), vec!["git status --porcelain"]);
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert_eq!(
        pipeline.history(),
        &[
            PipelineState::Idle,
            PipelineState::ConfigLoaded,
            PipelineState::Failed
        ]
    );
    assert!(!runner.ran("yarn"));
    assert!(!runner.ran("ssh"));
    assert!(!runner.ran("rsync"));
}

#[test]
fn build_failure_never_touches_the_server() {
    let runner = FakeRunner::on_branch("main").failing(is_build);
    let mut state = run_state(Environment::Staging, config("main"));
    let mut pipeline = Pipeline::new(&runner, RELEASE_ID);

    let err = pipeline.execute(&mut state).unwrap_err();

    assert_eq!(err.code, ErrorCode::DeployBuildFailed);
    assert_eq!(err.command_stderr(), Some("boom"));
    assert_eq!(runner.commands().last().unwrap(), "yarn build -m staging");
    assert!(!runner.ran("ssh"));
    assert!(!runner.ran("rsync"));
    assert_eq!(pipeline.state(), PipelineState::Failed);
}

#[test]
fn failure_after_switching_branches_returns_to_original_branch() {
    let runner = FakeRunner::on_branch("feature").failing(is_build);
    let mut state = run_state(Environment::Staging, config("main"));

    let err = Pipeline::new(&runner, RELEASE_ID)
        .execute(&mut state)
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::DeployBuildFailed);
    let commands = runner.commands();
    assert_eq!(
        commands[commands.len() - 2..],
        ["yarn build -m staging", "git checkout feature"]
    );
    assert!(!runner.ran("ssh"));
}

#[test]
fn failed_checkout_is_not_undone() {
    let runner = FakeRunner::on_branch("feature")
        .failing(|c| c.program == "git" && c.args.first().map(String::as_str) == Some("checkout"));
    let mut state = run_state(Environment::Staging, config("main"));

    let err = Pipeline::new(&runner, RELEASE_ID)
        .execute(&mut state)
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::GitCommandFailed);
    assert_eq!(runner.count("git checkout main"), 1);
    assert_eq!(runner.count("git checkout feature"), 0);
}

#[test]
fn upstream_failure_asks_user_to_sync_and_skips_rebase() {
    let runner = FakeRunner::on_branch("main")
        .failing(|c| c.args.first().map(String::as_str) == Some("log"));
    let mut state = run_state(Environment::Staging, config("main"));

    let err = Pipeline::new(&runner, RELEASE_ID)
        .execute(&mut state)
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::GitCommandFailed);
    assert!(err.hints.iter().any(|h| h.message.contains("git push origin main")));
    assert_eq!(runner.count("git pull --rebase origin main"), 0);
}

#[test]
fn upload_failure_leaves_current_link_alone() {
    let runner = FakeRunner::on_branch("main").failing(|c| c.program == "rsync");
    let mut state = run_state(Environment::Staging, config("main"));

    let err = Pipeline::new(&runner, RELEASE_ID)
        .execute(&mut state)
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::DeployUploadFailed);
    let ssh_calls = runner
        .calls
        .borrow()
        .iter()
        .filter(|c| c.program == "ssh")
        .count();
    assert_eq!(ssh_calls, 1);
}

#[test]
fn remote_setup_failure_is_remote_command_failed() {
    let runner = FakeRunner::on_branch("main").failing(|c| c.program == "ssh");
    let mut state = run_state(Environment::Staging, config("main"));

    let err = Pipeline::new(&runner, RELEASE_ID)
        .execute(&mut state)
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::RemoteCommandFailed);
    assert!(!runner.ran("rsync"));
}

#[test]
fn empty_configuration_fails_before_remote_commands() {
    let runner = FakeRunner::on_branch("main");
    let mut state = run_state(Environment::Staging, DeployConfig::default());

    let err = Pipeline::new(&runner, RELEASE_ID)
        .execute(&mut state)
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::ConfigMissingKey);
    assert_eq!(err.details["key"], "host");
    assert!(runner.ran("yarn"));
    assert!(!runner.ran("ssh"));
    assert!(!runner.ran("rsync"));
}

#[test]
fn pipeline_runs_only_once() {
    let runner = FakeRunner::on_branch("main");
    let mut state = run_state(Environment::Staging, config("main"));
    let mut pipeline = Pipeline::new(&runner, RELEASE_ID);
    pipeline.execute(&mut state).unwrap();

    let err = pipeline.execute(&mut state).unwrap_err();

    assert_eq!(err.code, ErrorCode::InternalUnexpected);
}

#[test]
fn failed_pipeline_cannot_be_resumed() {
    let runner = FakeRunner::on_branch("main").failing(is_build);
    let mut state = run_state(Environment::Staging, config("main"));
    let mut pipeline = Pipeline::new(&runner, RELEASE_ID);
    pipeline.execute(&mut state).unwrap_err();
    let calls_after_failure = runner.commands().len();

    let err = pipeline.execute(&mut state).unwrap_err();

    assert_eq!(err.code, ErrorCode::InternalUnexpected);
    assert_eq!(runner.commands().len(), calls_after_failure);
    assert_eq!(pipeline.state(), PipelineState::Failed);
}

#[test]
fn dry_run_only_executes_read_only_commands() {
    let runner = FakeRunner::on_branch("feature");
    let dry_run = DryRunRunner::new(&runner);
    let mut state = run_state(Environment::Staging, config("main"));

    let report = Pipeline::new(&dry_run, RELEASE_ID)
        .execute(&mut state)
        .unwrap();

    assert_eq!(
        runner.commands(),
        vec![
            "git status --porcelain",
            "git rev-parse --abbrev-ref HEAD",
            "git log origin/main..HEAD",
        ]
    );
    assert_eq!(report.release.id, RELEASE_ID);
}
