use clap::Args;
use serde::Serialize;

use deployer::config::expand_path;
use deployer::pipeline::{self, DeployOptions, Environment, RunReport, DEFAULT_DIST_DIR};

use super::CmdResult;

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Load configuration from FILE (default: deploy/<environment>.json)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<String>,

    /// Distribution DIRECTORY to upload
    #[arg(short = 'd', long = "dist", value_name = "DIRECTORY", default_value = DEFAULT_DIST_DIR)]
    pub dist: String,

    /// Print commands that change anything instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Print a JSON response instead of human-readable output
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOutput {
    pub command: String,
    #[serde(flatten)]
    pub report: RunReport,
}

pub fn run(
    args: DeployArgs,
    environment: Environment,
    _global: &crate::commands::GlobalArgs,
) -> CmdResult<DeployOutput> {
    if args.dist.trim().is_empty() {
        return Err(deployer::Error::validation_invalid_argument(
            "dist",
            "Distribution directory cannot be empty",
        ));
    }

    let options = DeployOptions {
        environment,
        config_path: args
            .config
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(expand_path),
        dist_dir: expand_path(args.dist.trim()),
        dry_run: args.dry_run,
    };

    let report = pipeline::run(&options)?;

    Ok((
        DeployOutput {
            command: format!("deploy.{}", environment.as_str()),
            report,
        },
        0,
    ))
}
