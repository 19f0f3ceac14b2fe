//! Package-manager steps: dependency install, unit tests and the production build.

use crate::error::{Error, ErrorCode, Result};
use crate::utils::command::{CommandRunner, Invocation};

pub fn install_invocation(package_manager: &str) -> Invocation {
    Invocation::new(package_manager, ["install"])
}

pub fn unit_test_invocation(package_manager: &str) -> Invocation {
    Invocation::new(package_manager, ["test:unit"])
}

pub fn build_invocation(package_manager: &str, mode: &str) -> Invocation {
    Invocation::new(package_manager, ["build", "-m", mode])
}

pub fn install_dependencies(runner: &dyn CommandRunner, package_manager: &str) -> Result<()> {
    eprintln!("[build] Installing dependencies with {}", package_manager);
    runner
        .run(&install_invocation(package_manager))
        .map_err(|e| {
            Error::step_failed(
                ErrorCode::DeployInstallFailed,
                "Dependency installation failed",
                e,
            )
        })?;
    Ok(())
}

pub fn run_unit_tests(runner: &dyn CommandRunner, package_manager: &str) -> Result<()> {
    eprintln!("[build] Running unit tests");
    runner
        .run(&unit_test_invocation(package_manager))
        .map_err(|e| Error::step_failed(ErrorCode::DeployTestFailed, "Unit tests failed", e))?;
    Ok(())
}

/// Build for `mode` (`staging` or `production`).
pub fn build(runner: &dyn CommandRunner, package_manager: &str, mode: &str) -> Result<()> {
    eprintln!("[build] Building for {}", mode);
    runner
        .run(&build_invocation(package_manager, mode))
        .map_err(|e| {
            Error::step_failed(
                ErrorCode::DeployBuildFailed,
                format!("Build for {} failed", mode),
                e,
            )
        })?;
    Ok(())
}
