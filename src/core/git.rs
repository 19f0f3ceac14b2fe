//! Version-control steps of the deployment pipeline.

use crate::error::{Error, ErrorCode, Result};
use crate::utils::command::{CommandRunner, Invocation};

pub const REMOTE: &str = "origin";

fn git_failed(message: impl Into<String>, cause: Error) -> Error {
    Error::step_failed(ErrorCode::GitCommandFailed, message, cause)
}

pub fn status_invocation() -> Invocation {
    Invocation::query("git", ["status", "--porcelain"])
}

pub fn current_branch_invocation() -> Invocation {
    Invocation::query("git", ["rev-parse", "--abbrev-ref", "HEAD"])
}

pub fn checkout_invocation(branch: &str) -> Invocation {
    Invocation::new("git", ["checkout", branch])
}

pub fn upstream_invocation(branch: &str) -> Invocation {
    Invocation::query("git", ["log".to_string(), format!("{}/{}..HEAD", REMOTE, branch)])
}

pub fn rebase_invocation(branch: &str) -> Invocation {
    Invocation::new("git", ["pull", "--rebase", REMOTE, branch])
}

/// Fail unless `git status --porcelain` reports nothing.
pub fn ensure_clean_working_tree(runner: &dyn CommandRunner) -> Result<()> {
    let output = runner
        .run(&status_invocation())
        .map_err(|e| git_failed("Failed to read working tree status", e))?;

    let status = output.stdout_str();
    if !status.trim().is_empty() {
        return Err(Error::git_dirty_working_tree(status.trim_end()));
    }

    Ok(())
}

/// Name of the checked-out branch. A detached HEAD is an error since there is
/// no branch to come back to.
pub fn current_branch(runner: &dyn CommandRunner) -> Result<String> {
    let output = runner
        .run(&current_branch_invocation())
        .map_err(|e| git_failed("Failed to resolve the current branch", e))?;

    let branch = output.stdout_str().trim().to_string();
    if branch.is_empty() || branch == "HEAD" {
        return Err(
            Error::git_command_failed("HEAD is not on a branch")
                .with_hint("Check out the branch you want to deploy from and retry"),
        );
    }

    Ok(branch)
}

pub fn checkout(runner: &dyn CommandRunner, branch: &str) -> Result<()> {
    eprintln!("[git] Checking out {}", branch);
    runner
        .run(&checkout_invocation(branch))
        .map_err(|e| git_failed(format!("Failed to check out '{}'", branch), e))?;
    Ok(())
}

/// Verify `<remote>/<branch>` is reachable from HEAD. Local commits that are
/// not pushed yet are only reported.
pub fn check_upstream(runner: &dyn CommandRunner, branch: &str) -> Result<()> {
    eprintln!("[git] Checking {}/{} against HEAD", REMOTE, branch);
    let output = runner.run(&upstream_invocation(branch)).map_err(|e| {
        git_failed(
            format!("Branch '{}' is not in sync with {}/{}", branch, REMOTE, branch),
            e,
        )
        .with_hint(format!(
            "Sync your branch first: git fetch {} && git push {} {}",
            REMOTE, REMOTE, branch
        ))
    })?;

    let unpushed = output
        .stdout_str()
        .lines()
        .filter(|line| line.starts_with("commit "))
        .count();
    if unpushed > 0 {
        log_status!(
            "git",
            "{} local commit(s) not yet on {}/{}",
            unpushed,
            REMOTE,
            branch
        );
    }

    Ok(())
}

pub fn rebase_from_remote(runner: &dyn CommandRunner, branch: &str) -> Result<()> {
    eprintln!("[git] Rebasing onto {}/{}", REMOTE, branch);
    runner.run(&rebase_invocation(branch)).map_err(|e| {
        git_failed(format!("Failed to rebase onto {}/{}", REMOTE, branch), e)
            .with_hint("Resolve the rebase (git rebase --continue or --abort) and retry")
    })?;
    Ok(())
}
