//! Remote release steps: release directory, artifact upload, `current` symlink.
//!
//! No step undoes an earlier one. A failed upload leaves a partial release
//! directory behind while `current` keeps pointing at the previous release.

use std::path::Path;

use crate::config::DeployConfig;
use crate::error::{Error, ErrorCode, Result};
use crate::release::ReleaseIdentity;
use crate::ssh::SshTarget;
use crate::utils::command::{CommandRunner, Invocation};
use crate::utils::shell;

pub fn create_release_directory_invocation(
    target: &SshTarget,
    deploy_to: &str,
    release: &ReleaseIdentity,
) -> Invocation {
    target.command(&format!(
        "mkdir -p {} {}",
        shell::quote_remote_path(deploy_to),
        shell::quote_remote_path(&release.release_path)
    ))
}

pub fn upload_invocation(
    target: &SshTarget,
    dist_dir: &Path,
    release: &ReleaseIdentity,
) -> Invocation {
    let mut args = vec!["-rv".to_string()];
    if let Some(remote_shell) = target.rsync_shell() {
        args.push("-e".to_string());
        args.push(remote_shell);
    }
    args.push(dist_source(dist_dir));
    args.push(target.remote_spec(&release.release_path));
    Invocation::new("rsync", args)
}

pub fn symlink_invocation(target: &SshTarget, release: &ReleaseIdentity) -> Invocation {
    let current = shell::quote_remote_path(&release.current_path);
    target.command(&format!(
        "rm -rf {}; ln -s {} {}",
        current,
        shell::quote_remote_path(&release.release_path),
        current
    ))
}

/// Trailing slash so rsync copies the directory's contents, not the directory.
fn dist_source(dist_dir: &Path) -> String {
    let dir = dist_dir.to_string_lossy();
    format!("{}/", dir.trim_end_matches('/'))
}

fn remote_failed(message: impl Into<String>, cause: Error) -> Error {
    Error::step_failed(ErrorCode::RemoteCommandFailed, message, cause)
}

pub fn create_release_directory(
    runner: &dyn CommandRunner,
    target: &SshTarget,
    deploy_to: &str,
    release: &ReleaseIdentity,
) -> Result<()> {
    eprintln!("[deploy] Preparing release directory {}", release.release_path);
    runner
        .run(&create_release_directory_invocation(target, deploy_to, release))
        .map_err(|e| {
            remote_failed(
                format!("Failed to create {} on {}", release.release_path, target.host),
                e,
            )
        })?;
    Ok(())
}

pub fn upload(
    runner: &dyn CommandRunner,
    target: &SshTarget,
    dist_dir: &Path,
    release: &ReleaseIdentity,
) -> Result<()> {
    eprintln!(
        "[deploy] Uploading {} to {}",
        dist_dir.display(),
        target.remote_spec(&release.release_path)
    );
    runner
        .run(&upload_invocation(target, dist_dir, release))
        .map_err(|e| {
            Error::step_failed(
                ErrorCode::DeployUploadFailed,
                format!("Failed to upload build to {}", target.host),
                e,
            )
            .with_hint(format!(
                "Release directory {} may be incomplete; 'current' was not changed",
                release.release_path
            ))
        })?;
    Ok(())
}

pub fn update_current_link(
    runner: &dyn CommandRunner,
    target: &SshTarget,
    release: &ReleaseIdentity,
) -> Result<()> {
    eprintln!("[deploy] Pointing {} to {}", release.current_path, release.release_path);
    runner
        .run(&symlink_invocation(target, release))
        .map_err(|e| remote_failed(format!("Failed to update {}", release.current_path), e))?;
    Ok(())
}

/// Resolve the remote target from `config` and publish `dist_dir` as release
/// `release_id`: create the directory, upload, then repoint `current`.
pub fn deploy_release(
    runner: &dyn CommandRunner,
    config: &DeployConfig,
    dist_dir: &Path,
    release_id: &str,
) -> Result<ReleaseIdentity> {
    let target = SshTarget::from_config(config)?;
    let release = ReleaseIdentity::new(&config.deploy_to, release_id)?;
    let deploy_to = config.deploy_to.trim();

    create_release_directory(runner, &target, deploy_to, &release)?;
    upload(runner, &target, dist_dir, &release)?;
    update_current_link(runner, &target, &release)?;

    Ok(release)
}
