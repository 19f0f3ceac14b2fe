use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DEFAULT_PACKAGE_MANAGER: &str = "yarn";

/// Per-environment deployment settings, read from `deploy/<environment>.json`.
///
/// Every key is optional: an absent file yields an all-empty configuration and
/// downstream steps decide what is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeployConfig {
    pub host: String,
    pub user: String,
    pub branch: String,
    pub deploy_to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_manager: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
}

impl DeployConfig {
    pub fn package_manager(&self) -> &str {
        self.package_manager
            .as_deref()
            .map(str::trim)
            .filter(|pm| !pm.is_empty())
            .unwrap_or(DEFAULT_PACKAGE_MANAGER)
    }

    /// Configured branch, or `None` when the key is blank.
    pub fn branch(&self) -> Option<&str> {
        Some(self.branch.trim()).filter(|b| !b.is_empty())
    }
}

/// Expand `~` and environment variables in a user-supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::full(path).map_or_else(|_| path.to_string(), |p| p.into_owned()))
}

/// Load configuration from `path`.
///
/// A missing file (or an empty path) is not an error and yields the default
/// configuration.
pub fn load(path: &Path) -> Result<DeployConfig> {
    if path.as_os_str().is_empty() {
        return Ok(DeployConfig::default());
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log_status!("config", "{} not found, using empty configuration", path.display());
            return Ok(DeployConfig::default());
        }
        Err(e) => {
            return Err(Error::config_read_failed(
                path.display().to_string(),
                e.to_string(),
            ))
        }
    };

    serde_json::from_str(&raw).map_err(|e| Error::config_invalid_json(path.display().to_string(), e))
}

/// Load configuration, reporting any read or parse error and continuing with
/// the empty configuration.
pub fn load_lenient(path: &Path) -> DeployConfig {
    load(path).unwrap_or_else(|err| {
        let reason = err
            .details
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        eprintln!("[config] {}: {} ({})", path.display(), err.message, reason);
        DeployConfig::default()
    })
}
