use serde::Serialize;

use crate::config::DeployConfig;
use crate::error::{Error, Result};
use crate::utils::command::Invocation;
use crate::utils::shell;

const DEFAULT_PORT: u16 = 22;

/// Where remote commands and uploads go: `user@host`, plus optional port and key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SshTarget {
    pub host: String,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
}

impl SshTarget {
    pub fn from_config(config: &DeployConfig) -> Result<Self> {
        let host = config.host.trim();
        if host.is_empty() {
            return Err(Error::config_missing_key("host", None));
        }
        let user = config.user.trim();
        if user.is_empty() {
            return Err(Error::config_missing_key("user", None));
        }

        let identity_file = match &config.identity_file {
            Some(path) if !path.trim().is_empty() => {
                let expanded = shellexpand::tilde(path.trim()).to_string();
                if !std::path::Path::new(&expanded).exists() {
                    return Err(Error::ssh_identity_file_not_found(host, expanded));
                }
                Some(expanded)
            }
            _ => None,
        };

        Ok(Self {
            host: host.to_string(),
            user: user.to_string(),
            port: config.port.filter(|p| *p != DEFAULT_PORT),
            identity_file,
        })
    }

    /// `user@host`
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// `user@host:path`, the rsync remote spec.
    pub fn remote_spec(&self, path: &str) -> String {
        format!("{}:{}", self.destination(), path)
    }

    fn connection_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        if let Some(port) = self.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }

        args
    }

    /// `ssh [-i key] [-p port] user@host <remote_command>`; the remote command is
    /// one argument and is interpreted by the remote shell.
    pub fn command(&self, remote_command: &str) -> Invocation {
        let mut args = self.connection_args();
        args.push(self.destination());
        args.push(remote_command.to_string());
        Invocation::new("ssh", args)
    }

    /// Value for `rsync -e` when the connection needs non-default options.
    pub fn rsync_shell(&self) -> Option<String> {
        let args = self.connection_args();
        if args.is_empty() {
            return None;
        }
        Some(format!("ssh {}", shell::quote_args(&args)))
    }
}
