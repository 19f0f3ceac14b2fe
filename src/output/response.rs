//! CLI response formatting and output.
//!
//! Provides the JSON envelope, human-readable printing and exit code mapping.

use deployer::error::Hint;
use deployer::shell;
use deployer::{Error, ErrorCode, Result};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct CliResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CliError>,
}

#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: String,
    pub message: String,
    pub details: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<Hint>>,
}

impl<T: Serialize> CliResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize response".to_string()))
        })
    }
}

impl CliResponse<()> {
    pub fn from_error(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(CliError {
                code: err.code.as_str().to_string(),
                message: err.message.clone(),
                details: err.details.clone(),
                hints: if err.hints.is_empty() {
                    None
                } else {
                    Some(err.hints.clone())
                },
            }),
        }
    }
}

fn print_response<T: Serialize>(response: &CliResponse<T>) -> Result<()> {
    use std::io::{self, Write};

    let payload = response.to_json()?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", payload) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            return Ok(()); // Exit gracefully on SIGPIPE
        }
        return Err(Error::internal_io(
            e.to_string(),
            Some("write stdout".to_string()),
        ));
    }
    Ok(())
}

pub fn print_json_result(result: Result<Value>) -> Result<()> {
    match result {
        Ok(data) => print_response(&CliResponse::success(data)),
        Err(err) => print_response(&CliResponse::<()>::from_error(&err)),
    }
}

/// Success line on stdout, or the error with the failing command's stderr and
/// hints on stderr.
pub fn print_human_result(result: Result<Value>) {
    match result {
        Ok(data) => println!("{}", success_message(&data)),
        Err(err) => eprint!("{}", failure_message(&err)),
    }
}

pub(crate) fn success_message(data: &Value) -> String {
    if data.get("dryRun").and_then(Value::as_bool).unwrap_or(false) {
        return "Dry run complete, nothing was changed".to_string();
    }

    match data
        .pointer("/release/releasePath")
        .and_then(Value::as_str)
    {
        Some(path) => format!("Deployment done: {}", path),
        None => "Deployment done".to_string(),
    }
}

pub(crate) fn failure_message(err: &Error) -> String {
    let mut out = format!("Error: {}\n", err.message);

    if let Some(program) = err.details.get("program").and_then(Value::as_str) {
        let args: Vec<String> = err
            .details
            .get("args")
            .and_then(Value::as_array)
            .map(|args| {
                args.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let mut command = shell::quote_arg(program);
        if !args.is_empty() {
            command.push(' ');
            command.push_str(&shell::quote_args(&args));
        }
        match err.details.get("exitCode").and_then(Value::as_i64) {
            Some(code) => out.push_str(&format!("  command: {} (exit {})\n", command, code)),
            None => out.push_str(&format!("  command: {}\n", command)),
        }
    }

    if let Some(stderr) = err.command_stderr() {
        for line in stderr.trim_end().lines() {
            out.push_str(&format!("  | {}\n", line));
        }
    } else if let Some(reason) = err.details.get("error").and_then(Value::as_str) {
        out.push_str(&format!("  {}\n", reason));
    }

    for hint in &err.hints {
        out.push_str(&format!("Hint: {}\n", hint.message));
    }

    out
}

pub fn map_cmd_result_to_json<T: Serialize>(result: Result<(T, i32)>) -> (Result<Value>, i32) {
    match result {
        Ok((data, exit_code)) => match serde_json::to_value(data) {
            Ok(value) => (Ok(value), exit_code),
            Err(err) => (
                Err(Error::internal_json(
                    err.to_string(),
                    Some("serialize response".to_string()),
                )),
                1,
            ),
        },
        Err(err) => {
            let exit_code = exit_code_for_error(err.code);
            (Err(err), exit_code)
        }
    }
}

fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ValidationInvalidArgument => 2,

        ErrorCode::ConfigMissingKey
        | ErrorCode::ConfigInvalidJson
        | ErrorCode::ConfigReadFailed
        | ErrorCode::CommandSpawnFailed
        | ErrorCode::CommandFailed
        | ErrorCode::GitDirtyWorkingTree
        | ErrorCode::GitCommandFailed
        | ErrorCode::DeployInstallFailed
        | ErrorCode::DeployTestFailed
        | ErrorCode::DeployBuildFailed
        | ErrorCode::DeployUploadFailed
        | ErrorCode::SshIdentityFileNotFound
        | ErrorCode::RemoteCommandFailed
        | ErrorCode::InternalIoError
        | ErrorCode::InternalJsonError
        | ErrorCode::InternalUnexpected => 1,
    }
}
