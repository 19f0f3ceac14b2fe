use clap::{Parser, Subcommand};

use commands::{deploy, GlobalArgs};

mod commands;
mod output;

/// Application metadata handed to the argument parser. Built once, never mutated.
struct AppInfo {
    name: &'static str,
    about: &'static str,
    version: &'static str,
    authors: &'static str,
}

static APP: AppInfo = AppInfo {
    name: env!("CARGO_PKG_NAME"),
    about: "Deploy project into hosting server",
    version: env!("CARGO_PKG_VERSION"),
    authors: env!("CARGO_PKG_AUTHORS"),
};

#[derive(Parser)]
#[command(name = APP.name)]
#[command(version = APP.version)]
#[command(author = APP.authors)]
#[command(about = APP.about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy on staging server
    Staging(deploy::DeployArgs),
    /// Deploy on production server
    Production(deploy::DeployArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs {};

    let json = cli.command.wants_json();
    let (result, exit_code) = commands::run(cli.command, &global);

    if json {
        if let Err(err) = output::print_json_result(result) {
            eprintln!("Error: {}", err);
            return std::process::ExitCode::from(1);
        }
    } else {
        output::print_human_result(result);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
