use deployer::pipeline::Environment;

pub type CmdResult<T> = deployer::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

pub mod deploy;

impl crate::Commands {
    pub(crate) fn wants_json(&self) -> bool {
        match self {
            crate::Commands::Staging(args) | crate::Commands::Production(args) => args.json,
        }
    }
}

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $env:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $env, $global))
    };
}

pub(crate) fn run(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (deployer::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Staging(args) => dispatch!(args, Environment::Staging, global, deploy),
        crate::Commands::Production(args) => {
            dispatch!(args, Environment::Production, global, deploy)
        }
    }
}
