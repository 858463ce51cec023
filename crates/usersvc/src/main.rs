//! usersvc - entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use usersvc_config::{AppConfig, ConfigError, ConfigLoader, ENV_PREFIX};

/// Default configuration file, loaded when present.
const DEFAULT_CONFIG_FILE: &str = "usersvc.toml";

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
}

enum Command {
    Run(Args),
    Help,
    Version,
}

fn parse_args() -> Result<Command, String> {
    let mut args = std::env::args().skip(1);
    let mut config = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => match args.next() {
                Some(path) => config = Some(PathBuf::from(path)),
                None => return Err(format!("{arg} requires a path")),
            },
            "--help" | "-h" => return Ok(Command::Help),
            "--version" | "-v" => return Ok(Command::Version),
            other => return Err(format!("Unknown argument: {other}")),
        }
    }

    Ok(Command::Run(Args { config }))
}

fn print_help() {
    println!(
        r"usersvc - users CRUD service

USAGE:
    usersvc [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
    -h, --help             Print help information
    -v, --version          Print version information

Without --config, ./{DEFAULT_CONFIG_FILE} is loaded if it exists.

ENVIRONMENT VARIABLES (a .env file is read first):
    {ENV_PREFIX}__SERVER__ADDRESS               Bind address (default: localhost:4000)
    {ENV_PREFIX}__SERVER__HANDLER_TIMEOUT_SECS  Per-request handler timeout (default: 4)
    {ENV_PREFIX}__SERVER__READ_TIMEOUT_SECS     Request read timeout (default: 5)
    {ENV_PREFIX}__SERVER__WRITE_TIMEOUT_SECS    Response write timeout (default: 10)
    {ENV_PREFIX}__SERVER__IDLE_TIMEOUT_SECS     Keep-alive idle timeout (default: 20)
    {ENV_PREFIX}__SERVER__SHUTDOWN_GRACE_SECS   Graceful shutdown grace period (default: 5)
    {ENV_PREFIX}__LOGGING__LEVEL                Log filter (default: info)
    {ENV_PREFIX}__LOGGING__FORMAT               json or pretty (default: json)
"
    );
}

fn load_config(args: &Args) -> Result<AppConfig, ConfigError> {
    let loader = ConfigLoader::new().with_dotenv()?;
    let loader = match &args.config {
        Some(path) => loader.with_file(path)?,
        None => loader.with_optional_file(DEFAULT_CONFIG_FILE)?,
    };
    loader.with_env_prefix(ENV_PREFIX).load()
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(Command::Run(args)) => args,
        Ok(Command::Help) => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Ok(Command::Version) => {
            println!("usersvc {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("{message}");
            eprintln!("Use --help for usage information");
            return ExitCode::FAILURE;
        }
    };

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = usersvc_telemetry::init_logging(&usersvc::log_config(&config.logging)) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match usersvc::run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "usersvc exited with an error");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
