//! Server entry point. Parses the command line, loads the JSON
//! configuration, and runs the event loop until the process is killed.

use std::process::ExitCode;

use clap::Parser;

use tiny_redis::{Config, Server};

#[derive(Parser)]
#[clap(name = "tiny-redis-server", version, about = "A Redis-compatible server")]
struct Cli {
    /// Path to a JSON configuration file.
    #[clap(short = 'c', long = "config")]
    config: Option<String>,
}

fn main() -> ExitCode {
    if tracing_subscriber::fmt::try_init().is_err() {
        eprintln!("tiny-redis-server: logging already initialized");
    }

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("tiny-redis-server: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    let server = match Server::new(&config) {
        Ok(server) => server,
        Err(err) => {
            eprintln!("tiny-redis-server: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = server.run() {
        eprintln!("tiny-redis-server: {err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
