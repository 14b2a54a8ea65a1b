//! Tiercfg RPC server entrypoint
//!
//! Usage: tiercfg-server rpc [--config <path>] [--state <path>]
//!
//! Opens the engine named by the service configuration, then answers JSON
//! requests read line by line from stdin until EOF.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tiercfg::{logging, Engine, ServiceConfig};
use tiercfg_server::{RpcHandler, ServerConfig};

const USAGE: &str = "Usage: tiercfg-server rpc [--config <path>] [--state <path>]";

struct Args {
    config: Option<PathBuf>,
    state: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Option<Args> {
    let (command, rest) = args.split_first()?;
    if command != "rpc" {
        return None;
    }

    let mut parsed = Args {
        config: None,
        state: None,
    };
    let mut iter = rest.iter();
    while let Some(flag) = iter.next() {
        let value = PathBuf::from(iter.next()?);
        match flag.as_str() {
            "--config" | "-c" => parsed.config = Some(value),
            "--state" => parsed.state = Some(value),
            _ => return None,
        }
    }
    Some(parsed)
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(args) = parse_args(&args) else {
        eprintln!("{}", USAGE);
        eprintln!();
        eprintln!("Runs the RPC handler, reading JSON lines from stdin and writing to stdout.");
        return ExitCode::FAILURE;
    };

    let overrides = args
        .state
        .as_ref()
        .map(|state| serde_json::json!({ "state_path": state }));
    let loaded = match ServiceConfig::load_default(args.config.as_deref(), overrides) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init(&loaded.config.log.level);

    let engine = match Engine::from_config(&loaded.config) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!(error = %e, "failed to open engine");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        durable = engine.is_durable(),
        sources = loaded.sources.len(),
        "serving rpc on stdin"
    );

    let handler = RpcHandler::new(ServerConfig::default(), Arc::new(engine));
    if let Err(e) = handler.run() {
        tracing::error!(error = %e, "rpc handler failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
