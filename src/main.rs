//! Tiercfg admin CLI
//!
//! Entry point for the `tiercfg` command-line tool. Every command opens the
//! journal named by the service configuration, performs one operation and
//! prints JSON on stdout.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use tiercfg::{
    logging, AuditEntry, Engine, EngineError, KeyPath, LoadedConfig, NodeType, PermissionGate,
    ServiceConfig, Value,
};
use tiercfg_protocol::ops::{
    AncestryResponse, DeleteNodeResponse, DiffVersionsResponse, ListHistoryResponse,
};

/// Exit code for failures a caller may retry (EX_TEMPFAIL)
const EXIT_RETRYABLE: i32 = 75;

#[derive(Parser)]
#[command(name = "tiercfg")]
#[command(about = "Hierarchical configuration for orgs, teams and sub-teams", version)]
struct Cli {
    /// Service config file (TOML), layered over ~/.config/tiercfg/config.toml
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Journal path, overriding the configured state_path
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Log filter (e.g. "debug", "tiercfg=trace")
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Node tree management
    Node {
        #[command(subcommand)]
        action: NodeCommands,
    },

    /// Read or write a node's own fragment
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Print the effective configuration of a node
    Effective {
        node_id: String,

        /// Mask secret-looking values
        #[arg(long)]
        redact: bool,
    },

    /// Show which ancestors set a key path
    Explain {
        node_id: String,

        /// Dotted key path, e.g. agents.planner.tools.web_search
        path: String,
    },

    /// Evaluate a capability gated at two scopes
    Check {
        node_id: String,

        /// Scope-wide flag path, e.g. tools.web_search
        #[arg(long)]
        coarse: String,

        /// Per-unit flag path, e.g. agents.planner.tools.web_search
        #[arg(long)]
        fine: String,

        /// Treat unset flags as disabled
        #[arg(long)]
        deny_unset: bool,
    },

    /// List audit entries, newest first
    History {
        node_id: String,

        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Show changes between two versions of a node's fragment
    Diff { node_id: String, from: u64, to: u64 },

    /// Restore an earlier version as a new version
    Rollback {
        node_id: String,
        version: u64,

        #[arg(long)]
        expect_version: Option<u64>,

        #[arg(long)]
        by: Option<String>,
    },

    /// Print the merged service configuration and its sources
    VerifyConfig,
}

#[derive(Subcommand)]
enum NodeCommands {
    /// Create an org, team or sub-team
    Create {
        node_id: String,

        #[arg(long)]
        org: String,

        /// org, team or subteam
        #[arg(long = "type", short = 't')]
        node_type: NodeType,

        #[arg(long, short = 'p')]
        parent: Option<String>,
    },

    /// Delete a node
    Delete {
        node_id: String,

        /// Delete the whole subtree
        #[arg(long)]
        cascade: bool,
    },

    /// Print the path from the org root to a node
    Path { node_id: String },

    /// List nodes
    List {
        #[arg(long)]
        org: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print a node's own fragment and version
    Show { node_id: String },

    /// Merge a JSON fragment into a node's fragment
    Patch {
        node_id: String,

        /// JSON document, @file, or - for stdin
        fragment: String,

        #[arg(long)]
        expect_version: Option<u64>,

        #[arg(long)]
        by: Option<String>,

        /// Re-read and retry on version conflicts
        #[arg(long, conflicts_with = "expect_version")]
        retry: bool,
    },

    /// Replace a node's fragment
    Replace {
        node_id: String,

        /// JSON document, @file, or - for stdin
        fragment: String,

        #[arg(long)]
        expect_version: Option<u64>,

        #[arg(long)]
        by: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let loaded = load_config(&cli);
    logging::init(&loaded.config.log.level);

    if let Commands::VerifyConfig = cli.command {
        print_json(&loaded);
        return;
    }

    let engine = match Engine::from_config(&loaded.config) {
        Ok(engine) => engine,
        Err(e) => fail(&e),
    };

    match cli.command {
        Commands::Node { action } => run_node(&engine, action),
        Commands::Config { action } => run_config(&engine, action),
        Commands::Effective { node_id, redact } => {
            let effective = engine.resolve(&node_id).unwrap_or_else(|e| fail(&e));
            print_json(&effective.to_response(redact));
        }
        Commands::Explain { node_id, path } => {
            let explanation = engine
                .explain(&node_id, &KeyPath::parse(&path))
                .unwrap_or_else(|e| fail(&e));
            print_json(&explanation.to_response());
        }
        Commands::Check {
            node_id,
            coarse,
            fine,
            deny_unset,
        } => {
            let mut gate = PermissionGate::new(KeyPath::parse(&coarse), KeyPath::parse(&fine));
            if deny_unset {
                gate = gate.deny_when_unset();
            }
            let effective = engine.resolve(&node_id).unwrap_or_else(|e| fail(&e));
            let permission = effective.permission(&gate);
            print_json(&permission);
            if !permission.allowed {
                process::exit(1);
            }
        }
        Commands::History { node_id, limit } => {
            let entries = engine.history(&node_id, limit).unwrap_or_else(|e| fail(&e));
            print_json(&ListHistoryResponse {
                node_id,
                entries: entries.iter().map(AuditEntry::to_info).collect(),
            });
        }
        Commands::Diff { node_id, from, to } => {
            let changes = engine
                .diff_versions(&node_id, from, to)
                .unwrap_or_else(|e| fail(&e));
            print_json(&DiffVersionsResponse {
                node_id,
                from,
                to,
                changes: changes.iter().map(tiercfg::store::change_info).collect(),
            });
        }
        Commands::Rollback {
            node_id,
            version,
            expect_version,
            by,
        } => {
            let entry = engine
                .rollback(&node_id, version, expect_version, by.as_deref())
                .unwrap_or_else(|e| fail(&e));
            print_json(&entry.to_put_response());
        }
        Commands::VerifyConfig => {}
    }
}

fn run_node(engine: &Engine, action: NodeCommands) {
    match action {
        NodeCommands::Create {
            node_id,
            org,
            node_type,
            parent,
        } => {
            let node = engine
                .create_node(&org, &node_id, parent.as_deref(), node_type)
                .unwrap_or_else(|e| fail(&e));
            print_json(&node.to_info());
        }
        NodeCommands::Delete { node_id, cascade } => {
            let deleted = engine
                .delete_node(&node_id, cascade)
                .unwrap_or_else(|e| fail(&e));
            print_json(&DeleteNodeResponse { deleted });
        }
        NodeCommands::Path { node_id } => {
            let path = engine.ancestry(&node_id).unwrap_or_else(|e| fail(&e));
            print_json(&AncestryResponse {
                path: path.iter().map(|n| n.to_info()).collect(),
            });
        }
        NodeCommands::List { org } => {
            let nodes = engine.list_nodes(org.as_deref()).unwrap_or_else(|e| fail(&e));
            let infos: Vec<_> = nodes.iter().map(|n| n.to_info()).collect();
            print_json(&infos);
        }
    }
}

fn run_config(engine: &Engine, action: ConfigCommands) {
    match action {
        ConfigCommands::Show { node_id } => {
            let record = engine.current_fragment(&node_id).unwrap_or_else(|e| fail(&e));
            print_json(&record.to_response());
        }
        ConfigCommands::Patch {
            node_id,
            fragment,
            expect_version,
            by,
            retry,
        } => {
            let fragment = read_fragment(&fragment);
            let entry = if retry {
                engine.patch_with_retry(&node_id, fragment, by.as_deref())
            } else {
                engine.patch_config(&node_id, fragment, expect_version, by.as_deref())
            }
            .unwrap_or_else(|e| fail(&e));
            print_json(&entry.to_put_response());
        }
        ConfigCommands::Replace {
            node_id,
            fragment,
            expect_version,
            by,
        } => {
            let fragment = read_fragment(&fragment);
            let entry = engine
                .replace_config(&node_id, fragment, expect_version, by.as_deref())
                .unwrap_or_else(|e| fail(&e));
            print_json(&entry.to_put_response());
        }
    }
}

fn load_config(cli: &Cli) -> LoadedConfig {
    let mut overrides = serde_json::Map::new();
    if let Some(state) = &cli.state {
        overrides.insert("state_path".to_string(), serde_json::json!(state));
    }
    if let Some(level) = &cli.log_level {
        overrides.insert("log".to_string(), serde_json::json!({ "level": level }));
    }
    let overrides = (!overrides.is_empty()).then_some(serde_json::Value::Object(overrides));

    match ServiceConfig::load_default(cli.config.as_deref(), overrides) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    }
}

/// Parse a fragment argument: inline JSON, `@path`, or `-` for stdin.
fn read_fragment(arg: &str) -> Value {
    let text = if arg == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map(|_| buf)
    } else if let Some(path) = arg.strip_prefix('@') {
        fs::read_to_string(path)
    } else {
        Ok(arg.to_string())
    };

    let text = text.unwrap_or_else(|e| {
        eprintln!("Error reading fragment: {}", e);
        process::exit(1);
    });
    let json: serde_json::Value = serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("Fragment is not valid JSON: {}", e);
        process::exit(1);
    });
    Value::from_json(json).unwrap_or_else(|e| fail(&EngineError::from(e)))
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn fail(err: &EngineError) -> ! {
    eprintln!("Error: {}", err);
    if err.is_retryable() {
        process::exit(EXIT_RETRYABLE);
    }
    process::exit(1);
}
