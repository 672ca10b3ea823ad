//! Command-line front end: run one document tool and print its JSON response.
//!
//! ```sh
//! longan search_and_replace '{"filename": "report", "find_text": "2023", "replace_text": "2024"}'
//! longan --config longan.yaml merge_table_cells @merge.json
//! longan --list
//! ```
use clap::Parser;
use longan::config::Config;
use longan::store::LocalStore;
use longan::tools::{TOOL_NAMES, Tools};
use longan::{Error, telemetry};
use std::path::PathBuf;
use std::process::ExitCode;

/// Edit Word documents: footnotes, cross-run replace, table merges and protection
#[derive(Parser, Debug)]
#[command(name = "longan", version)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Base directory for relative document names (overrides the config)
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Print the available tools and exit
    #[arg(long)]
    list: bool,

    /// Tool to run
    #[arg(value_name = "TOOL", required_unless_present = "list")]
    tool: Option<String>,

    /// JSON arguments, or @FILE to read them from a file
    #[arg(value_name = "ARGS", default_value = "{}")]
    arguments: String,
}

fn load_arguments(raw: &str) -> Result<serde_json::Value, Error> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidArgument(format!("cannot read arguments from {path}: {e}")))?,
        None => raw.to_string(),
    };
    Ok(serde_json::from_str(&text)?)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.list {
        for name in TOOL_NAMES {
            println!("{name}");
        }
        return ExitCode::SUCCESS;
    }

    let mut config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        },
    };
    if let Some(root) = args.root {
        config.storage.root = Some(root);
    }
    telemetry::init(&config.logging);

    let Some(tool) = args.tool else {
        return ExitCode::from(2);
    };
    let arguments = match load_arguments(&args.arguments) {
        Ok(arguments) => arguments,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        },
    };

    let tools = Tools::new(LocalStore::new(config.storage.root.clone()), &config);
    let response = tools.call(&tool, arguments).await;
    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("error: cannot encode response: {e}");
            return ExitCode::FAILURE;
        },
    }
    if response.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
