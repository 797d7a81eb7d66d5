//! argforge: assemble a command template into tasks.
//!
//! Reads JSON from stdin, writes the assembled pipeline as JSON to stdout.
//!
//! Input:  `{"template": "cat /srv/%p | wc -l", "values": ["notes.txt"]}`
//! Output: `{"tasks": [...]}` or `{"error": "..."}` (exit status 1)
//!
//! Flags:
//!   --dump-config   print the effective configuration as TOML and exit
//!   --verbose, -v   log at debug level on stderr

use std::io::Read;

use log::LevelFilter;
use serde::Deserialize;

use argforge::config::Config;
use argforge::{CommandTask, Error, FragmentMerger, Value, logging};

#[derive(Deserialize)]
struct Request {
    template: String,
    #[serde(default)]
    values: Vec<Value>,
}

fn usage() -> ! {
    eprintln!("usage: argforge [--dump-config] [--verbose] < request.json");
    std::process::exit(2);
}

fn main() {
    let mut dump_config = false;
    let mut verbose = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--dump-config" => dump_config = true,
            "--verbose" | "-v" => verbose = true,
            _ => usage(),
        }
    }

    let config = Config::load();

    if dump_config {
        match toml::to_string_pretty(&config) {
            Ok(text) => print!("{text}"),
            Err(e) => {
                eprintln!("argforge: cannot render config: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let level = if verbose {
        LevelFilter::Debug
    } else {
        config.level_filter().unwrap_or_else(|e| {
            eprintln!("argforge: {e}");
            LevelFilter::Warn
        })
    };
    logging::init(level, config.audit_log_path().as_deref());

    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() {
        eprintln!("failed to read stdin");
        std::process::exit(1);
    }

    let request: Request = match serde_json::from_str(&input) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("JSON parse error: {e}");
            std::process::exit(1);
        }
    };

    match run(&config, &request) {
        Ok(tasks) => {
            logging::log_assembly(&request.template, &tasks);
            println!("{}", serde_json::json!({ "tasks": tasks }));
        }
        Err(e) => {
            logging::log_rejection(&request.template, &e);
            println!("{}", serde_json::json!({ "error": e.to_string() }));
            std::process::exit(1);
        }
    }
}

/// Assemble the request and refuse any path that escapes its sandbox prefix.
fn run(config: &Config, request: &Request) -> Result<Vec<CommandTask>, Error> {
    let merger = FragmentMerger::new(config.merge_options()?);
    let tasks = argforge::assemble_with(&merger, &request.template, &request.values)?;
    let separator = merger.options().separator();
    for task in &tasks {
        task.check_sandbox(separator)?;
    }
    Ok(tasks)
}
