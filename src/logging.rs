use std::fs::File;
use std::path::Path;

use log::{LevelFilter, info, warn};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

use crate::task::CommandTask;

/// Log target for audit records of assembled commands.
pub const AUDIT_TARGET: &str = "argforge::audit";

/// Install the terminal logger on stderr and, if `audit_log` is given, an
/// appending file logger that only records the audit target.
/// Best-effort: a logger that cannot be set up is skipped (logging must
/// never block assembly).
pub fn init(level: LevelFilter, audit_log: Option<&Path>) {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(file) = audit_log.and_then(open_audit_file) {
        let config = ConfigBuilder::new()
            .add_filter_allow_str(AUDIT_TARGET)
            .set_time_format_rfc3339()
            .build();
        loggers.push(WriteLogger::new(LevelFilter::Info, config, file));
    }
    let _ = CombinedLogger::init(loggers);
}

fn open_audit_file(path: &Path) -> Option<File> {
    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .ok()
}

/// One-line rendering of a pipeline.
pub fn pipeline_line(tasks: &[CommandTask]) -> String {
    tasks
        .iter()
        .map(CommandTask::display_line)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Record an assembled pipeline with its sandbox prefixes.
pub fn log_assembly(template: &str, tasks: &[CommandTask]) {
    let prefixes: Vec<&str> = tasks
        .iter()
        .flat_map(|t| t.arguments())
        .filter_map(|a| a.sandbox_prefix.as_deref())
        .collect();
    info!(
        target: AUDIT_TARGET,
        "assembled\t{}\t{}\tsandbox={prefixes:?}",
        truncate(template),
        pipeline_line(tasks).replace('\n', "\\n"),
    );
}

/// Record a template that failed to assemble.
pub fn log_rejection(template: &str, error: &crate::Error) {
    warn!(
        target: AUDIT_TARGET,
        "rejected\t{}\t{error}",
        truncate(template),
    );
}

fn truncate(template: &str) -> String {
    template
        .chars()
        .take(200)
        .collect::<String>()
        .replace('\n', "\\n")
}
