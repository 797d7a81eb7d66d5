//! argforge: trust-aware argument synthesis for safe process construction.
//!
//! A command is written as a template of literal, trusted text with
//! interpolated values. Each argument is assembled from fragments tagged
//! with their trust, glob and file-path status, then merged so that:
//!
//! - glob metacharacters and backslashes coming from values are escaped
//!   whenever the argument is a glob pattern, so a value can never inject
//!   a wildcard;
//! - a file-path argument built partly from values carries its *sandbox
//!   prefix*, the longest leading directory made only of trusted text,
//!   which a file layer can use to confine access.
//!
//! ```
//! let tasks = argforge::assemble("cat /srv/data/%p", &["report.csv".into()])?;
//! let path = &tasks[0].arguments()[1];
//! assert_eq!(path.text, "/srv/data/report.csv");
//! assert_eq!(path.sandbox_prefix.as_deref(), Some("/srv/data/"));
//! # Ok::<(), argforge::Error>(())
//! ```
//!
//! # Architecture
//!
//! - **[`parse`]**: fragment types and the template parser.
//! - **[`assemble`]**: fragment merging, redirects, command and pipeline assembly.
//! - **[`task`]**: the task interface assembled commands are written into.
//! - **[`sandbox`]**: lexical confinement of paths to their sandbox prefix.
//! - **[`config`]**: embedded defaults plus user overlay.
//! - **[`logging`]**: terminal logging and the assembly audit log.

/// Fragment merging, redirect building, command and pipeline assembly.
pub mod assemble;
/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// Error types for every stage.
pub mod error;
/// simplelog setup and audit records.
pub mod logging;
/// Fragment types and the command template parser.
pub mod parse;
/// Lexical sandbox-prefix confinement checks.
pub mod sandbox;
/// The task collaborator trait and its in-memory implementation.
pub mod task;

pub use assemble::{FragmentMerger, MergeOptions, MergedArgument};
pub use error::{BuildError, Error, SandboxViolation, TemplateError};
pub use parse::{Fragment, FragmentChain, Stream, Value};
pub use task::{CommandTask, Task};

/// Parse a template and assemble its pipeline with default options.
///
/// This is the main entry point for tests and simple usage.
/// For configured glob characters or separators, build a
/// [`FragmentMerger`] and call [`parse::parse_with`] and
/// [`assemble::build_pipeline`] directly.
pub fn assemble(template: &str, values: &[Value]) -> Result<Vec<CommandTask>, Error> {
    let merger = FragmentMerger::default();
    assemble_with(&merger, template, values)
}

/// Parse a template and assemble its pipeline with `merger`'s options.
pub fn assemble_with(
    merger: &FragmentMerger,
    template: &str,
    values: &[Value],
) -> Result<Vec<CommandTask>, Error> {
    let parsed = parse::parse_with(template, values, merger.options())?;
    Ok(assemble::build_pipeline(merger, parsed)?)
}
