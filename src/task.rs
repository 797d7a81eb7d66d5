//! The task collaborator: the object assembled arguments and redirects land in.
//!
//! The assembler only ever creates a task and appends to it. Execution,
//! glob expansion and file access happen downstream, against whatever
//! implements [`Task`].

use serde::Serialize;

use crate::assemble::redirect::merge_chains;
use crate::assemble::{MergedArgument, RedirectChain, Target};
use crate::error::SandboxViolation;
use crate::sandbox::check_confined;

/// Receiver of assembled arguments and redirects.
pub trait Task {
    /// A task with no arguments and no redirects.
    fn create() -> Self
    where
        Self: Sized;

    /// Append the next positional argument.
    fn add_argument(&mut self, argument: MergedArgument);

    /// Append redirects after any already installed.
    fn add_redirects(&mut self, redirects: RedirectChain);
}

/// In-memory task: ordered arguments plus ordered redirects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandTask {
    arguments: Vec<MergedArgument>,
    redirects: RedirectChain,
}

impl CommandTask {
    pub fn arguments(&self) -> &[MergedArgument] {
        &self.arguments
    }

    pub fn redirects(&self) -> &RedirectChain {
        &self.redirects
    }

    /// The program to run, i.e. the first argument.
    pub fn program(&self) -> Option<&str> {
        self.arguments.first().map(|a| a.text.as_str())
    }

    pub fn argv(&self) -> Vec<&str> {
        self.arguments.iter().map(|a| a.text.as_str()).collect()
    }

    /// Shell-quoted one-line rendering, for logs only.
    ///
    /// Pipe ends are omitted; a pipeline renders its tasks joined by `|`.
    pub fn display_line(&self) -> String {
        let argv = self.argv();
        let mut line =
            shlex::try_join(argv.iter().copied()).unwrap_or_else(|_| format!("{argv:?}"));
        for redirect in &self.redirects {
            if matches!(redirect.target, Target::File { .. } | Target::Stream(_)) {
                line.push(' ');
                line.push_str(&redirect.to_string());
            }
        }
        line
    }

    /// Lexically check every non-glob argument and file redirect against
    /// its sandbox prefix, splitting paths on `separator`.
    pub fn check_sandbox(&self, separator: char) -> Result<(), SandboxViolation> {
        for argument in &self.arguments {
            argument.check_confined(separator)?;
        }
        for redirect in &self.redirects {
            if let (Some(prefix), Some(text)) = (redirect.sandbox_prefix(), redirect.file_text()) {
                check_confined(prefix, text, separator)?;
            }
        }
        Ok(())
    }
}

impl Task for CommandTask {
    fn create() -> Self {
        Self::default()
    }

    fn add_argument(&mut self, argument: MergedArgument) {
        self.arguments.push(argument);
    }

    fn add_redirects(&mut self, redirects: RedirectChain) {
        let existing = std::mem::take(&mut self.redirects);
        self.redirects = merge_chains(existing, redirects);
    }
}
