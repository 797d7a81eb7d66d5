//! Redirect construction, chaining, and pipe wiring between tasks.

use log::debug;
use serde::Serialize;

use crate::assemble::merge::FragmentMerger;
use crate::error::BuildError;
use crate::parse::{FragmentChain, RedirectSpec, Stream, TargetKind};
use crate::task::Task;

/// Resolved destination of a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Another stream of the same task.
    Stream(Stream),
    /// One end of a pipe to a neighboring task.
    Pipe,
    /// A concrete file.
    File {
        text: String,
        sandbox_prefix: Option<String>,
        append: bool,
    },
}

/// One I/O redirection of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub stream: Stream,
    pub target: Target,
}

impl Redirect {
    /// A pipe end on `stream`, with no file.
    pub fn pipe(stream: Stream) -> Self {
        Self {
            stream,
            target: Target::Pipe,
        }
    }

    /// Whether a file target is opened for appending. False for other targets.
    pub fn append(&self) -> bool {
        matches!(self.target, Target::File { append: true, .. })
    }

    /// Path of a file target.
    pub fn file_text(&self) -> Option<&str> {
        match &self.target {
            Target::File { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn sandbox_prefix(&self) -> Option<&str> {
        match &self.target {
            Target::File { sandbox_prefix, .. } => sandbox_prefix.as_deref(),
            _ => None,
        }
    }
}

impl std::fmt::Display for Redirect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fd = self.stream.fd();
        match &self.target {
            Target::Stream(to) => write!(f, "{fd}>&{}", to.fd()),
            Target::Pipe if self.stream == Stream::Stdin => write!(f, "{fd}<|"),
            Target::Pipe => write!(f, "{fd}>|"),
            Target::File { text, append, .. } => {
                let op = match (self.stream, append) {
                    (Stream::Stdin, _) => "<",
                    (_, true) => ">>",
                    (_, false) => ">",
                };
                let quoted = shlex::try_quote(text).unwrap_or_else(|_| text.as_str().into());
                write!(f, "{fd}{op}{quoted}")
            }
        }
    }
}

/// Ordered redirects of one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RedirectChain {
    redirects: Vec<Redirect>,
}

impl RedirectChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, redirect: Redirect) {
        self.redirects.push(redirect);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Redirect> {
        self.redirects.iter()
    }

    pub fn len(&self) -> usize {
        self.redirects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.redirects.is_empty()
    }
}

impl From<Redirect> for RedirectChain {
    fn from(redirect: Redirect) -> Self {
        Self {
            redirects: vec![redirect],
        }
    }
}

impl From<Vec<Redirect>> for RedirectChain {
    fn from(redirects: Vec<Redirect>) -> Self {
        Self { redirects }
    }
}

impl IntoIterator for RedirectChain {
    type Item = Redirect;
    type IntoIter = std::vec::IntoIter<Redirect>;

    fn into_iter(self) -> Self::IntoIter {
        self.redirects.into_iter()
    }
}

impl<'a> IntoIterator for &'a RedirectChain {
    type Item = &'a Redirect;
    type IntoIter = std::slice::Iter<'a, Redirect>;

    fn into_iter(self) -> Self::IntoIter {
        self.redirects.iter()
    }
}

/// Build one redirect, merging its file fragments if it has any.
///
/// A file target must resolve to exactly one concrete path: a glob-intended
/// target is rejected with [`BuildError::UnsupportedGlobRedirect`].
/// `append` is only recorded for file targets.
pub fn create(
    merger: &FragmentMerger,
    stream: Stream,
    target: TargetKind,
    append: bool,
    file_fragments: Option<FragmentChain>,
) -> Result<Redirect, BuildError> {
    debug!(
        "redirect: stream={stream} target={target:?} append={append} file={}",
        file_fragments.is_some()
    );
    let target = match (target, file_fragments) {
        (TargetKind::File, Some(fragments)) => {
            let merged = merger.merge(fragments)?;
            if merged.is_glob {
                return Err(BuildError::UnsupportedGlobRedirect {
                    target: merged.text,
                });
            }
            Target::File {
                text: merged.text,
                sandbox_prefix: merged.sandbox_prefix,
                append,
            }
        }
        (TargetKind::File, None) => return Err(BuildError::MissingRedirectFile { stream }),
        (_, Some(_)) => return Err(BuildError::UnexpectedRedirectFile { stream }),
        (TargetKind::Pipe, None) => Target::Pipe,
        (TargetKind::Stream(to), None) => Target::Stream(to),
    };
    Ok(Redirect { stream, target })
}

/// Build a redirect from its parsed description.
pub fn from_spec(merger: &FragmentMerger, spec: RedirectSpec) -> Result<Redirect, BuildError> {
    create(merger, spec.stream, spec.target, spec.append, spec.file)
}

/// Concatenate `right` after the tail of `left`.
///
/// An empty `left` yields `right` unchanged.
pub fn merge_chains(mut left: RedirectChain, right: RedirectChain) -> RedirectChain {
    if left.is_empty() {
        return right;
    }
    left.redirects.extend(right);
    left
}

/// Attach `chain` after the task's existing redirects.
pub fn append<T: Task>(task: &mut T, chain: RedirectChain) {
    task.add_redirects(chain);
}

/// Connect `left`'s stdout to `right`'s stdin.
pub fn pipe<T: Task>(left: &mut T, right: &mut T) {
    append(left, Redirect::pipe(Stream::Stdout).into());
    append(right, Redirect::pipe(Stream::Stdin).into());
}
