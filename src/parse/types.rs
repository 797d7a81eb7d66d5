//! Types produced by the template parser and consumed by the assembler.

use serde::{Deserialize, Serialize};

/// Trust and glob tagging of one fragment. Fixed when the fragment is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FragmentFlags {
    /// The whole argument should be glob-expanded.
    pub is_glob: bool,
    /// Glob metacharacters in this fragment must be escaped, not interpreted.
    pub escape_glob: bool,
    /// The argument names a filesystem path subject to sandboxing.
    pub is_file: bool,
    /// The text comes from the literal template, not from a value.
    pub is_trusted: bool,
}

/// One piece of an argument's text.
///
/// Flags are set while the fragment is built, either all at once with
/// [`Fragment::with_flags`] or through the consuming builders. A
/// [`FragmentChain`] only hands out shared references, so once a fragment
/// is in a chain its flags cannot change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    text: String,
    flags: FragmentFlags,
}

impl Fragment {
    /// A fragment with every flag given up front.
    pub fn with_flags(text: impl Into<String>, flags: FragmentFlags) -> Self {
        Self {
            text: text.into(),
            flags,
        }
    }

    /// A fragment of literal template text.
    pub fn trusted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            flags: FragmentFlags {
                is_trusted: true,
                ..FragmentFlags::default()
            },
        }
    }

    /// A fragment of interpolated, possibly hostile, text.
    pub fn untrusted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            flags: FragmentFlags::default(),
        }
    }

    /// Tag the fragment as part of a filesystem path.
    pub fn file(mut self) -> Self {
        self.flags.is_file = true;
        self
    }

    /// Tag the fragment as requesting glob expansion of its argument.
    pub fn glob(mut self) -> Self {
        self.flags.is_glob = true;
        self
    }

    /// Tag the fragment's metacharacters for escaping.
    pub fn escape_glob(mut self) -> Self {
        self.flags.escape_glob = true;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn flags(&self) -> FragmentFlags {
        self.flags
    }

    pub(crate) fn into_text(self) -> String {
        self.text
    }
}

/// The fragments of one argument, in order. Never empty.
///
/// A chain is consumed by value when merged, so it cannot be observed
/// or reused afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentChain {
    fragments: Vec<Fragment>,
}

impl FragmentChain {
    pub fn new(first: Fragment) -> Self {
        Self {
            fragments: vec![first],
        }
    }

    /// Build a chain from a list, or `None` if the list is empty.
    pub fn from_fragments(fragments: Vec<Fragment>) -> Option<Self> {
        if fragments.is_empty() {
            None
        } else {
            Some(Self { fragments })
        }
    }

    /// Append a fragment, builder style.
    pub fn with(mut self, fragment: Fragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    pub fn push(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Fragment> {
        self.fragments.iter()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Chains are never empty, so this is always false.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

impl IntoIterator for FragmentChain {
    type Item = Fragment;
    type IntoIter = std::vec::IntoIter<Fragment>;

    fn into_iter(self) -> Self::IntoIter {
        self.fragments.into_iter()
    }
}

impl<'a> IntoIterator for &'a FragmentChain {
    type Item = &'a Fragment;
    type IntoIter = std::slice::Iter<'a, Fragment>;

    fn into_iter(self) -> Self::IntoIter {
        self.fragments.iter()
    }
}

/// A standard stream of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdin,
    Stdout,
    Stderr,
}

impl Stream {
    pub fn as_str(self) -> &'static str {
        match self {
            Stream::Stdin => "stdin",
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }

    /// File descriptor number of the stream.
    pub fn fd(self) -> u8 {
        match self {
            Stream::Stdin => 0,
            Stream::Stdout => 1,
            Stream::Stderr => 2,
        }
    }
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a redirect sends its stream, without any target data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Another stream of the same task (`2>&1`).
    Stream(Stream),
    /// One end of a pipe to a neighboring task.
    Pipe,
    /// A file named by fragments.
    File,
}

/// One redirect as written in the template, before its target is merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectSpec {
    pub stream: Stream,
    pub target: TargetKind,
    pub append: bool,
    pub file: Option<FragmentChain>,
}

/// One command of a parsed template: its words and declared redirects.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedCommand {
    pub words: Vec<FragmentChain>,
    pub redirects: Vec<RedirectSpec>,
}

/// A parsed template: commands joined by pipes, left to right.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedTemplate {
    pub commands: Vec<ParsedCommand>,
}
