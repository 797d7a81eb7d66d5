//! Merging of one argument's fragments into its final text.
//!
//! The merge makes two passes over a chain. The first tallies aggregate
//! flags, the output length and the length of the trusted sandbox prefix.
//! The second writes the text into a buffer of exactly that length,
//! escaping glob metacharacters and backslashes inside `escape_glob`
//! fragments when the argument as a whole is a glob pattern. A value can
//! therefore neither add a wildcard nor cancel an escape.
//!
//! Every write is bounds-checked against the first pass. A disagreement
//! between the passes is reported as [`BuildError::InvariantViolation`]
//! instead of producing a truncated or overlong argument.

use log::{debug, trace};
use serde::Serialize;

use crate::error::BuildError;
use crate::parse::FragmentChain;

/// Metacharacters understood by the glob matcher.
pub const DEFAULT_GLOB_CHARS: &str = "?*[]";
/// Separator terminating a sandbox prefix.
pub const DEFAULT_SEPARATOR: char = '/';

/// One fully merged argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedArgument {
    /// Final argument text, escaped where required.
    pub text: String,
    /// Longest trusted, separator-terminated prefix of a file argument.
    ///
    /// `None` when the argument is not a file or is entirely trusted.
    /// `Some("")` when it is a file but no trusted boundary exists.
    pub sandbox_prefix: Option<String>,
    /// The argument should be glob-expanded before use.
    pub is_glob: bool,
}

/// Glob metacharacters and path separator used by a [`FragmentMerger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    glob_chars: Vec<char>,
    separator: char,
}

impl MergeOptions {
    /// Validate and build merge options.
    ///
    /// The separator may not be a glob metacharacter, and neither may be a
    /// backslash, which is reserved for escaping.
    pub fn new(glob_chars: &str, separator: char) -> Result<Self, BuildError> {
        if glob_chars.is_empty() {
            return Err(BuildError::InvalidOptions {
                reason: "glob character set is empty".into(),
            });
        }
        if glob_chars.contains(separator) {
            return Err(BuildError::InvalidOptions {
                reason: format!("separator {separator:?} is also a glob character"),
            });
        }
        if glob_chars.contains('\\') || separator == '\\' {
            return Err(BuildError::InvalidOptions {
                reason: "backslash is reserved for escaping".into(),
            });
        }
        let mut chars: Vec<char> = glob_chars.chars().collect();
        chars.sort_unstable();
        chars.dedup();
        Ok(Self {
            glob_chars: chars,
            separator,
        })
    }

    pub fn is_glob_char(&self, c: char) -> bool {
        self.glob_chars.contains(&c)
    }

    pub fn separator(&self) -> char {
        self.separator
    }
}

impl Default for MergeOptions {
    fn default() -> Self {
        let mut glob_chars: Vec<char> = DEFAULT_GLOB_CHARS.chars().collect();
        glob_chars.sort_unstable();
        Self {
            glob_chars,
            separator: DEFAULT_SEPARATOR,
        }
    }
}

/// Aggregates gathered by the first pass.
#[derive(Debug)]
struct Tally {
    is_glob: bool,
    is_file: bool,
    is_trusted: bool,
    /// Metacharacters and backslashes inside `escape_glob` fragments.
    escapes: usize,
    /// Sum of fragment lengths, without escapes.
    raw_len: usize,
    /// Confirmed trusted prefix length, including its final separator.
    sandbox_len: usize,
}

impl Tally {
    fn text_len(&self) -> usize {
        if self.is_glob {
            self.raw_len + self.escapes
        } else {
            self.raw_len
        }
    }

    fn wants_prefix(&self) -> bool {
        self.is_file && !self.is_trusted
    }
}

/// Output buffer that refuses to grow past the length computed in pass 1.
struct BoundedBuf {
    buf: String,
    limit: usize,
    what: &'static str,
}

impl BoundedBuf {
    fn with_exact(limit: usize, what: &'static str) -> Result<Self, BuildError> {
        let mut buf = String::new();
        buf.try_reserve_exact(limit)
            .map_err(|_| BuildError::OutOfMemory { requested: limit })?;
        Ok(Self { buf, limit, what })
    }

    fn remaining(&self) -> usize {
        self.limit - self.buf.len()
    }

    fn overrun(&self, extra: usize) -> BuildError {
        BuildError::InvariantViolation {
            what: self.what,
            expected: self.limit,
            actual: self.buf.len() + extra,
        }
    }

    fn push_str(&mut self, s: &str) -> Result<(), BuildError> {
        if s.len() > self.remaining() {
            return Err(self.overrun(s.len()));
        }
        self.buf.push_str(s);
        Ok(())
    }

    fn push(&mut self, c: char) -> Result<(), BuildError> {
        self.push_str(c.encode_utf8(&mut [0; 4]))
    }

    /// Copy as much of `s` as still fits.
    fn fill_from(&mut self, s: &str) -> Result<(), BuildError> {
        let take = self.remaining().min(s.len());
        let head = s.get(..take).ok_or_else(|| self.overrun(take))?;
        self.buf.push_str(head);
        Ok(())
    }

    fn finish(self) -> Result<String, BuildError> {
        if self.buf.len() != self.limit {
            return Err(BuildError::InvariantViolation {
                what: self.what,
                expected: self.limit,
                actual: self.buf.len(),
            });
        }
        Ok(self.buf)
    }
}

/// Merges fragment chains into [`MergedArgument`]s.
#[derive(Debug, Clone, Default)]
pub struct FragmentMerger {
    options: MergeOptions,
}

impl FragmentMerger {
    pub fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Merge one argument, consuming its chain.
    pub fn merge(&self, chain: FragmentChain) -> Result<MergedArgument, BuildError> {
        let tally = self.tally(&chain);
        debug!(
            "merge: glob={} file={} trusted={} escapes={} len={} sandbox_len={}",
            tally.is_glob,
            tally.is_file,
            tally.is_trusted,
            tally.escapes,
            tally.text_len(),
            tally.sandbox_len,
        );

        let mut text = BoundedBuf::with_exact(tally.text_len(), "argument text")?;
        let mut prefix = if tally.wants_prefix() {
            Some(BoundedBuf::with_exact(tally.sandbox_len, "sandbox prefix")?)
        } else {
            None
        };

        for fragment in chain {
            let escape = tally.is_glob && fragment.flags().escape_glob;
            let raw = fragment.into_text();
            if let Some(prefix) = prefix.as_mut() {
                prefix.fill_from(&raw)?;
            }
            if escape {
                self.write_escaped(&mut text, &raw)?;
            } else {
                text.push_str(&raw)?;
            }
        }

        let text = text.finish()?;
        let sandbox_prefix = prefix.map(BoundedBuf::finish).transpose()?;
        debug!("merge: sandbox_prefix={sandbox_prefix:?}");

        Ok(MergedArgument {
            text,
            sandbox_prefix,
            is_glob: tally.is_glob,
        })
    }

    fn tally(&self, chain: &FragmentChain) -> Tally {
        let mut tally = Tally {
            is_glob: false,
            is_file: false,
            is_trusted: true,
            escapes: 0,
            raw_len: 0,
            sandbox_len: 0,
        };
        let mut scanning = true;
        // Trusted bytes after the last separator, not yet confirmed.
        let mut candidate = 0;

        for fragment in chain {
            let flags = fragment.flags();
            let text = fragment.text();
            trace!(
                "fragment {text:?}: glob={} escape={} file={} trusted={}",
                flags.is_glob, flags.escape_glob, flags.is_file, flags.is_trusted,
            );

            tally.raw_len += text.len();
            if flags.escape_glob {
                tally.escapes += self.count_escapable(text);
            }
            tally.is_glob |= flags.is_glob;
            tally.is_file |= flags.is_file;
            tally.is_trusted &= flags.is_trusted;

            if !scanning {
                continue;
            }
            if !flags.is_trusted || flags.is_glob {
                scanning = false;
                continue;
            }
            let mut consumed = 0;
            for (idx, sep) in text.match_indices(self.options.separator) {
                let end = idx + sep.len();
                tally.sandbox_len += candidate + (end - consumed);
                candidate = 0;
                consumed = end;
            }
            candidate += text.len() - consumed;
        }

        tally
    }

    /// Characters the glob matcher would interpret: metacharacters and `\\`.
    fn needs_escape(&self, c: char) -> bool {
        c == '\\' || self.options.is_glob_char(c)
    }

    fn count_escapable(&self, text: &str) -> usize {
        text.chars().filter(|&c| self.needs_escape(c)).count()
    }

    fn write_escaped(&self, out: &mut BoundedBuf, text: &str) -> Result<(), BuildError> {
        let mut rest = text;
        while let Some(idx) = rest.find(|c: char| self.needs_escape(c)) {
            let (head, tail) = rest.split_at(idx);
            out.push_str(head)?;
            let mut chars = tail.chars();
            if let Some(meta) = chars.next() {
                out.push('\\')?;
                out.push(meta)?;
            }
            rest = chars.as_str();
        }
        out.push_str(rest)
    }
}

/// Merge one argument with the default options.
pub fn merge(chain: FragmentChain) -> Result<MergedArgument, BuildError> {
    FragmentMerger::default().merge(chain)
}
