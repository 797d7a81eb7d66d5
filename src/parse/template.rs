//! Command template parser.
//!
//! A template is literal, trusted text with `%` conversions that pull in
//! positional values:
//!
//! | conversion | value   | tagging                         |
//! |------------|---------|---------------------------------|
//! | `%s`       | text    | untrusted, escaped              |
//! | `%p`       | text    | untrusted, file, escaped        |
//! | `%*p`      | text    | untrusted, file, glob           |
//! | `%d`       | integer | untrusted, escaped              |
//! | `%%`       | none    | literal `%`                     |
//!
//! Unescaped whitespace in the literal text separates words; values are
//! never split. Each run of glob metacharacters in literal text becomes its
//! own glob fragment, and makes its word a glob; the plain text around it
//! stays non-glob, so a trusted directory in front of a wildcard still
//! counts toward the sandbox prefix. `\c` makes `c` literal, even inside a
//! glob word.
//!
//! At the start of a literal word the redirect operators `<`, `>`, `>>`,
//! `2>`, `2>>`, `&>`, `2>&1` and `>&2` are recognized; file operators take
//! the rest of the word, or the next word, as their target. `|` separates
//! piped commands.

use serde::Deserialize;

use crate::assemble::MergeOptions;
use crate::error::TemplateError;
use crate::parse::types::{
    Fragment, FragmentChain, ParsedCommand, ParsedTemplate, RedirectSpec, Stream, TargetKind,
};

/// A positional value interpolated by a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Text(String),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

#[derive(Debug, Clone, Copy)]
enum Conversion {
    Text,
    Path,
    GlobPath,
    Int,
}

impl Conversion {
    fn as_str(self) -> &'static str {
        match self {
            Conversion::Text => "%s",
            Conversion::Path => "%p",
            Conversion::GlobPath => "%*p",
            Conversion::Int => "%d",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    /// Redirect to a file named by the following word.
    File { append: bool },
    /// Stdout to a file, stderr to stdout.
    FileAndStderr,
    /// Redirect to another stream.
    ToStream(Stream),
}

/// Longest operators first, so `2>&1` wins over `2>`.
const REDIRECT_OPERATORS: [(&str, Stream, Operation); 8] = [
    ("2>&1", Stream::Stderr, Operation::ToStream(Stream::Stdout)),
    (">&2", Stream::Stdout, Operation::ToStream(Stream::Stderr)),
    ("2>>", Stream::Stderr, Operation::File { append: true }),
    ("2>", Stream::Stderr, Operation::File { append: false }),
    ("&>", Stream::Stdout, Operation::FileAndStderr),
    (">>", Stream::Stdout, Operation::File { append: true }),
    (">", Stream::Stdout, Operation::File { append: false }),
    ("<", Stream::Stdin, Operation::File { append: false }),
];

/// A file redirect whose target word has not been read yet.
#[derive(Debug)]
struct PendingRedirect {
    operator: &'static str,
    stream: Stream,
    append: bool,
    also_stderr: bool,
}

struct Parser<'t, 'v, 'o> {
    src: &'t str,
    pos: usize,
    values: &'v [Value],
    next_value: usize,
    options: &'o MergeOptions,
    commands: Vec<ParsedCommand>,
    current: ParsedCommand,
    word: Vec<Fragment>,
    literal: String,
    pending: Option<PendingRedirect>,
}

/// Parse `template` with the default glob metacharacters.
pub fn parse(template: &str, values: &[Value]) -> Result<ParsedTemplate, TemplateError> {
    parse_with(template, values, &MergeOptions::default())
}

/// Parse `template`, tagging literal text as glob when it contains one of
/// `options`' metacharacters.
pub fn parse_with(
    template: &str,
    values: &[Value],
    options: &MergeOptions,
) -> Result<ParsedTemplate, TemplateError> {
    Parser {
        src: template,
        pos: 0,
        values,
        next_value: 0,
        options,
        commands: Vec::new(),
        current: ParsedCommand::default(),
        word: Vec::new(),
        literal: String::new(),
        pending: None,
    }
    .run()
}

impl Parser<'_, '_, '_> {
    fn run(mut self) -> Result<ParsedTemplate, TemplateError> {
        while let Some(c) = self.peek() {
            match c {
                c if c.is_ascii_whitespace() => {
                    self.bump();
                    self.end_word();
                }
                '|' => {
                    let offset = self.pos;
                    self.bump();
                    self.end_word();
                    self.end_command(offset)?;
                }
                '\\' => {
                    self.bump();
                    let escaped = self.bump().ok_or(TemplateError::TrailingEscape)?;
                    self.push_fragment(Fragment::trusted(escaped).escape_glob());
                }
                '%' => self.conversion()?,
                _ => {
                    if self.at_word_start() && self.redirect_operator()? {
                        continue;
                    }
                    self.bump();
                    self.literal.push(c);
                }
            }
        }
        self.end_word();
        self.end_command(self.pos)?;

        let unused = self.values.len() - self.next_value;
        if unused > 0 {
            return Err(TemplateError::UnusedValues { count: unused });
        }
        Ok(ParsedTemplate {
            commands: self.commands,
        })
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn at_word_start(&self) -> bool {
        self.word.is_empty() && self.literal.is_empty()
    }

    /// Consume a redirect operator at the cursor, if there is one.
    fn redirect_operator(&mut self) -> Result<bool, TemplateError> {
        let rest = &self.src[self.pos..];
        let Some(&(operator, stream, operation)) = REDIRECT_OPERATORS
            .iter()
            .find(|(op, _, _)| rest.starts_with(*op))
        else {
            return Ok(false);
        };
        if let Some(pending) = &self.pending {
            return Err(TemplateError::MissingRedirectTarget {
                operator: pending.operator,
            });
        }
        self.pos += operator.len();

        match operation {
            Operation::ToStream(to) => self.current.redirects.push(RedirectSpec {
                stream,
                target: TargetKind::Stream(to),
                append: false,
                file: None,
            }),
            Operation::File { append } => {
                self.pending = Some(PendingRedirect {
                    operator,
                    stream,
                    append,
                    also_stderr: false,
                });
            }
            Operation::FileAndStderr => {
                self.pending = Some(PendingRedirect {
                    operator,
                    stream,
                    append: false,
                    also_stderr: true,
                });
            }
        }
        Ok(true)
    }

    fn conversion(&mut self) -> Result<(), TemplateError> {
        let offset = self.pos;
        self.bump();
        let conversion = match self.bump() {
            Some('%') => {
                self.literal.push('%');
                return Ok(());
            }
            Some('s') => Conversion::Text,
            Some('p') => Conversion::Path,
            Some('d') => Conversion::Int,
            Some('*') => match self.bump() {
                Some('p') => Conversion::GlobPath,
                other => {
                    return Err(TemplateError::UnknownConversion {
                        conversion: format!("*{}", other.map(String::from).unwrap_or_default()),
                        offset,
                    });
                }
            },
            other => {
                return Err(TemplateError::UnknownConversion {
                    conversion: other.map(String::from).unwrap_or_default(),
                    offset,
                });
            }
        };

        let index = self.next_value;
        let values = self.values;
        let value = values
            .get(index)
            .ok_or_else(|| TemplateError::MissingValue {
                conversion: conversion.as_str().into(),
                offset,
            })?;
        self.next_value += 1;

        let mismatch = |expected| TemplateError::TypeMismatch {
            conversion: conversion.as_str().into(),
            expected,
            index,
        };
        let fragment = match (conversion, value) {
            (Conversion::Int, Value::Int(n)) => Fragment::untrusted(n.to_string()).escape_glob(),
            (Conversion::Int, Value::Text(_)) => return Err(mismatch("an integer")),
            (_, Value::Int(_)) => return Err(mismatch("a string")),
            (Conversion::Text, Value::Text(s)) => Fragment::untrusted(s.as_str()).escape_glob(),
            (Conversion::Path, Value::Text(s)) => {
                Fragment::untrusted(s.as_str()).file().escape_glob()
            }
            (Conversion::GlobPath, Value::Text(s)) => Fragment::untrusted(s.as_str()).file().glob(),
        };
        self.push_fragment(fragment);
        Ok(())
    }

    /// Split pending literal text into alternating plain and glob fragments.
    fn flush_literal(&mut self) {
        if self.literal.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.literal);
        let options = self.options;
        let mut runs: Vec<(&str, bool)> = Vec::new();
        let mut start = 0;
        let mut current: Option<bool> = None;
        for (idx, c) in text.char_indices() {
            let is_glob = options.is_glob_char(c);
            if let Some(run_is_glob) = current
                && run_is_glob != is_glob
            {
                runs.push((&text[start..idx], run_is_glob));
                start = idx;
            }
            current = Some(is_glob);
        }
        if let Some(run_is_glob) = current {
            runs.push((&text[start..], run_is_glob));
        }

        for (run, is_glob) in runs {
            let fragment = Fragment::trusted(run);
            self.push_tagged(if is_glob { fragment.glob() } else { fragment });
        }
    }

    fn push_fragment(&mut self, fragment: Fragment) {
        self.flush_literal();
        self.push_tagged(fragment);
    }

    /// Every fragment of a redirect target word is part of a file path.
    fn push_tagged(&mut self, fragment: Fragment) {
        let fragment = if self.pending.is_some() {
            fragment.file()
        } else {
            fragment
        };
        self.word.push(fragment);
    }

    fn end_word(&mut self) {
        self.flush_literal();
        let Some(chain) = FragmentChain::from_fragments(std::mem::take(&mut self.word)) else {
            return;
        };
        match self.pending.take() {
            Some(pending) => {
                self.current.redirects.push(RedirectSpec {
                    stream: pending.stream,
                    target: TargetKind::File,
                    append: pending.append,
                    file: Some(chain),
                });
                if pending.also_stderr {
                    self.current.redirects.push(RedirectSpec {
                        stream: Stream::Stderr,
                        target: TargetKind::Stream(pending.stream),
                        append: false,
                        file: None,
                    });
                }
            }
            None => self.current.words.push(chain),
        }
    }

    fn end_command(&mut self, offset: usize) -> Result<(), TemplateError> {
        if let Some(pending) = self.pending.take() {
            return Err(TemplateError::MissingRedirectTarget {
                operator: pending.operator,
            });
        }
        if self.current.words.is_empty() {
            return Err(TemplateError::EmptyCommand { offset });
        }
        self.commands.push(std::mem::take(&mut self.current));
        Ok(())
    }
}
